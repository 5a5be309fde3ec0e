//! Fusion of listing entries with search signals into scored products.

use std::collections::HashMap;

use trendwatch_core::{
    score_entry, IdentityKey, ListingEntry, ProductStatus, ScoredProduct, SearchSignal,
};
use trendwatch_insight::Annotator;

/// Keeps one entry per identity key. The best (lowest) rank wins; on equal
/// ranks the earlier entry wins. Output preserves first-seen order.
#[must_use]
pub fn dedup_entries(entries: Vec<ListingEntry>) -> Vec<ListingEntry> {
    let mut index: HashMap<IdentityKey, usize> = HashMap::new();
    let mut kept: Vec<ListingEntry> = Vec::with_capacity(entries.len());

    for entry in entries {
        let key = entry.identity_key();
        match index.get(&key) {
            Some(&pos) => {
                if entry.rank < kept[pos].rank {
                    kept[pos] = entry;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(entry);
            }
        }
    }
    kept
}

/// Scores each entry against its signal (if any) and orders the result by
/// descending score, ties by name.
#[must_use]
pub fn fuse(
    entries: &[ListingEntry],
    signals: &HashMap<IdentityKey, SearchSignal>,
) -> Vec<ScoredProduct> {
    let mut scored: Vec<ScoredProduct> = entries
        .iter()
        .map(|entry| {
            let signal = signals.get(&entry.identity_key()).filter(|s| s.has_data());
            let breakdown = score_entry(entry, signal);
            ScoredProduct {
                name: entry.name.clone(),
                category: entry.category.clone(),
                source_url: entry.source_url.clone(),
                score: breakdown.composite(),
                search_volume: signal.map_or(0, |s| s.current),
                price_estimate: entry.price,
                breakdown,
                status: ProductStatus::Active,
                notes: base_notes(signal),
            }
        })
        .collect();

    sort_by_score(&mut scored);
    scored
}

pub fn sort_by_score(products: &mut [ScoredProduct]) {
    products.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// `Velocity: <pct>%` for products with search data.
#[must_use]
pub fn base_notes(signal: Option<&SearchSignal>) -> Option<String> {
    let velocity = signal?.velocity?;
    Some(format!("Velocity: {:.1}%", velocity * 100.0))
}

/// Offers products scoring at least `min_score` to the annotator and appends
/// any returned text to their notes. Scores are never touched.
///
/// Returns the number of products that received an insight.
pub async fn annotate_products(
    products: &mut [ScoredProduct],
    annotator: &dyn Annotator,
    min_score: f64,
) -> usize {
    let mut annotated = 0;
    for product in products.iter_mut().filter(|p| p.score >= min_score) {
        match annotator.annotate(product).await {
            Ok(Some(text)) => {
                let insight = format!("AI insight: {text}");
                product.notes = Some(match product.notes.take() {
                    Some(base) => format!("{base}\n\n{insight}"),
                    None => insight,
                });
                annotated += 1;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(product = %product.name, error = %e, "insight annotation failed");
            }
        }
    }
    annotated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, category: &str, rank: u32) -> ListingEntry {
        ListingEntry {
            name: name.to_owned(),
            category: category.to_owned(),
            source_url: format!("https://www.example.com/dp/{rank}"),
            rank,
            price: Some(50.0),
        }
    }

    #[test]
    fn dedup_keeps_best_rank_per_identity() {
        let kept = dedup_entries(vec![
            entry("Ice Roller", "Beauty", 12),
            entry("Desk Lamp", "Home", 3),
            entry("ice  roller", "beauty", 4),
            entry("Ice Roller", "Home", 1),
        ]);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].rank, 4);
        assert_eq!(kept[0].name, "ice  roller");
        assert_eq!(kept[2].category, "Home");
    }

    #[test]
    fn fuse_without_signal_uses_velocity_floor_and_zero_volume() {
        let scored = fuse(&[entry("Desk Lamp", "Home", 5)], &HashMap::new());
        assert_eq!(scored.len(), 1);
        assert!((scored[0].breakdown.velocity - 5.0).abs() < f64::EPSILON);
        assert_eq!(scored[0].search_volume, 0);
        assert!(scored[0].notes.is_none());
        // 5 + 30 + 20 + 10
        assert!((scored[0].score - 65.0).abs() < 1e-9);
    }

    #[test]
    fn fuse_orders_by_score_then_name() {
        let entries = vec![
            entry("Zeta", "Home", 60),
            entry("Beta", "Home", 5),
            entry("Alpha", "Home", 5),
        ];
        let mut signals = HashMap::new();
        signals.insert(
            entries[0].identity_key(),
            SearchSignal::from_values("zeta", 20, 8.0),
        );
        let scored = fuse(&entries, &signals);
        let names: Vec<&str> = scored.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Zeta"]);
        assert_eq!(scored[2].notes.as_deref(), Some("Velocity: 150.0%"));
        assert_eq!(scored[2].search_volume, 20);
    }

    #[test]
    fn signal_without_data_is_treated_as_missing() {
        let e = entry("Desk Lamp", "Home", 5);
        let mut signals = HashMap::new();
        signals.insert(e.identity_key(), SearchSignal::none("desk lamp"));
        let scored = fuse(&[e], &signals);
        assert!(scored[0].notes.is_none());
        assert_eq!(scored[0].search_volume, 0);
    }
}
