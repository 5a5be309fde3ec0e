//! End-to-end scan tests with in-process fakes and the in-memory store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use trendwatch_core::{IdentityKey, ListingEntry, ScoredProduct, SearchSignal};
use trendwatch_db::{DbError, MemoryTrendStore, TrendHistoryRow, TrendStore, TrendingProductRow};
use trendwatch_insight::{Annotator, InsightError, NoopAnnotator};
use trendwatch_notify::{Dispatcher, Notifier, NotifyError, WebhookPayload};
use trendwatch_pipeline::{
    PipelineError, RunStage, RunStatus, ScanSettings, Scanner, TriggerSource,
};
use trendwatch_sources::{ListingSource, SearchInterestSource, SourceError};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeListing {
    by_category: HashMap<String, Vec<ListingEntry>>,
    delay: Option<Duration>,
}

impl FakeListing {
    fn with(mut self, category: &str, names: &[&str]) -> Self {
        let entries = names
            .iter()
            .enumerate()
            .map(|(idx, name)| ListingEntry {
                name: (*name).to_string(),
                category: category.to_string(),
                source_url: format!("https://www.example.com/dp/{category}{idx}"),
                rank: u32::try_from(idx + 1).unwrap(),
                price: Some(50.0),
            })
            .collect();
        self.by_category.insert(category.to_string(), entries);
        self
    }
}

#[async_trait]
impl ListingSource for FakeListing {
    async fn fetch_category(
        &self,
        category: &str,
        limit: usize,
    ) -> Result<Vec<ListingEntry>, SourceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.by_category.get(category) {
            Some(entries) => Ok(entries.iter().take(limit).cloned().collect()),
            None => Err(SourceError::SourceUnavailable {
                status: 503,
                url: format!("https://www.example.com/{category}"),
            }),
        }
    }
}

/// Products listed in `rising` get a strong rising signal and those in
/// `failing` exhaust their retries; everything else has no data.
#[derive(Default)]
struct FakeSearch {
    rising: Vec<String>,
    failing: Vec<String>,
}

impl FakeSearch {
    fn rising(names: &[&str]) -> Self {
        Self {
            rising: names.iter().map(|n| (*n).to_string()).collect(),
            failing: Vec::new(),
        }
    }
}

#[async_trait]
impl SearchInterestSource for FakeSearch {
    async fn signal(
        &self,
        product_name: &str,
        _category: &str,
    ) -> Result<SearchSignal, SourceError> {
        if self.failing.iter().any(|n| n == product_name) {
            return Err(SourceError::RateLimited {
                host: "trends.example.com".to_string(),
                retry_after_secs: None,
            });
        }
        if self.rising.iter().any(|n| n == product_name) {
            Ok(SearchSignal::from_values(product_name, 20, 5.0))
        } else {
            Ok(SearchSignal::none(product_name))
        }
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<WebhookPayload>>,
}

impl RecordingNotifier {
    fn titles(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.embeds[0].title.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, payload: &WebhookPayload) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

struct FixedAnnotator;

#[async_trait]
impl Annotator for FixedAnnotator {
    async fn annotate(&self, product: &ScoredProduct) -> Result<Option<String>, InsightError> {
        if product.name == "Broken" {
            return Err(InsightError::Status { status: 500 });
        }
        Ok(Some(format!("{} sells itself.", product.name)))
    }
}

/// Store that reads fine but rejects every write.
struct ReadOnlyStore;

#[async_trait]
impl TrendStore for ReadOnlyStore {
    async fn find_by_identity(
        &self,
        _key: &IdentityKey,
    ) -> Result<Option<TrendingProductRow>, DbError> {
        Ok(None)
    }

    async fn insert_product(
        &self,
        _key: &IdentityKey,
        _product: &ScoredProduct,
    ) -> Result<TrendingProductRow, DbError> {
        Err(DbError::NotFound)
    }

    async fn update_product(
        &self,
        _id: i64,
        _product: &ScoredProduct,
    ) -> Result<TrendingProductRow, DbError> {
        Err(DbError::NotFound)
    }

    async fn append_history(
        &self,
        _product_id: i64,
        _trend_score: f64,
        _search_volume: u32,
    ) -> Result<TrendHistoryRow, DbError> {
        Err(DbError::NotFound)
    }

    async fn top_products(&self, _limit: i64) -> Result<Vec<TrendingProductRow>, DbError> {
        Ok(Vec::new())
    }

    async fn get_product(&self, _id: i64) -> Result<Option<TrendingProductRow>, DbError> {
        Ok(None)
    }

    async fn product_history(
        &self,
        _product_id: i64,
        _limit: i64,
    ) -> Result<Vec<TrendHistoryRow>, DbError> {
        Ok(Vec::new())
    }

    async fn archive_stale(&self, _days: u32, _below_score: f64) -> Result<u64, DbError> {
        Ok(0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn settings(categories: &[&str]) -> ScanSettings {
    ScanSettings {
        categories: categories.iter().map(|c| (*c).to_string()).collect(),
        products_per_category: 50,
        listing_concurrency: 2,
        insight_min_score: 60.0,
    }
}

struct Harness {
    scanner: Scanner,
    store: Arc<MemoryTrendStore>,
    notifier: Arc<RecordingNotifier>,
}

fn harness(
    categories: &[&str],
    listing: FakeListing,
    search: FakeSearch,
    annotator: Arc<dyn Annotator>,
) -> Harness {
    let store = Arc::new(MemoryTrendStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let scanner = Scanner::new(
        settings(categories),
        Arc::new(listing),
        Arc::new(search),
        store.clone(),
        annotator,
        Dispatcher::new(notifier.clone(), 70.0),
    );
    Harness {
        scanner,
        store,
        notifier,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clean_run_scores_persists_and_notifies_hot_products() {
    let h = harness(
        &["Home", "Beauty"],
        FakeListing::default()
            .with("Home", &["Desk Lamp", "Door Stopper"])
            .with("Beauty", &["Ice Roller"]),
        FakeSearch::rising(&["Ice Roller"]),
        Arc::new(NoopAnnotator),
    );

    let summary = h
        .scanner
        .run_scan(TriggerSource::Cli)
        .await
        .expect("scan should start");

    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.fetched, 3);
    assert_eq!(summary.scored, 3);
    assert_eq!(summary.persisted, 3);
    // Ice Roller: 25 + 30 + 20 + 10 = 85; the others score 65.
    assert_eq!(summary.notified, 1);
    assert!(summary.error.is_none());
    assert_eq!(h.notifier.titles(), vec!["Daily Trend Report".to_string()]);
    assert_eq!(h.store.history().len(), 3);
    assert_eq!(h.scanner.gate().stage(), RunStage::Completed);
}

#[tokio::test]
async fn one_failing_category_degrades_to_partial() {
    let h = harness(
        &["Home", "Fashion", "Beauty"],
        FakeListing::default()
            .with("Home", &["Desk Lamp"])
            .with("Beauty", &["Ice Roller"]),
        FakeSearch::rising(&["Desk Lamp"]),
        Arc::new(NoopAnnotator),
    );

    let summary = h.scanner.run_scan(TriggerSource::Api).await.unwrap();

    assert_eq!(summary.status, RunStatus::Partial);
    assert_eq!(summary.degraded_categories, vec!["Fashion".to_string()]);
    assert_eq!(summary.scored, 2);
    assert_eq!(summary.persisted, 2);
    assert_eq!(summary.notified, 1);
    assert_eq!(
        h.notifier.titles(),
        vec![
            "Daily Trend Report".to_string(),
            "Trend scan partial".to_string()
        ]
    );
}

#[tokio::test]
async fn every_category_failing_fails_the_run() {
    let h = harness(
        &["Home", "Fashion"],
        FakeListing::default(),
        FakeSearch::default(),
        Arc::new(NoopAnnotator),
    );

    let summary = h.scanner.run_scan(TriggerSource::Scheduler).await.unwrap();

    assert_eq!(summary.status, RunStatus::Failed);
    assert_eq!(summary.fetched, 0);
    assert_eq!(summary.persisted, 0);
    assert_eq!(h.notifier.titles(), vec!["Trend scan failed".to_string()]);
    assert_eq!(h.scanner.gate().stage(), RunStage::Failed);
}

#[tokio::test]
async fn search_outage_degrades_to_partial_and_still_persists() {
    let h = harness(
        &["Home"],
        FakeListing::default().with("Home", &["Desk Lamp", "Door Stopper"]),
        FakeSearch {
            rising: Vec::new(),
            failing: vec!["Desk Lamp".to_string(), "Door Stopper".to_string()],
        },
        Arc::new(NoopAnnotator),
    );

    let summary = h.scanner.run_scan(TriggerSource::Scheduler).await.unwrap();

    assert_eq!(summary.status, RunStatus::Partial);
    assert!(summary.degraded_categories.is_empty());
    assert_eq!(summary.search_failures, 2);
    assert_eq!(summary.persisted, 2);
    assert_eq!(
        summary.error.as_deref(),
        Some("search interest unavailable for 2 of 2 products")
    );
    // Both score the velocity floor: 5 + 30 + 20 + 10 = 65.
    assert!(h
        .store
        .products()
        .iter()
        .all(|p| (p.trend_score - 65.0).abs() < f64::EPSILON));
    assert_eq!(h.notifier.titles(), vec!["Trend scan partial".to_string()]);
    assert_eq!(h.scanner.gate().stage(), RunStage::Completed);
}

#[tokio::test]
async fn search_and_listing_degradation_are_both_reported() {
    let h = harness(
        &["Home", "Fashion"],
        FakeListing::default().with("Home", &["Desk Lamp", "Door Stopper"]),
        FakeSearch {
            rising: Vec::new(),
            failing: vec!["Door Stopper".to_string()],
        },
        Arc::new(NoopAnnotator),
    );

    let summary = h.scanner.run_scan(TriggerSource::Api).await.unwrap();

    assert_eq!(summary.status, RunStatus::Partial);
    assert_eq!(summary.search_failures, 1);
    assert_eq!(
        summary.error.as_deref(),
        Some("degraded categories: Fashion; search interest unavailable for 1 of 2 products")
    );
}

#[tokio::test]
async fn no_hot_products_sends_nothing() {
    let h = harness(
        &["Home"],
        FakeListing::default().with("Home", &["Desk Lamp", "Door Stopper"]),
        FakeSearch::default(),
        Arc::new(NoopAnnotator),
    );

    let summary = h.scanner.run_scan(TriggerSource::Cli).await.unwrap();

    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.persisted, 2);
    assert_eq!(summary.notified, 0);
    assert!(h.notifier.titles().is_empty());
}

#[tokio::test]
async fn rerun_updates_in_place_and_appends_history() {
    let h = harness(
        &["Home"],
        FakeListing::default().with("Home", &["Desk Lamp"]),
        FakeSearch::default(),
        Arc::new(NoopAnnotator),
    );

    h.scanner.run_scan(TriggerSource::Cli).await.unwrap();
    h.scanner.run_scan(TriggerSource::Cli).await.unwrap();

    let products = h.store.products();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "Desk Lamp");
    let history = h.store.history();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|row| row.product_id == products[0].id));
}

#[tokio::test]
async fn duplicate_listing_entries_collapse_to_one_product() {
    let h = harness(
        &["Home", "Kitchen"],
        FakeListing::default()
            .with("Home", &["Desk Lamp", "desk  LAMP"])
            .with("Kitchen", &["Desk Lamp"]),
        FakeSearch::default(),
        Arc::new(NoopAnnotator),
    );

    let summary = h.scanner.run_scan(TriggerSource::Cli).await.unwrap();

    assert_eq!(summary.fetched, 3);
    // Same name in another category is a different product.
    assert_eq!(summary.scored, 2);
    assert_eq!(h.store.products().len(), 2);
}

#[tokio::test]
async fn second_trigger_while_running_is_rejected() {
    let h = harness(
        &["Home"],
        FakeListing {
            delay: Some(Duration::from_millis(50)),
            ..FakeListing::default()
        }
        .with("Home", &["Desk Lamp"]),
        FakeSearch::default(),
        Arc::new(NoopAnnotator),
    );

    let (first, second) = tokio::join!(
        h.scanner.run_scan(TriggerSource::Scheduler),
        h.scanner.run_scan(TriggerSource::Api)
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(PipelineError::AlreadyRunning)));
    assert!(!h.scanner.gate().is_running());
}

#[tokio::test]
async fn held_permit_blocks_run_scan() {
    let h = harness(
        &["Home"],
        FakeListing::default().with("Home", &["Desk Lamp"]),
        FakeSearch::default(),
        Arc::new(NoopAnnotator),
    );

    let permit = h.scanner.try_start().expect("gate free");
    let result = h.scanner.run_scan(TriggerSource::Api).await;
    assert!(matches!(result, Err(PipelineError::AlreadyRunning)));

    let summary = h
        .scanner
        .run_with_permit(permit, TriggerSource::Api, &CancellationToken::new())
        .await;
    assert_eq!(summary.status, RunStatus::Success);
}

#[tokio::test]
async fn cancelled_run_fails_and_still_notifies() {
    let h = harness(
        &["Home"],
        FakeListing::default().with("Home", &["Desk Lamp"]),
        FakeSearch::default(),
        Arc::new(NoopAnnotator),
    );

    let cancel = CancellationToken::new();
    cancel.cancel();
    let permit = h.scanner.try_start().unwrap();
    let summary = h
        .scanner
        .run_with_permit(permit, TriggerSource::Scheduler, &cancel)
        .await;

    assert_eq!(summary.status, RunStatus::Failed);
    assert_eq!(summary.error.as_deref(), Some("scan cancelled"));
    assert_eq!(summary.persisted, 0);
    assert_eq!(h.notifier.titles(), vec!["Trend scan failed".to_string()]);
}

#[tokio::test]
async fn persistence_error_fails_run_after_scoring() {
    let notifier = Arc::new(RecordingNotifier::default());
    let scanner = Scanner::new(
        settings(&["Home"]),
        Arc::new(FakeListing::default().with("Home", &["Desk Lamp"])),
        Arc::new(FakeSearch::default()),
        Arc::new(ReadOnlyStore),
        Arc::new(NoopAnnotator),
        Dispatcher::new(notifier.clone(), 70.0),
    );

    let summary = scanner.run_scan(TriggerSource::Cli).await.unwrap();

    assert_eq!(summary.status, RunStatus::Failed);
    assert_eq!(summary.scored, 1);
    assert_eq!(summary.persisted, 0);
    assert!(summary
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("persistence failed")));
    assert_eq!(notifier.titles(), vec!["Trend scan failed".to_string()]);
}

#[tokio::test]
async fn annotator_notes_never_change_scores() {
    let h = harness(
        &["Home"],
        FakeListing::default().with("Home", &["Desk Lamp", "Broken"]),
        FakeSearch::rising(&["Desk Lamp"]),
        Arc::new(FixedAnnotator),
    );

    let summary = h.scanner.run_scan(TriggerSource::Cli).await.unwrap();
    assert_eq!(summary.status, RunStatus::Success);

    let products = h.store.products();
    let lamp = products.iter().find(|p| p.name == "Desk Lamp").unwrap();
    assert!((lamp.trend_score - 85.0).abs() < 1e-9);
    assert_eq!(
        lamp.notes.as_deref(),
        Some("Velocity: 300.0%\n\nAI insight: Desk Lamp sells itself.")
    );

    let broken = products.iter().find(|p| p.name == "Broken").unwrap();
    assert!(broken.notes.is_none());
}
