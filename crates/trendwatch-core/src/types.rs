use serde::{Deserialize, Serialize};

use crate::identity::IdentityKey;
use crate::scoring::ScoreBreakdown;

/// One ranked item from a best-seller listing, produced fresh every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub name: String,
    pub category: String,
    pub source_url: String,
    /// 1-based position within the category listing.
    pub rank: u32,
    pub price: Option<f64>,
}

impl ListingEntry {
    #[must_use]
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(&self.name, &self.category)
    }
}

/// Search-interest observation for one product keyword.
///
/// Values are on the provider's 0–100 relative scale. `velocity` is `None`
/// when the provider had no usable data; downstream scoring treats that as
/// "unknown" and uses the floor band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSignal {
    pub keyword: String,
    pub current: u32,
    pub prior: f64,
    pub velocity: Option<f64>,
}

impl SearchSignal {
    /// Builds a signal from the current and prior-period interest values.
    ///
    /// `velocity = (current - prior) / max(prior, 1)`.
    #[must_use]
    pub fn from_values(keyword: impl Into<String>, current: u32, prior: f64) -> Self {
        let prior = prior.max(0.0);
        let velocity = (f64::from(current) - prior) / prior.max(1.0);
        Self {
            keyword: keyword.into(),
            current,
            prior,
            velocity: Some(velocity),
        }
    }

    /// The "no signal" value returned when the provider is unavailable.
    #[must_use]
    pub fn none(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            current: 0,
            prior: 0.0,
            velocity: None,
        }
    }

    #[must_use]
    pub fn has_data(&self) -> bool {
        self.velocity.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Archived,
}

impl ProductStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Archived => "archived",
        }
    }
}

/// A listing entry fused with its search signal and scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredProduct {
    pub name: String,
    pub category: String,
    pub source_url: String,
    /// Composite score in `[0, 100]`, two-decimal precision.
    pub score: f64,
    /// Raw current search-interest value; `0` when no signal was available.
    pub search_volume: u32,
    pub price_estimate: Option<f64>,
    pub breakdown: ScoreBreakdown,
    pub status: ProductStatus,
    pub notes: Option<String>,
}

impl ScoredProduct {
    #[must_use]
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(&self.name, &self.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_is_relative_to_prior() {
        let signal = SearchSignal::from_values("ice roller", 60, 40.0);
        assert_eq!(signal.velocity, Some(0.5));
    }

    #[test]
    fn velocity_denominator_floors_at_one() {
        let signal = SearchSignal::from_values("new thing", 12, 0.0);
        assert_eq!(signal.velocity, Some(12.0));
    }

    #[test]
    fn no_signal_has_zero_volume_and_undefined_velocity() {
        let signal = SearchSignal::none("x");
        assert_eq!(signal.current, 0);
        assert!(!signal.has_data());
    }

    #[test]
    fn product_status_serializes_lowercase() {
        let json = serde_json::to_string(&ProductStatus::Active).expect("serialize");
        assert_eq!(json, "\"active\"");
    }
}
