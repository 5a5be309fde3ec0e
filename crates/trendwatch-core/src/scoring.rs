//! Composite trend scoring.
//!
//! Four independent sub-scores are summed into a composite in `[0, 100]`:
//!
//! | Sub-score   | Range  | Input                         |
//! |-------------|--------|-------------------------------|
//! | velocity    | 5–25   | search-interest velocity      |
//! | rank        | 0–30   | listing rank position         |
//! | price       | 5–20   | estimated price               |
//! | competition | 2–10   | raw search volume             |
//!
//! Every function here is pure: identical inputs always produce identical
//! bits, which the pipeline relies on for repeatable history.

use serde::{Deserialize, Serialize};

use crate::types::{ListingEntry, SearchSignal};

pub const DEFAULT_HOT_THRESHOLD: f64 = 70.0;

const PRICE_SWEET_SPOT: (f64, f64) = (25.0, 75.0);
const PRICE_VIABLE: (f64, f64) = (15.0, 150.0);

/// Per-factor contribution to a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub velocity: f64,
    pub rank: f64,
    pub price: f64,
    pub competition: f64,
}

impl ScoreBreakdown {
    /// Sum of the sub-scores, clamped to `[0, 100]` and rounded to two
    /// decimals.
    #[must_use]
    pub fn composite(&self) -> f64 {
        let sum = self.velocity + self.rank + self.price + self.competition;
        round2(sum.clamp(0.0, 100.0))
    }
}

/// Scores one listing entry against its (optional) search signal.
///
/// A missing signal, or one without data, scores the velocity floor and the
/// competition band for zero volume.
#[must_use]
pub fn score_entry(entry: &ListingEntry, signal: Option<&SearchSignal>) -> ScoreBreakdown {
    let velocity = signal.and_then(|s| s.velocity);
    let volume = signal.map_or(0, |s| s.current);

    ScoreBreakdown {
        velocity: round2(velocity_score(velocity)),
        rank: round2(rank_score(entry.rank)),
        price: round2(price_score(entry.price)),
        competition: round2(competition_score(volume)),
    }
}

#[must_use]
pub fn is_hot(score: f64, threshold: f64) -> bool {
    score >= threshold
}

/// Velocity sub-score, 5–25.
///
/// Below 0.20 (including negative or unknown velocity) the score is
/// interpolated linearly from 5 at zero up toward 10 at 0.20.
#[must_use]
pub fn velocity_score(velocity: Option<f64>) -> f64 {
    match velocity {
        Some(v) if v > 1.0 => 25.0,
        Some(v) if v >= 0.5 => 20.0,
        Some(v) if v >= 0.2 => 15.0,
        Some(v) if v.is_finite() => 5.0 + 5.0 * (v / 0.2).clamp(0.0, 1.0),
        _ => 5.0,
    }
}

/// Rank sub-score, 0–30. Positions past 50 score nothing.
#[must_use]
pub fn rank_score(rank: u32) -> f64 {
    match rank {
        1..=10 => 30.0,
        11..=25 => 25.0,
        26..=50 => 20.0,
        _ => 0.0,
    }
}

/// Price sub-score, 5–20.
///
/// Both range boundaries are inclusive. Prices outside the viable range lose
/// up to 5 points from 10 in proportion to their distance from the nearest
/// edge, measured in range widths. A missing or non-positive price scores 5.
#[must_use]
pub fn price_score(price: Option<f64>) -> f64 {
    let Some(price) = price.filter(|p| p.is_finite() && *p > 0.0) else {
        return 5.0;
    };

    if (PRICE_SWEET_SPOT.0..=PRICE_SWEET_SPOT.1).contains(&price) {
        return 20.0;
    }
    if (PRICE_VIABLE.0..=PRICE_VIABLE.1).contains(&price) {
        return 15.0;
    }

    let width = PRICE_VIABLE.1 - PRICE_VIABLE.0;
    let distance = if price < PRICE_VIABLE.0 {
        PRICE_VIABLE.0 - price
    } else {
        price - PRICE_VIABLE.1
    };
    10.0 - 5.0 * (distance / width).min(1.0)
}

/// Competition sub-score, 2–10. Search volume stands in for competition:
/// the busier the keyword, the lower the score.
#[must_use]
pub fn competition_score(volume: u32) -> f64 {
    match volume {
        0..=29 => 10.0,
        30..=60 => 7.0,
        v => 4.0 - 2.0 * (f64::from(v - 60) / 40.0).min(1.0),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
