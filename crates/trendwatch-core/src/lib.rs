//! Shared domain types, configuration, and scoring rules for trendwatch.

pub mod app_config;
pub mod config;
pub mod identity;
pub mod region;
pub mod scoring;
pub mod types;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use identity::IdentityKey;
pub use region::{Category, Region};
pub use scoring::{is_hot, score_entry, ScoreBreakdown, DEFAULT_HOT_THRESHOLD};
pub use types::{ListingEntry, ProductStatus, ScoredProduct, SearchSignal};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
