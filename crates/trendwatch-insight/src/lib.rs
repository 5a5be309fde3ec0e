//! Optional free-text insight for high-scoring products.
//!
//! The pipeline only ever sees the [`Annotator`] trait. [`NoopAnnotator`] is
//! the default; [`GenerativeAnnotator`] calls a generative-language HTTP
//! endpoint when an API key is configured.

pub mod error;
pub mod generative;

use std::sync::Arc;

use async_trait::async_trait;
use trendwatch_core::{AppConfig, ScoredProduct};

pub use error::InsightError;
pub use generative::{build_prompt, GenerativeAnnotator};

/// Produces a short insight for a scored product.
///
/// `Ok(None)` means "nothing to add". Errors are logged by the caller and
/// never affect scoring or persistence.
#[async_trait]
pub trait Annotator: Send + Sync {
    async fn annotate(&self, product: &ScoredProduct) -> Result<Option<String>, InsightError>;
}

/// Annotator that never adds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnnotator;

#[async_trait]
impl Annotator for NoopAnnotator {
    async fn annotate(&self, _product: &ScoredProduct) -> Result<Option<String>, InsightError> {
        Ok(None)
    }
}

/// Picks the generative annotator when an API key is configured, otherwise
/// the no-op.
///
/// # Errors
///
/// Returns [`InsightError::Http`] if the HTTP client cannot be built.
pub fn annotator_from_config(config: &AppConfig) -> Result<Arc<dyn Annotator>, InsightError> {
    match config.insight_api_key.as_deref() {
        Some(key) => {
            tracing::info!("insight annotator enabled");
            Ok(Arc::new(GenerativeAnnotator::new(
                &config.insight_api_url,
                key,
                config.request_timeout_secs,
            )?))
        }
        None => {
            tracing::info!("insight API key not configured, annotations disabled");
            Ok(Arc::new(NoopAnnotator))
        }
    }
}
