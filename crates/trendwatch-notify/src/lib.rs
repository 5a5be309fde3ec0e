//! Outbound notifications for hot products and failed runs.
//!
//! [`Dispatcher`] is the only entry point the pipeline uses. It selects the
//! hot products, builds the payload and hands it to a [`Notifier`]. Delivery
//! errors are logged and swallowed: a notification can never fail a run.

pub mod error;
pub mod payload;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use trendwatch_core::{is_hot, AppConfig};

pub use error::NotifyError;
pub use payload::{
    failure_payload, summary_payload, Embed, EmbedField, Footer, ProductDigest, WebhookPayload,
};
pub use webhook::WebhookNotifier;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, payload: &WebhookPayload) -> Result<(), NotifyError>;
}

/// Notifier used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, payload: &WebhookPayload) -> Result<(), NotifyError> {
        tracing::debug!(
            embeds = payload.embeds.len(),
            "webhook not configured, notification dropped"
        );
        Ok(())
    }
}

/// # Errors
///
/// Returns [`NotifyError::Http`] if the webhook HTTP client cannot be built.
pub fn notifier_from_config(config: &AppConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match config.webhook_url.as_deref() {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(url)?)),
        None => {
            tracing::info!("TRENDWATCH_WEBHOOK_URL not set, notifications disabled");
            Ok(Arc::new(NoopNotifier))
        }
    }
}

/// Selects hot products and delivers summary or failure notifications.
#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    hot_threshold: f64,
}

impl Dispatcher {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, hot_threshold: f64) -> Self {
        Self {
            notifier,
            hot_threshold,
        }
    }

    #[must_use]
    pub fn hot_threshold(&self) -> f64 {
        self.hot_threshold
    }

    /// Sends one summary covering every touched product at or above the hot
    /// threshold.
    ///
    /// Returns the number of hot products in a summary that was delivered.
    /// An empty selection sends nothing and returns 0, as does a failed
    /// delivery.
    pub async fn notify_hot(&self, touched: &[ProductDigest]) -> usize {
        let hot: Vec<ProductDigest> = touched
            .iter()
            .filter(|p| is_hot(p.score, self.hot_threshold))
            .cloned()
            .collect();

        let Some(payload) = summary_payload(&hot, touched.len(), self.hot_threshold, Utc::now())
        else {
            tracing::debug!(touched = touched.len(), "no hot products, summary skipped");
            return 0;
        };

        match self.notifier.send(&payload).await {
            Ok(()) => {
                tracing::info!(hot = hot.len(), "hot product summary sent");
                hot.len()
            }
            Err(e) => {
                tracing::warn!(error = %e, hot = hot.len(), "hot product summary not delivered");
                0
            }
        }
    }

    /// Sends a failure notification. Returns whether it was delivered.
    pub async fn notify_failure(&self, status: &str, message: &str) -> bool {
        let payload = failure_payload(status, message, Utc::now());
        match self.notifier.send(&payload).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, status, "failure notification not delivered");
                false
            }
        }
    }
}
