//! Retry with exponential back-off and jitter, shared by both source
//! adapters.
//!
//! [`RetryPolicy::run`] wraps any fallible async operation and retries on
//! transient errors. Everything else is returned on the first failure.

use std::future::Future;
use std::time::Duration;

use crate::error::SourceError;

const MAX_DELAY_MS: u64 = 60_000;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:** rate limiting (429), blocked (403), service unavailable
/// (503), timeouts, other 5xx responses and connection-level failures.
///
/// **Not retriable:** not-found, unexpected 4xx, malformed bodies, empty
/// listings and configuration errors such as unknown categories.
pub fn is_retriable(err: &SourceError) -> bool {
    match err {
        SourceError::RateLimited { .. }
        | SourceError::Blocked { .. }
        | SourceError::SourceUnavailable { .. }
        | SourceError::Timeout { .. } => true,
        SourceError::Http(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.is_request()
                || e.status().is_some_and(|s| s.is_server_error())
        }
        SourceError::UnexpectedStatus { status, .. } => *status >= 500,
        SourceError::NotFound { .. }
        | SourceError::Deserialize { .. }
        | SourceError::EmptyListing { .. }
        | SourceError::UnknownCategory { .. }
        | SourceError::InvalidUrl { .. } => false,
    }
}

/// Bounded retry schedule: `base * 2^(attempt - 1)` capped at 60 s, with
/// ±25 % jitter when enabled.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(base_delay_ms),
            jitter: true,
        }
    }

    /// A policy that never retries. Used by tests and one-shot tooling.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            jitter: false,
        }
    }

    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before retry number `attempt` (1-based), before jitter.
    #[must_use]
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let base = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        base.saturating_mul(1u64 << attempt.saturating_sub(1).min(10))
            .min(MAX_DELAY_MS)
    }

    fn delay_for(&self, attempt: u32, err: &SourceError) -> Duration {
        let mut delay_ms = self.backoff_ms(attempt);
        if self.jitter {
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                clippy::cast_precision_loss
            )]
            {
                delay_ms = (delay_ms as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
            }
        }
        // Honour an explicit Retry-After, within the same cap.
        if let SourceError::RateLimited {
            retry_after_secs: Some(secs),
            ..
        } = err
        {
            delay_ms = delay_ms.max(secs.saturating_mul(1000).min(MAX_DELAY_MS));
        }
        Duration::from_millis(delay_ms)
    }

    /// Runs `operation` with up to `max_retries` additional attempts on
    /// transient errors.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted, or the first
    /// non-retriable error immediately.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !is_retriable(&err) || attempt >= self.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    let delay = self.delay_for(attempt, &err);
                    tracing::warn!(
                        source = label,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient source error, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
