//! Search-interest adapter.
//!
//! The provider returns a relative-interest time series for a keyword. The
//! adapter reduces it to a [`SearchSignal`]: the latest value against the
//! mean of an earlier window.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use trendwatch_core::{AppConfig, SearchSignal};

use crate::error::SourceError;
use crate::retry::RetryPolicy;
use crate::throttle::Throttle;
use crate::SearchInterestSource;

const PACKAGING_TERMS: &[&str] = &["pack of", "set of", "bundle", "combo"];
const PUNCTUATION: &[char] = &['(', ')', '[', ']', '-', '|', ','];
const MAX_KEYWORD_WORDS: usize = 4;
const MIN_KEYWORD_CHARS: usize = 3;
const WINDOW: usize = 30;

#[derive(Debug, Deserialize)]
pub struct InterestSeries {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub points: Vec<u32>,
}

/// Client for the search-interest provider.
///
/// Calls are sequential per product and spaced by a fixed minimum delay.
pub struct SearchInterestClient {
    client: Client,
    api_url: String,
    geo: String,
    retry: RetryPolicy,
    throttle: Throttle,
}

impl SearchInterestClient {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_url: &str,
        geo: &str,
        timeout_secs: u64,
        user_agent: &str,
        retry: RetryPolicy,
        delay_ms: u64,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.to_owned(),
            geo: geo.to_owned(),
            retry,
            throttle: Throttle::from_millis(delay_ms),
        })
    }

    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        Self::new(
            &config.search_api_url,
            config.region.geo(),
            config.request_timeout_secs,
            &config.user_agent,
            RetryPolicy::new(config.max_retries, config.retry_backoff_base_ms),
            config.search_delay_ms,
        )
    }

    /// Fetches the interest series for a product name and reduces it to a
    /// signal.
    ///
    /// Names that clean down to fewer than three characters, and empty
    /// series, yield the "no signal" value without error.
    ///
    /// # Errors
    ///
    /// Returns the last [`SourceError`] once retries are exhausted.
    pub async fn fetch_signal(&self, product_name: &str) -> Result<SearchSignal, SourceError> {
        let keyword = clean_keyword(product_name);
        if keyword.chars().count() < MIN_KEYWORD_CHARS {
            tracing::debug!(product_name, "keyword too short for search lookup");
            return Ok(SearchSignal::none(keyword));
        }

        let series = self.fetch_series(&keyword).await?;
        let signal = signal_from_points(&keyword, &series.points);
        tracing::debug!(
            keyword = %signal.keyword,
            current = signal.current,
            velocity = ?signal.velocity,
            "search interest"
        );
        Ok(signal)
    }

    async fn fetch_series(&self, keyword: &str) -> Result<InterestSeries, SourceError> {
        let url = self.api_url.as_str();
        let geo = self.geo.as_str();
        let throttle = &self.throttle;
        let client = &self.client;

        self.retry
            .run("search", move || async move {
                throttle.wait().await;

                let response = client
                    .get(url)
                    .query(&[("keyword", keyword), ("geo", geo)])
                    .header(reqwest::header::ACCEPT, "application/json")
                    .send()
                    .await
                    .map_err(|e| SourceError::from_transport(e, url))?;

                let status = response.status();
                if !status.is_success() {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.trim().parse::<u64>().ok());
                    return Err(SourceError::from_status(status, url, retry_after_secs));
                }

                let body = response
                    .text()
                    .await
                    .map_err(|e| SourceError::from_transport(e, url))?;
                serde_json::from_str::<InterestSeries>(&body).map_err(|e| {
                    SourceError::Deserialize {
                        context: format!("interest series for \"{keyword}\""),
                        source: e,
                    }
                })
            })
            .await
    }
}

#[async_trait]
impl SearchInterestSource for SearchInterestClient {
    async fn signal(
        &self,
        product_name: &str,
        category: &str,
    ) -> Result<SearchSignal, SourceError> {
        self.fetch_signal(product_name).await.inspect_err(|e| {
            tracing::warn!(product_name, category, error = %e, "search interest unavailable");
        })
    }
}

/// Reduces a product title to a short search keyword.
///
/// Lower-cases, removes packaging terms and punctuation, drops words of two
/// characters or fewer, and keeps the first four remaining words.
#[must_use]
pub fn clean_keyword(name: &str) -> String {
    let mut cleaned = name.to_lowercase();
    for term in PACKAGING_TERMS {
        cleaned = cleaned.replace(term, " ");
    }
    let cleaned = cleaned.replace(PUNCTUATION, " ");

    cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .take(MAX_KEYWORD_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds a signal from a 0–100 interest series.
///
/// The current value is the last point. The prior value is the mean of the
/// 30 points preceding the latest 30-point window, or of every earlier point
/// when the series is shorter than that. A series with no earlier point has
/// no prior period and is "no signal", as is an empty series.
#[must_use]
pub fn signal_from_points(keyword: &str, points: &[u32]) -> SearchSignal {
    let Some((&current, earlier)) = points.split_last() else {
        return SearchSignal::none(keyword);
    };
    if earlier.is_empty() {
        return SearchSignal::none(keyword);
    }

    let len = points.len();
    let prior_window: &[u32] = if len >= 2 * WINDOW {
        &points[len - 2 * WINDOW..len - WINDOW]
    } else if len > WINDOW {
        &points[..len - WINDOW]
    } else {
        earlier
    };

    SearchSignal::from_values(keyword, current, mean(prior_window))
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: u64 = values.iter().map(|&v| u64::from(v)).sum();
    sum as f64 / values.len() as f64
}
