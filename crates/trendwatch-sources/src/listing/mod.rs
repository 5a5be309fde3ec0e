//! HTTP client for a region's best-seller listing pages.

mod parse;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use trendwatch_core::{AppConfig, ListingEntry, Region};

use crate::error::SourceError;
use crate::retry::RetryPolicy;
use crate::throttle::Throttle;
use crate::ListingSource;

pub use parse::{parse_listing, parse_price};

/// Fetches ranked best-seller entries for one region.
///
/// Every request passes through a shared [`Throttle`], so concurrent
/// category fetches still respect the minimum inter-request delay. Transient
/// failures (429, 403, 503, timeouts, network errors) are retried by the
/// configured [`RetryPolicy`].
pub struct ListingClient {
    client: Client,
    region: Region,
    base_url: String,
    retry: RetryPolicy,
    throttle: Arc<Throttle>,
}

impl ListingClient {
    /// Creates a client with the given timeout, `User-Agent`, retry policy
    /// and minimum delay between requests.
    ///
    /// `base_url` overrides the region's marketplace origin; tests point it
    /// at a local mock server.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        region: Region,
        base_url: Option<&str>,
        timeout_secs: u64,
        user_agent: &str,
        retry: RetryPolicy,
        request_delay_ms: u64,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            region,
            base_url: base_url
                .unwrap_or_else(|| region.base_url())
                .trim_end_matches('/')
                .to_owned(),
            retry,
            throttle: Arc::new(Throttle::from_millis(request_delay_ms)),
        })
    }

    /// Builds a client from application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        Self::new(
            config.region,
            config.listing_base_url.as_deref(),
            config.request_timeout_secs,
            &config.user_agent,
            RetryPolicy::new(config.max_retries, config.retry_backoff_base_ms),
            config.request_delay_ms,
        )
    }

    #[must_use]
    pub fn region(&self) -> Region {
        self.region
    }

    /// Full listing URL for `category` in this client's region.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::UnknownCategory`] when the region has no such
    /// category.
    pub fn category_url(&self, category: &str) -> Result<String, SourceError> {
        let entry = self
            .region
            .category(category)
            .ok_or_else(|| SourceError::UnknownCategory {
                category: category.to_owned(),
                region: self.region.to_string(),
            })?;
        Ok(format!("{}{}", self.base_url, entry.path))
    }

    /// Fetches and parses up to `limit` entries for `category`.
    ///
    /// # Errors
    ///
    /// - [`SourceError::UnknownCategory`]: category not in the region catalog.
    /// - [`SourceError::EmptyListing`]: the page loaded but yielded no entries.
    /// - Any transport or status error left after retries are exhausted.
    pub async fn fetch_category(
        &self,
        category: &str,
        limit: usize,
    ) -> Result<Vec<ListingEntry>, SourceError> {
        let url = self.category_url(category)?;
        let html = self.fetch_page(&url).await?;
        let entries = parse_listing(&html, &self.base_url, category, limit);

        if entries.is_empty() {
            return Err(SourceError::EmptyListing {
                category: category.to_owned(),
            });
        }

        tracing::info!(
            category,
            region = %self.region,
            count = entries.len(),
            "fetched listing entries"
        );
        Ok(entries)
    }

    async fn fetch_page(&self, url: &str) -> Result<String, SourceError> {
        self.retry
            .run("listing", move || async move {
                self.throttle.wait().await;

                let response = self
                    .client
                    .get(url)
                    .header(
                        reqwest::header::ACCEPT,
                        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                    )
                    .header(
                        reqwest::header::ACCEPT_LANGUAGE,
                        self.region.accept_language(),
                    )
                    .header(reqwest::header::CACHE_CONTROL, "max-age=0")
                    .header("DNT", "1")
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

                response
                    .text()
                    .await
                    .map_err(|e| SourceError::from_transport(e, url))
            })
            .await
    }
}

#[async_trait]
impl ListingSource for ListingClient {
    async fn fetch_category(
        &self,
        category: &str,
        limit: usize,
    ) -> Result<Vec<ListingEntry>, SourceError> {
        ListingClient::fetch_category(self, category, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_url_joins_base_and_region_path() {
        let client = ListingClient::new(
            Region::Uk,
            Some("http://127.0.0.1:9999/"),
            5,
            "trendwatch-test/0.1",
            RetryPolicy::none(),
            0,
        )
        .unwrap();
        assert_eq!(
            client.category_url("home").unwrap(),
            "http://127.0.0.1:9999/gp/bestsellers/kitchen/"
        );
    }

    #[test]
    fn category_url_rejects_unknown_category() {
        let client =
            ListingClient::new(Region::Us, None, 5, "trendwatch-test/0.1", RetryPolicy::none(), 0)
                .unwrap();
        assert!(matches!(
            client.category_url("Toys"),
            Err(SourceError::UnknownCategory { .. })
        ));
    }
}
