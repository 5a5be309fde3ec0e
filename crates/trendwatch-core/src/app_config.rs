use std::net::SocketAddr;

use crate::region::Region;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub region: Region,
    /// Category names to scan, validated against the region catalog.
    pub categories: Vec<String>,
    pub products_per_category: usize,
    pub listing_base_url: Option<String>,
    pub listing_concurrency: usize,
    pub request_delay_ms: u64,
    pub search_delay_ms: u64,
    pub search_api_url: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub hot_threshold: f64,
    pub insight_min_score: f64,
    pub insight_api_url: String,
    pub insight_api_key: Option<String>,
    pub webhook_url: Option<String>,
    pub scan_cron: String,
    pub archive_after_days: u32,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("region", &self.region)
            .field("categories", &self.categories)
            .field("products_per_category", &self.products_per_category)
            .field("listing_base_url", &self.listing_base_url)
            .field("listing_concurrency", &self.listing_concurrency)
            .field("request_delay_ms", &self.request_delay_ms)
            .field("search_delay_ms", &self.search_delay_ms)
            .field("search_api_url", &self.search_api_url)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("hot_threshold", &self.hot_threshold)
            .field("insight_min_score", &self.insight_min_score)
            .field("insight_api_url", &self.insight_api_url)
            .field(
                "insight_api_key",
                &self.insight_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "webhook_url",
                &self.webhook_url.as_ref().map(|_| "[redacted]"),
            )
            .field("scan_cron", &self.scan_cron)
            .field("archive_after_days", &self.archive_after_days)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
