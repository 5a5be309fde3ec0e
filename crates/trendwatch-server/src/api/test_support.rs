//! Router test fixtures: an in-memory store, offline sources and a lazy pool
//! that never connects.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::response::Response;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Notify;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use trendwatch_core::{AppConfig, Environment, ListingEntry, Region, SearchSignal};
use trendwatch_db::MemoryTrendStore;
use trendwatch_insight::NoopAnnotator;
use trendwatch_notify::{Dispatcher, NoopNotifier, Notifier, NotifyError, WebhookPayload};
use trendwatch_pipeline::{ScanSettings, Scanner};
use trendwatch_sources::{ListingSource, SearchInterestSource, SourceError};

use super::AppState;

pub(crate) fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://trendwatch@127.0.0.1:1/trendwatch".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        log_level: "info".to_string(),
        region: Region::Us,
        categories: vec!["Home".to_string()],
        products_per_category: 10,
        listing_base_url: None,
        listing_concurrency: 1,
        request_delay_ms: 0,
        search_delay_ms: 0,
        search_api_url: "http://127.0.0.1:1/interest".to_string(),
        max_retries: 0,
        retry_backoff_base_ms: 1,
        request_timeout_secs: 1,
        user_agent: "trendwatch-test".to_string(),
        hot_threshold: 70.0,
        insight_min_score: 60.0,
        insight_api_url: "http://127.0.0.1:1/generate".to_string(),
        insight_api_key: None,
        webhook_url: None,
        scan_cron: "0 0 6 * * *".to_string(),
        archive_after_days: 30,
        db_max_connections: 1,
        db_min_connections: 0,
        db_acquire_timeout_secs: 1,
    }
}

/// Listing source that blocks each fetch until released.
pub(crate) struct GatedListing {
    pub release: Arc<Notify>,
}

#[async_trait]
impl ListingSource for GatedListing {
    async fn fetch_category(
        &self,
        category: &str,
        _limit: usize,
    ) -> Result<Vec<ListingEntry>, SourceError> {
        self.release.notified().await;
        Ok(vec![ListingEntry {
            name: "Magnetic Spice Rack".to_string(),
            category: category.to_string(),
            source_url: "https://www.example.com/dp/B0SPICE".to_string(),
            rank: 1,
            price: Some(29.99),
        }])
    }
}

pub(crate) struct SilentSearch;

#[async_trait]
impl SearchInterestSource for SilentSearch {
    async fn signal(
        &self,
        product_name: &str,
        _category: &str,
    ) -> Result<SearchSignal, SourceError> {
        Ok(SearchSignal::none(product_name))
    }
}

/// Notifier that keeps the title of every payload it is handed.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    titles: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub(crate) fn titles(&self) -> Vec<String> {
        self.titles.lock().expect("titles lock").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, payload: &WebhookPayload) -> Result<(), NotifyError> {
        let mut titles = self.titles.lock().expect("titles lock");
        titles.extend(payload.embeds.iter().map(|e| e.title.clone()));
        Ok(())
    }
}

/// State backed by a [`MemoryTrendStore`]. The returned [`Notify`] releases
/// listing fetches of any scan started through the router.
pub(crate) fn gated_state() -> (AppState, Arc<MemoryTrendStore>, Arc<Notify>) {
    gated_state_with(Arc::new(NoopNotifier))
}

pub(crate) fn gated_state_with(
    notifier: Arc<dyn Notifier>,
) -> (AppState, Arc<MemoryTrendStore>, Arc<Notify>) {
    let config = app_config();
    let store = Arc::new(MemoryTrendStore::new());
    let release = Arc::new(Notify::new());

    let scanner = Scanner::new(
        ScanSettings::from_config(&config),
        Arc::new(GatedListing {
            release: Arc::clone(&release),
        }),
        Arc::new(SilentSearch),
        store.clone(),
        Arc::new(NoopAnnotator),
        Dispatcher::new(notifier, config.hot_threshold),
    );

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_millis(250))
        .connect_lazy(&config.database_url)
        .expect("lazy pool");

    let state = AppState {
        pool,
        config: Arc::new(config),
        scanner: Arc::new(scanner),
        shutdown: CancellationToken::new(),
        tasks: TaskTracker::new(),
    };
    (state, store, release)
}

pub(crate) fn memory_state() -> (AppState, Arc<MemoryTrendStore>) {
    let (state, store, _) = gated_state();
    (state, store)
}

pub(crate) fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub(crate) async fn read_json(response: Response) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&body).expect("json parse")
}
