//! Scan command handlers.

use std::sync::Arc;

use trendwatch_core::AppConfig;
use trendwatch_db::{MemoryTrendStore, PgTrendStore};
use trendwatch_insight::NoopAnnotator;
use trendwatch_notify::{Dispatcher, NoopNotifier};
use trendwatch_pipeline::{RunStatus, RunSummary, ScanSettings, Scanner, TriggerSource};
use trendwatch_sources::{ListingClient, SearchInterestClient};

/// Run one scan against Postgres, record it in `scan_runs`, and print the
/// summary.
///
/// # Errors
///
/// Returns an error if the scanner cannot be built or the run ends `failed`.
/// A failure to record the run is logged, not propagated.
pub(crate) async fn run_scan(pool: &sqlx::PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let store = Arc::new(PgTrendStore::new(pool.clone()));
    let scanner = Scanner::from_config(config, store)?;

    let summary = scanner.run_scan(TriggerSource::Cli).await?;

    if let Err(e) = trendwatch_db::insert_scan_run(pool, &summary.to_scan_run()).await {
        tracing::warn!(run_id = %summary.run_id, error = %e, "failed to record scan run");
    }

    finish(&summary)
}

/// Run one scan against an in-memory store with notifications and insight
/// annotations disabled.
///
/// Listing and search requests are still made; nothing is persisted and
/// neither the webhook nor the insight API is called.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be built or the run ends
/// `failed`.
pub(crate) async fn run_dry_scan(config: &AppConfig) -> anyhow::Result<()> {
    let store = Arc::new(MemoryTrendStore::new());
    let scanner = Scanner::new(
        ScanSettings::from_config(config),
        Arc::new(ListingClient::from_config(config)?),
        Arc::new(SearchInterestClient::from_config(config)?),
        store.clone(),
        Arc::new(NoopAnnotator),
        Dispatcher::new(Arc::new(NoopNotifier), config.hot_threshold),
    );

    let summary = scanner.run_scan(TriggerSource::Cli).await?;

    for row in store.products().iter().take(10) {
        eprintln!(
            "dry-run: {:>6.2}  {:<12}  {}",
            row.trend_score, row.category, row.name
        );
    }

    finish(&summary)
}

fn finish(summary: &RunSummary) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);

    if summary.status == RunStatus::Failed {
        anyhow::bail!(
            "scan failed: {}",
            summary.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
