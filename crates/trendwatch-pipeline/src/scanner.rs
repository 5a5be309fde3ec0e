//! The scan orchestrator.
//!
//! One run walks Fetching → Scoring → Persisting → Notifying → Completed.
//! Failed listing categories and exhausted search lookups degrade the run to
//! `partial`; a persistence error or a cancellation ends it as `failed`. Either way a failure notification is
//! attempted and a [`RunSummary`] is returned.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use trendwatch_core::{AppConfig, IdentityKey, ListingEntry, SearchSignal};
use trendwatch_db::{upsert_scored_product, TrendStore, TrendingProductRow};
use trendwatch_insight::{annotator_from_config, Annotator};
use trendwatch_notify::{notifier_from_config, Dispatcher, ProductDigest};
use trendwatch_sources::{
    ListingClient, ListingSource, SearchInterestClient, SearchInterestSource, SourceError,
};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::fusion::{annotate_products, dedup_entries, fuse};
use crate::gate::{RunGate, RunPermit, RunStage};
use crate::summary::{RunStatus, RunSummary, TriggerSource};

/// Per-run knobs taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub categories: Vec<String>,
    pub products_per_category: usize,
    pub listing_concurrency: usize,
    pub insight_min_score: f64,
}

impl ScanSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            categories: config.categories.clone(),
            products_per_category: config.products_per_category,
            listing_concurrency: config.listing_concurrency.max(1),
            insight_min_score: config.insight_min_score,
        }
    }
}

/// Outcome of the fetch stage.
struct Fetched {
    entries: Vec<ListingEntry>,
    degraded: Vec<String>,
}

pub struct Scanner {
    settings: ScanSettings,
    listing: Arc<dyn ListingSource>,
    search: Arc<dyn SearchInterestSource>,
    store: Arc<dyn TrendStore>,
    annotator: Arc<dyn Annotator>,
    dispatcher: Dispatcher,
    gate: Arc<RunGate>,
}

impl Scanner {
    #[must_use]
    pub fn new(
        settings: ScanSettings,
        listing: Arc<dyn ListingSource>,
        search: Arc<dyn SearchInterestSource>,
        store: Arc<dyn TrendStore>,
        annotator: Arc<dyn Annotator>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            settings,
            listing,
            search,
            store,
            annotator,
            dispatcher,
            gate: RunGate::new(),
        }
    }

    /// Wires the HTTP sources, annotator and notifier described by `config`
    /// around `store`.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] if any HTTP client cannot be built.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn TrendStore>,
    ) -> Result<Self, PipelineError> {
        let listing = ListingClient::from_config(config)?;
        let search = SearchInterestClient::from_config(config)?;
        let annotator = annotator_from_config(config)?;
        let notifier = notifier_from_config(config)?;

        tracing::info!(
            region = %config.region,
            categories = config.categories.len(),
            per_category = config.products_per_category,
            "scanner configured"
        );

        Ok(Self::new(
            ScanSettings::from_config(config),
            Arc::new(listing),
            Arc::new(search),
            store,
            annotator,
            Dispatcher::new(notifier, config.hot_threshold),
        ))
    }

    #[must_use]
    pub fn gate(&self) -> &Arc<RunGate> {
        &self.gate
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn TrendStore> {
        &self.store
    }

    /// Claims the single-flight gate without starting any work, so callers
    /// can answer "already running" synchronously and run in the background.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AlreadyRunning`] while another run is active.
    pub fn try_start(&self) -> Result<RunPermit, PipelineError> {
        self.gate.try_acquire().ok_or(PipelineError::AlreadyRunning)
    }

    /// Claims the gate and runs one scan to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AlreadyRunning`] while another run is active.
    /// Every other outcome, including failure, is reported in the summary.
    pub async fn run_scan(&self, trigger: TriggerSource) -> Result<RunSummary, PipelineError> {
        let permit = self.try_start()?;
        Ok(self
            .run_with_permit(permit, trigger, &CancellationToken::new())
            .await)
    }

    /// Runs one scan while holding `permit`. The gate is released when this
    /// returns.
    pub async fn run_with_permit(
        &self,
        permit: RunPermit,
        trigger: TriggerSource,
        cancel: &CancellationToken,
    ) -> RunSummary {
        let mut summary = RunSummary {
            run_id: Uuid::new_v4(),
            trigger,
            status: RunStatus::Success,
            started_at: Utc::now(),
            completed_at: Utc::now(),
            fetched: 0,
            scored: 0,
            persisted: 0,
            notified: 0,
            search_failures: 0,
            degraded_categories: Vec::new(),
            error: None,
        };

        tracing::info!(
            run_id = %summary.run_id,
            trigger = trigger.as_str(),
            categories = self.settings.categories.len(),
            "trend scan started"
        );

        let result = self.execute(&permit, cancel, &mut summary).await;

        if let Err(message) = result {
            summary.status = RunStatus::Failed;
            summary.error = Some(message);
        } else if let Some(message) = degradation_message(&summary) {
            summary.status = RunStatus::Partial;
            summary.error = Some(message);
        }

        if summary.status != RunStatus::Success {
            let message = summary.error.as_deref().unwrap_or("unknown error");
            self.dispatcher
                .notify_failure(summary.status.as_str(), message)
                .await;
        }

        permit.set_stage(match summary.status {
            RunStatus::Failed => RunStage::Failed,
            RunStatus::Success | RunStatus::Partial => RunStage::Completed,
        });
        summary.completed_at = Utc::now();

        tracing::info!(
            run_id = %summary.run_id,
            status = summary.status.as_str(),
            fetched = summary.fetched,
            scored = summary.scored,
            persisted = summary.persisted,
            notified = summary.notified,
            search_failures = summary.search_failures,
            degraded = summary.degraded_categories.len(),
            "trend scan finished"
        );
        summary
    }

    /// Runs every stage, filling counts into `summary` as they complete.
    /// An `Err` carries the message that fails the run.
    async fn execute(
        &self,
        permit: &RunPermit,
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<(), String> {
        // --- Fetching ---
        permit.set_stage(RunStage::Fetching);
        let fetched = self.fetch_listings().await;
        summary.fetched = fetched.entries.len();
        summary.degraded_categories = fetched.degraded;
        check_cancelled(cancel)?;

        if fetched.entries.is_empty() && !summary.degraded_categories.is_empty() {
            return Err("no listing entries fetched from any category".to_owned());
        }

        let entries = dedup_entries(fetched.entries);
        let signals = self.collect_signals(&entries, cancel, summary).await?;

        // --- Scoring ---
        permit.set_stage(RunStage::Scoring);
        let mut products = fuse(&entries, &signals);
        let annotated = annotate_products(
            &mut products,
            self.annotator.as_ref(),
            self.settings.insight_min_score,
        )
        .await;
        summary.scored = products.len();
        tracing::info!(scored = products.len(), annotated, "scoring complete");
        check_cancelled(cancel)?;

        // --- Persisting ---
        permit.set_stage(RunStage::Persisting);
        let mut touched: Vec<ProductDigest> = Vec::with_capacity(products.len());
        for product in &products {
            let persisted = upsert_scored_product(self.store.as_ref(), product)
                .await
                .map_err(|e| {
                    tracing::error!(product = %product.name, error = %e, "persistence failed");
                    format!("persistence failed: {e}")
                })?;
            touched.push(digest(&persisted.row));
            summary.persisted += 1;
        }
        check_cancelled(cancel)?;

        // --- Notifying ---
        permit.set_stage(RunStage::Notifying);
        summary.notified = self.dispatcher.notify_hot(&touched).await;

        Ok(())
    }

    /// Fetches every configured category with bounded concurrency. A failed
    /// category contributes no entries and is reported as degraded.
    async fn fetch_listings(&self) -> Fetched {
        let limit = self.settings.products_per_category;
        let listing = &self.listing;
        let categories = &self.settings.categories;

        let mut results: Vec<(usize, &String, Result<Vec<ListingEntry>, SourceError>)> =
            stream::iter(0..categories.len())
                .map(|idx| {
                    // Index-based iteration keeps the closure argument free of
                    // borrowed lifetimes so the future stays provably `Send`.
                    let category = &categories[idx];
                    async move { (idx, category, listing.fetch_category(category, limit).await) }
                })
                .buffer_unordered(self.settings.listing_concurrency)
                .collect()
                .await;

        results.sort_by_key(|(idx, _, _)| *idx);

        let mut entries = Vec::new();
        let mut degraded = Vec::new();
        for (_, category, result) in results {
            match result {
                Ok(found) => {
                    tracing::info!(category = %category, entries = found.len(), "category fetched");
                    entries.extend(found);
                }
                Err(e) => {
                    tracing::warn!(category = %category, error = %e, "category degraded");
                    degraded.push(category.clone());
                }
            }
        }

        Fetched { entries, degraded }
    }

    /// Looks up search interest one product at a time; the source throttles
    /// itself between calls. A failed lookup scores as "no signal" and is
    /// counted in `summary.search_failures`.
    async fn collect_signals(
        &self,
        entries: &[ListingEntry],
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<HashMap<IdentityKey, SearchSignal>, String> {
        let mut signals = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            check_cancelled(cancel)?;
            let signal = match self.search.signal(&entry.name, &entry.category).await {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::warn!(product = %entry.name, error = %e, "search lookup failed");
                    summary.search_failures += 1;
                    SearchSignal::none(&entry.name)
                }
            };
            tracing::debug!(
                idx = idx + 1,
                total = entries.len(),
                product = %entry.name,
                has_data = signal.has_data(),
                "search signal"
            );
            signals.insert(entry.identity_key(), signal);
        }
        if summary.search_failures > 0 {
            tracing::warn!(
                failed = summary.search_failures,
                total = entries.len(),
                "search interest degraded"
            );
        }
        Ok(signals)
    }
}

/// Why a run that completed every stage is `partial`, or `None` when it
/// is a clean success.
fn degradation_message(summary: &RunSummary) -> Option<String> {
    let mut reasons = Vec::new();
    if !summary.degraded_categories.is_empty() {
        reasons.push(format!(
            "degraded categories: {}",
            summary.degraded_categories.join(", ")
        ));
    }
    if summary.search_failures > 0 {
        reasons.push(format!(
            "search interest unavailable for {} of {} products",
            summary.search_failures, summary.scored
        ));
    }
    if reasons.is_empty() {
        None
    } else {
        Some(reasons.join("; "))
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), String> {
    if cancel.is_cancelled() {
        return Err("scan cancelled".to_owned());
    }
    Ok(())
}

fn digest(row: &TrendingProductRow) -> ProductDigest {
    ProductDigest {
        name: row.name.clone(),
        category: row.category.clone(),
        source_url: row.source_url.clone(),
        score: row.trend_score,
        price_estimate: row.price_estimate,
        search_volume: u32::try_from(row.search_volume).unwrap_or(0),
    }
}
