use chrono::{DateTime, Utc};
use serde::Serialize;
use trendwatch_db::NewScanRun;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

/// What started a scan. Stored on the `scan_runs` audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Scheduler,
    Api,
    Cli,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSource::Scheduler => "scheduler",
            TriggerSource::Api => "api",
            TriggerSource::Cli => "cli",
        }
    }
}

/// Result of one scan, returned whatever the outcome.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub trigger: TriggerSource,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Listing entries returned by every category, before deduplication.
    pub fetched: usize,
    pub scored: usize,
    pub persisted: usize,
    pub notified: usize,
    /// Products scored without search data because the lookup failed.
    pub search_failures: usize,
    pub degraded_categories: Vec<String>,
    pub error: Option<String>,
}

impl RunSummary {
    /// The `scan_runs` audit row for this summary.
    #[must_use]
    pub fn to_scan_run(&self) -> NewScanRun<'_> {
        NewScanRun {
            public_id: self.run_id,
            trigger_source: self.trigger.as_str(),
            status: self.status.as_str(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            fetched: self.fetched,
            scored: self.scored,
            persisted: self.persisted,
            notified: self.notified,
            search_failures: self.search_failures,
            degraded_categories: &self.degraded_categories,
            error_message: self.error.as_deref(),
        }
    }
}
