//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the daily
//! trend scan and the stale-product archive job. Scans run on a shared
//! [`TaskTracker`] so shutdown can wait for them.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use trendwatch_core::AppConfig;
use trendwatch_pipeline::{RunPermit, RunSummary, Scanner, TriggerSource};

/// Daily at 05:30 UTC, ahead of the default scan.
const ARCHIVE_CRON: &str = "0 30 5 * * *";

/// Products below this score are archived once stale.
const ARCHIVE_BELOW_SCORE: f64 = 50.0;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    scanner: Arc<Scanner>,
    pool: PgPool,
    config: Arc<AppConfig>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_scan_job(
        &scheduler,
        Arc::clone(&scanner),
        pool,
        &config.scan_cron,
        shutdown,
        tasks,
    )
    .await?;
    register_archive_job(&scheduler, scanner, config.archive_after_days).await?;

    scheduler.start().await?;
    tracing::info!(cron = %config.scan_cron, "scheduler: trend scan registered");
    Ok(scheduler)
}

/// Register the recurring trend scan. A tick that finds a scan already in
/// flight, or arrives after shutdown began, is skipped.
async fn register_scan_job(
    scheduler: &JobScheduler,
    scanner: Arc<Scanner>,
    pool: PgPool,
    cron: &str,
    shutdown: CancellationToken,
    tasks: TaskTracker,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let scanner = Arc::clone(&scanner);
        let pool = pool.clone();
        let cancel = shutdown.child_token();
        let tasks = tasks.clone();

        Box::pin(async move {
            if cancel.is_cancelled() {
                tracing::info!("scheduler: shutting down, skipping trend scan");
                return;
            }
            let Ok(permit) = scanner.try_start() else {
                tracing::warn!("scheduler: trend scan still running, skipping this tick");
                return;
            };
            tracing::info!("scheduler: starting trend scan");
            tasks.spawn(async move {
                run_recorded_scan(&scanner, &pool, permit, TriggerSource::Scheduler, &cancel)
                    .await;
            });
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Register the daily archive of products that stopped trending.
async fn register_archive_job(
    scheduler: &JobScheduler,
    scanner: Arc<Scanner>,
    older_than_days: u32,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(ARCHIVE_CRON, move |_uuid, _lock| {
        let scanner = Arc::clone(&scanner);

        Box::pin(async move {
            match scanner
                .store()
                .archive_stale(older_than_days, ARCHIVE_BELOW_SCORE)
                .await
            {
                Ok(archived) => {
                    tracing::info!(archived, older_than_days, "scheduler: stale products archived");
                }
                Err(e) => {
                    tracing::error!(error = %e, "scheduler: archive job failed");
                }
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Runs a scan under `permit` and records it in `scan_runs`.
///
/// Recording is best-effort: a failed insert is logged and does not change
/// the returned summary.
pub(crate) async fn run_recorded_scan(
    scanner: &Scanner,
    pool: &PgPool,
    permit: RunPermit,
    trigger: TriggerSource,
    cancel: &CancellationToken,
) -> RunSummary {
    let summary = scanner.run_with_permit(permit, trigger, cancel).await;

    if let Err(e) = trendwatch_db::insert_scan_run(pool, &summary.to_scan_run()).await {
        tracing::warn!(
            run_id = %summary.run_id,
            error = %e,
            "failed to record scan run"
        );
    }
    summary
}

/// Closes `tasks` and waits up to `grace` for in-flight scans to finish
/// their failure notification and `scan_runs` record.
///
/// Returns `false` if the grace period ran out first.
pub(crate) async fn drain_scans(tasks: &TaskTracker, grace: Duration) -> bool {
    tasks.close();
    if tasks.is_empty() {
        return true;
    }
    tracing::info!(in_flight = tasks.len(), "waiting for background scans to finish");
    let drained = tokio::time::timeout(grace, tasks.wait()).await.is_ok();
    if !drained {
        tracing::warn!(
            grace_secs = grace.as_secs(),
            "background scans still running at shutdown deadline"
        );
    }
    drained
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_with_no_scans_returns_immediately() {
        let tasks = TaskTracker::new();
        assert!(drain_scans(&tasks, Duration::from_millis(1)).await);
        assert!(tasks.is_closed());
    }

    #[tokio::test]
    async fn drain_gives_up_after_grace_period() {
        let tasks = TaskTracker::new();
        let stuck = CancellationToken::new();
        let waiter = stuck.clone();
        tasks.spawn(async move { waiter.cancelled().await });

        assert!(!drain_scans(&tasks, Duration::from_millis(20)).await);

        stuck.cancel();
        tasks.wait().await;
    }
}
