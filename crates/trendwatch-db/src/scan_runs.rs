//! Database operations for the `scan_runs` audit table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const SCAN_RUN_COLUMNS: &str = "id, public_id, trigger_source, status, started_at, completed_at, \
     fetched, scored, persisted, notified, search_failures, degraded_categories, error_message, \
     created_at";

/// A row from the `scan_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScanRunRow {
    pub id: i64,
    pub public_id: Uuid,
    /// `scheduler`, `api` or `cli`.
    pub trigger_source: String,
    /// `success`, `partial` or `failed`.
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub fetched: i32,
    pub scored: i32,
    pub persisted: i32,
    pub notified: i32,
    /// Products whose search-interest lookup exhausted its retries.
    pub search_failures: i32,
    pub degraded_categories: Vec<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A completed run to be recorded.
#[derive(Debug, Clone)]
pub struct NewScanRun<'a> {
    pub public_id: Uuid,
    pub trigger_source: &'a str,
    pub status: &'a str,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub fetched: usize,
    pub scored: usize,
    pub persisted: usize,
    pub notified: usize,
    pub search_failures: usize,
    pub degraded_categories: &'a [String],
    pub error_message: Option<&'a str>,
}

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Records a finished run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_scan_run(pool: &PgPool, run: &NewScanRun<'_>) -> Result<ScanRunRow, DbError> {
    let sql = format!(
        "INSERT INTO scan_runs \
             (public_id, trigger_source, status, started_at, completed_at, \
              fetched, scored, persisted, notified, search_failures, degraded_categories, \
              error_message) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         RETURNING {SCAN_RUN_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ScanRunRow>(&sql)
        .bind(run.public_id)
        .bind(run.trigger_source)
        .bind(run.status)
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(count(run.fetched))
        .bind(count(run.scored))
        .bind(count(run.persisted))
        .bind(count(run.notified))
        .bind(count(run.search_failures))
        .bind(run.degraded_categories)
        .bind(run.error_message)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Fetches a run by its public UUID.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no run has `public_id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_scan_run(pool: &PgPool, public_id: Uuid) -> Result<ScanRunRow, DbError> {
    let sql = format!("SELECT {SCAN_RUN_COLUMNS} FROM scan_runs WHERE public_id = $1");
    sqlx::query_as::<_, ScanRunRow>(&sql)
        .bind(public_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_scan_runs(pool: &PgPool, limit: i64) -> Result<Vec<ScanRunRow>, DbError> {
    let sql = format!(
        "SELECT {SCAN_RUN_COLUMNS} FROM scan_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    );
    let rows = sqlx::query_as::<_, ScanRunRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
