use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct RunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ScanRunItem {
    run_id: Uuid,
    trigger_source: String,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    fetched: i32,
    scored: i32,
    persisted: i32,
    notified: i32,
    search_failures: i32,
    degraded_categories: Vec<String>,
    error_message: Option<String>,
}

pub(super) async fn list_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<ApiResponse<Vec<ScanRunItem>>>, ApiError> {
    let rows = trendwatch_db::list_scan_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| ScanRunItem {
            run_id: row.public_id,
            trigger_source: row.trigger_source,
            status: row.status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            fetched: row.fetched,
            scored: row.scored,
            persisted: row.persisted,
            notified: row.notified,
            search_failures: row.search_failures,
            degraded_categories: row.degraded_categories,
            error_message: row.error_message,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
