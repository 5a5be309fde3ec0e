use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Serialize;
use trendwatch_pipeline::{PipelineError, TriggerSource};

use crate::middleware::RequestId;
use crate::scheduler::run_recorded_scan;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct ScanAccepted {
    status: &'static str,
    trigger: &'static str,
}

/// Starts a scan in the background and acknowledges immediately.
///
/// Answers 409 while another scan holds the run gate.
pub(super) async fn trigger_scan(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<(StatusCode, Json<ApiResponse<ScanAccepted>>), ApiError> {
    let permit = match state.scanner.try_start() {
        Ok(permit) => permit,
        Err(e @ PipelineError::AlreadyRunning) => {
            tracing::info!("scan trigger rejected: already running");
            return Err(ApiError::new(req_id.0, "conflict", e.to_string()));
        }
        Err(e) => {
            tracing::error!(error = %e, "scan trigger failed");
            return Err(ApiError::new(req_id.0, "internal_error", e.to_string()));
        }
    };

    let scanner = Arc::clone(&state.scanner);
    let pool = state.pool.clone();
    let cancel = state.shutdown.child_token();
    state.tasks.spawn(async move {
        run_recorded_scan(&scanner, &pool, permit, TriggerSource::Api, &cancel).await;
    });

    tracing::info!(request_id = %req_id.0, "scan triggered via API");
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: ScanAccepted {
                status: "accepted",
                trigger: TriggerSource::Api.as_str(),
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}
