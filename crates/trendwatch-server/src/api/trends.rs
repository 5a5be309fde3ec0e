use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trendwatch_db::{TrendHistoryRow, TrendingProductRow};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

const HISTORY_LIMIT: i64 = 30;

#[derive(Debug, Deserialize)]
pub(super) struct TrendsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ScoreBreakdownItem {
    velocity: f64,
    rank: f64,
    price: f64,
    competition: f64,
}

#[derive(Debug, Serialize)]
pub(super) struct TrendItem {
    id: i64,
    name: String,
    category: String,
    source_url: String,
    trend_score: f64,
    search_volume: i32,
    price_estimate: Option<f64>,
    breakdown: ScoreBreakdownItem,
    status: String,
    notes: Option<String>,
    first_seen_at: DateTime<Utc>,
    last_updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct HistoryItem {
    trend_score: f64,
    search_volume: i32,
    recorded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct TrendDetail {
    #[serde(flatten)]
    product: TrendItem,
    history: Vec<HistoryItem>,
}

impl From<TrendingProductRow> for TrendItem {
    fn from(row: TrendingProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            category: row.category,
            source_url: row.source_url,
            trend_score: row.trend_score,
            search_volume: row.search_volume,
            price_estimate: row.price_estimate,
            breakdown: ScoreBreakdownItem {
                velocity: row.velocity_score,
                rank: row.rank_score,
                price: row.price_score,
                competition: row.competition_score,
            },
            status: row.status,
            notes: row.notes,
            first_seen_at: row.first_seen_at,
            last_updated_at: row.last_updated_at,
        }
    }
}

impl From<TrendHistoryRow> for HistoryItem {
    fn from(row: TrendHistoryRow) -> Self {
        Self {
            trend_score: row.trend_score,
            search_volume: row.search_volume,
            recorded_at: row.recorded_at,
        }
    }
}

/// Top-K active products by descending score.
pub(super) async fn list_trends(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<ApiResponse<Vec<TrendItem>>>, ApiError> {
    let rows = state
        .scanner
        .store()
        .top_products(normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(TrendItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// One product with its most recent history, newest first.
pub(super) async fn get_trend(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<TrendDetail>>, ApiError> {
    let store = state.scanner.store();

    let product = store
        .get_product(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("trending product {id} not found"),
            )
        })?;

    let history = store
        .product_history(id, HISTORY_LIMIT)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: TrendDetail {
            product: product.into(),
            history: history.into_iter().map(HistoryItem::from).collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
