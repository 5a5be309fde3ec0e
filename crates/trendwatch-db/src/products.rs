//! Database operations for `trending_products` and `trend_history`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use trendwatch_core::{IdentityKey, ScoredProduct};

use crate::DbError;

// Numeric columns are read back as float8 so rows carry plain `f64`.
const PRODUCT_COLUMNS: &str = "id, name, category, name_key, category_key, source_url, \
     trend_score::float8 AS trend_score, search_volume, \
     price_estimate::float8 AS price_estimate, \
     velocity_score::float8 AS velocity_score, rank_score::float8 AS rank_score, \
     price_score::float8 AS price_score, competition_score::float8 AS competition_score, \
     status, notes, first_seen_at, last_updated_at";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `trending_products` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TrendingProductRow {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub name_key: String,
    pub category_key: String,
    pub source_url: String,
    pub trend_score: f64,
    pub search_volume: i32,
    pub price_estimate: Option<f64>,
    pub velocity_score: f64,
    pub rank_score: f64,
    pub price_score: f64,
    pub competition_score: f64,
    /// `active` or `archived`. Only external archival changes it.
    pub status: String,
    pub notes: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

/// A row from the `trend_history` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TrendHistoryRow {
    pub id: i64,
    pub product_id: i64,
    pub trend_score: f64,
    pub search_volume: i32,
    pub recorded_at: DateTime<Utc>,
}

pub(crate) fn volume_to_i32(volume: u32) -> i32 {
    i32::try_from(volume).unwrap_or(i32::MAX)
}

// ---------------------------------------------------------------------------
// trending_products operations
// ---------------------------------------------------------------------------

/// Looks up a product by its normalized identity key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_product_by_identity(
    pool: &PgPool,
    key: &IdentityKey,
) -> Result<Option<TrendingProductRow>, DbError> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM trending_products \
         WHERE name_key = $1 AND category_key = $2"
    );
    let row = sqlx::query_as::<_, TrendingProductRow>(&sql)
        .bind(&key.name_key)
        .bind(&key.category_key)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Inserts a newly observed product with `first_seen_at = last_updated_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::IdentityConflict`] if another writer inserted the same
/// identity first, or [`DbError::Sqlx`] for any other failure.
pub async fn insert_trending_product(
    pool: &PgPool,
    key: &IdentityKey,
    product: &ScoredProduct,
) -> Result<TrendingProductRow, DbError> {
    let sql = format!(
        "INSERT INTO trending_products \
             (name, category, name_key, category_key, source_url, trend_score, \
              search_volume, price_estimate, velocity_score, rank_score, price_score, \
              competition_score, status, notes) \
         VALUES ($1, $2, $3, $4, $5, $6::numeric(5,2), \
                 $7, $8::numeric(10,2), $9::numeric(5,2), $10::numeric(5,2), $11::numeric(5,2), \
                 $12::numeric(5,2), $13, $14) \
         RETURNING {PRODUCT_COLUMNS}"
    );
    let result = sqlx::query_as::<_, TrendingProductRow>(&sql)
        .bind(&product.name)
        .bind(&product.category)
        .bind(&key.name_key)
        .bind(&key.category_key)
        .bind(&product.source_url)
        .bind(product.score)
        .bind(volume_to_i32(product.search_volume))
        .bind(product.price_estimate)
        .bind(product.breakdown.velocity)
        .bind(product.breakdown.rank)
        .bind(product.breakdown.price)
        .bind(product.breakdown.competition)
        .bind(product.status.as_str())
        .bind(&product.notes)
        .fetch_one(pool)
        .await;

    match result {
        Ok(row) => Ok(row),
        Err(e) if DbError::is_unique_violation(&e) => Err(DbError::IdentityConflict {
            name_key: key.name_key.clone(),
            category_key: key.category_key.clone(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Overwrites score, breakdown, volume, price and notes in place and refreshes
/// `last_updated_at`. `first_seen_at` and `status` are never touched.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has `id`, or [`DbError::Sqlx`] if
/// the update fails.
pub async fn update_trending_product(
    pool: &PgPool,
    id: i64,
    product: &ScoredProduct,
) -> Result<TrendingProductRow, DbError> {
    let sql = format!(
        "UPDATE trending_products SET \
             trend_score       = $2::numeric(5,2), \
             search_volume     = $3, \
             price_estimate    = $4::numeric(10,2), \
             velocity_score    = $5::numeric(5,2), \
             rank_score        = $6::numeric(5,2), \
             price_score       = $7::numeric(5,2), \
             competition_score = $8::numeric(5,2), \
             notes             = $9, \
             last_updated_at   = NOW() \
         WHERE id = $1 \
         RETURNING {PRODUCT_COLUMNS}"
    );
    sqlx::query_as::<_, TrendingProductRow>(&sql)
        .bind(id)
        .bind(product.score)
        .bind(volume_to_i32(product.search_volume))
        .bind(product.price_estimate)
        .bind(product.breakdown.velocity)
        .bind(product.breakdown.rank)
        .bind(product.breakdown.price)
        .bind(product.breakdown.competition)
        .bind(&product.notes)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Returns the top `limit` active products by descending score, ties by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_top_products(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<TrendingProductRow>, DbError> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM trending_products \
         WHERE status = 'active' \
         ORDER BY trend_score DESC, name ASC, id ASC \
         LIMIT $1"
    );
    let rows = sqlx::query_as::<_, TrendingProductRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Fetches one product by surrogate id, regardless of status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &PgPool, id: i64) -> Result<Option<TrendingProductRow>, DbError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM trending_products WHERE id = $1");
    let row = sqlx::query_as::<_, TrendingProductRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Marks active products as `archived` when they have not been touched for
/// `older_than_days` and score below `below_score`.
///
/// Returns the number of rows archived.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn archive_stale_products(
    pool: &PgPool,
    older_than_days: i32,
    below_score: f64,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE trending_products \
         SET status = 'archived' \
         WHERE status = 'active' \
           AND last_updated_at < NOW() - make_interval(days => $1) \
           AND trend_score < $2::numeric(5,2)",
    )
    .bind(older_than_days)
    .bind(below_score)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// trend_history operations
// ---------------------------------------------------------------------------

/// Appends one history snapshot for `product_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_history(
    pool: &PgPool,
    product_id: i64,
    trend_score: f64,
    search_volume: u32,
) -> Result<TrendHistoryRow, DbError> {
    let row = sqlx::query_as::<_, TrendHistoryRow>(
        "INSERT INTO trend_history (product_id, trend_score, search_volume) \
         VALUES ($1, $2::numeric(5,2), $3) \
         RETURNING id, product_id, trend_score::float8 AS trend_score, search_volume, recorded_at",
    )
    .bind(product_id)
    .bind(trend_score)
    .bind(volume_to_i32(search_volume))
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Returns up to `limit` history rows for a product, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_history(
    pool: &PgPool,
    product_id: i64,
    limit: i64,
) -> Result<Vec<TrendHistoryRow>, DbError> {
    let rows = sqlx::query_as::<_, TrendHistoryRow>(
        "SELECT id, product_id, trend_score::float8 AS trend_score, search_volume, recorded_at \
         FROM trend_history \
         WHERE product_id = $1 \
         ORDER BY recorded_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(product_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
