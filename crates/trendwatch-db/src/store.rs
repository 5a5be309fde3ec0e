//! Storage abstraction for scored products and the upsert-by-identity rule.

use async_trait::async_trait;
use sqlx::PgPool;
use trendwatch_core::{IdentityKey, ScoredProduct};

use crate::products::{self, TrendHistoryRow, TrendingProductRow};
use crate::DbError;

/// Storage for `trending_products` and `trend_history`.
///
/// Implementations are the only writers of these tables. `insert_product`
/// must report a duplicate identity as [`DbError::IdentityConflict`].
#[async_trait]
pub trait TrendStore: Send + Sync {
    async fn find_by_identity(
        &self,
        key: &IdentityKey,
    ) -> Result<Option<TrendingProductRow>, DbError>;

    async fn insert_product(
        &self,
        key: &IdentityKey,
        product: &ScoredProduct,
    ) -> Result<TrendingProductRow, DbError>;

    async fn update_product(
        &self,
        id: i64,
        product: &ScoredProduct,
    ) -> Result<TrendingProductRow, DbError>;

    async fn append_history(
        &self,
        product_id: i64,
        trend_score: f64,
        search_volume: u32,
    ) -> Result<TrendHistoryRow, DbError>;

    async fn top_products(&self, limit: i64) -> Result<Vec<TrendingProductRow>, DbError>;

    async fn get_product(&self, id: i64) -> Result<Option<TrendingProductRow>, DbError>;

    async fn product_history(
        &self,
        product_id: i64,
        limit: i64,
    ) -> Result<Vec<TrendHistoryRow>, DbError>;

    async fn archive_stale(&self, older_than_days: u32, below_score: f64) -> Result<u64, DbError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone)]
pub struct PersistedProduct {
    pub row: TrendingProductRow,
    pub outcome: UpsertOutcome,
}

/// Writes one scored product: insert when its identity is new, update in
/// place otherwise, then append exactly one history row.
///
/// An [`DbError::IdentityConflict`] on insert means a concurrent writer won
/// the race; the row is re-read and updated instead.
///
/// # Errors
///
/// Returns any [`DbError`] other than a recovered identity conflict.
pub async fn upsert_scored_product(
    store: &dyn TrendStore,
    product: &ScoredProduct,
) -> Result<PersistedProduct, DbError> {
    let key = product.identity_key();

    let (row, outcome) = match store.find_by_identity(&key).await? {
        Some(existing) => (
            store.update_product(existing.id, product).await?,
            UpsertOutcome::Updated,
        ),
        None => match store.insert_product(&key, product).await {
            Ok(row) => (row, UpsertOutcome::Created),
            Err(DbError::IdentityConflict { .. }) => {
                tracing::info!(identity = %key, "identity conflict on insert, updating instead");
                let existing = store
                    .find_by_identity(&key)
                    .await?
                    .ok_or(DbError::NotFound)?;
                (
                    store.update_product(existing.id, product).await?,
                    UpsertOutcome::Updated,
                )
            }
            Err(e) => return Err(e),
        },
    };

    store
        .append_history(row.id, product.score, product.search_volume)
        .await?;

    Ok(PersistedProduct { row, outcome })
}

/// [`TrendStore`] backed by Postgres.
#[derive(Clone)]
pub struct PgTrendStore {
    pool: PgPool,
}

impl PgTrendStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TrendStore for PgTrendStore {
    async fn find_by_identity(
        &self,
        key: &IdentityKey,
    ) -> Result<Option<TrendingProductRow>, DbError> {
        products::find_product_by_identity(&self.pool, key).await
    }

    async fn insert_product(
        &self,
        key: &IdentityKey,
        product: &ScoredProduct,
    ) -> Result<TrendingProductRow, DbError> {
        products::insert_trending_product(&self.pool, key, product).await
    }

    async fn update_product(
        &self,
        id: i64,
        product: &ScoredProduct,
    ) -> Result<TrendingProductRow, DbError> {
        products::update_trending_product(&self.pool, id, product).await
    }

    async fn append_history(
        &self,
        product_id: i64,
        trend_score: f64,
        search_volume: u32,
    ) -> Result<TrendHistoryRow, DbError> {
        products::insert_history(&self.pool, product_id, trend_score, search_volume).await
    }

    async fn top_products(&self, limit: i64) -> Result<Vec<TrendingProductRow>, DbError> {
        products::list_top_products(&self.pool, limit).await
    }

    async fn get_product(&self, id: i64) -> Result<Option<TrendingProductRow>, DbError> {
        products::get_product(&self.pool, id).await
    }

    async fn product_history(
        &self,
        product_id: i64,
        limit: i64,
    ) -> Result<Vec<TrendHistoryRow>, DbError> {
        products::list_history(&self.pool, product_id, limit).await
    }

    async fn archive_stale(&self, older_than_days: u32, below_score: f64) -> Result<u64, DbError> {
        let days = i32::try_from(older_than_days).unwrap_or(i32::MAX);
        products::archive_stale_products(&self.pool, days, below_score).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::memory::MemoryTrendStore;
    use trendwatch_core::{ProductStatus, ScoreBreakdown};

    /// Misses the first identity lookup, as if a concurrent writer inserted
    /// the row between our lookup and our insert.
    struct RacedStore {
        inner: MemoryTrendStore,
        missed: AtomicBool,
    }

    #[async_trait]
    impl TrendStore for RacedStore {
        async fn find_by_identity(
            &self,
            key: &IdentityKey,
        ) -> Result<Option<TrendingProductRow>, DbError> {
            if !self.missed.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_by_identity(key).await
        }

        async fn insert_product(
            &self,
            key: &IdentityKey,
            product: &ScoredProduct,
        ) -> Result<TrendingProductRow, DbError> {
            self.inner.insert_product(key, product).await
        }

        async fn update_product(
            &self,
            id: i64,
            product: &ScoredProduct,
        ) -> Result<TrendingProductRow, DbError> {
            self.inner.update_product(id, product).await
        }

        async fn append_history(
            &self,
            product_id: i64,
            trend_score: f64,
            search_volume: u32,
        ) -> Result<TrendHistoryRow, DbError> {
            self.inner
                .append_history(product_id, trend_score, search_volume)
                .await
        }

        async fn top_products(&self, limit: i64) -> Result<Vec<TrendingProductRow>, DbError> {
            self.inner.top_products(limit).await
        }

        async fn get_product(&self, id: i64) -> Result<Option<TrendingProductRow>, DbError> {
            self.inner.get_product(id).await
        }

        async fn product_history(
            &self,
            product_id: i64,
            limit: i64,
        ) -> Result<Vec<TrendHistoryRow>, DbError> {
            self.inner.product_history(product_id, limit).await
        }

        async fn archive_stale(
            &self,
            older_than_days: u32,
            below_score: f64,
        ) -> Result<u64, DbError> {
            self.inner.archive_stale(older_than_days, below_score).await
        }
    }

    fn scored(score: f64) -> ScoredProduct {
        ScoredProduct {
            name: "Ice Roller".to_owned(),
            category: "Beauty".to_owned(),
            source_url: "https://www.example.com/dp/B0ICE".to_owned(),
            score,
            search_volume: 18,
            price_estimate: Some(19.99),
            breakdown: ScoreBreakdown {
                velocity: 10.0,
                rank: 30.0,
                price: 15.0,
                competition: score - 55.0,
            },
            status: ProductStatus::Active,
            notes: None,
        }
    }

    #[tokio::test]
    async fn identity_conflict_on_insert_recovers_as_update() {
        let inner = MemoryTrendStore::new();
        let existing = inner
            .insert_product(&scored(60.0).identity_key(), &scored(60.0))
            .await
            .unwrap();
        let store = RacedStore {
            inner,
            missed: AtomicBool::new(false),
        };

        let persisted = upsert_scored_product(&store, &scored(64.5)).await.unwrap();

        assert_eq!(persisted.outcome, UpsertOutcome::Updated);
        assert_eq!(persisted.row.id, existing.id);
        assert_eq!(persisted.row.first_seen_at, existing.first_seen_at);
        assert!((persisted.row.trend_score - 64.5).abs() < f64::EPSILON);

        assert_eq!(store.inner.products().len(), 1);
        let history = store.inner.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].product_id, existing.id);
        assert!((history[0].trend_score - 64.5).abs() < f64::EPSILON);
    }
}
