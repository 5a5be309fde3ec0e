//! In-process [`TrendStore`] used by dry-run scans and tests.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use trendwatch_core::{IdentityKey, ProductStatus, ScoredProduct};

use crate::products::{volume_to_i32, TrendHistoryRow, TrendingProductRow};
use crate::store::TrendStore;
use crate::DbError;

#[derive(Debug, Default)]
struct Tables {
    products: Vec<TrendingProductRow>,
    history: Vec<TrendHistoryRow>,
    next_product_id: i64,
    next_history_id: i64,
}

/// Mirrors the Postgres schema rules: unique identity, cascade-free
/// append-only history, active-only top-K.
#[derive(Debug, Default)]
pub struct MemoryTrendStore {
    tables: Mutex<Tables>,
}

impl MemoryTrendStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All product rows in insertion order.
    #[must_use]
    pub fn products(&self) -> Vec<TrendingProductRow> {
        self.lock().products.clone()
    }

    /// All history rows in insertion order.
    #[must_use]
    pub fn history(&self) -> Vec<TrendHistoryRow> {
        self.lock().history.clone()
    }

    /// Overrides a product's status, standing in for external archival.
    pub fn set_status(&self, id: i64, status: ProductStatus) {
        if let Some(row) = self.lock().products.iter_mut().find(|p| p.id == id) {
            row.status = status.as_str().to_owned();
        }
    }
}

#[async_trait]
impl TrendStore for MemoryTrendStore {
    async fn find_by_identity(
        &self,
        key: &IdentityKey,
    ) -> Result<Option<TrendingProductRow>, DbError> {
        Ok(self
            .lock()
            .products
            .iter()
            .find(|p| p.name_key == key.name_key && p.category_key == key.category_key)
            .cloned())
    }

    async fn insert_product(
        &self,
        key: &IdentityKey,
        product: &ScoredProduct,
    ) -> Result<TrendingProductRow, DbError> {
        let mut tables = self.lock();
        if tables
            .products
            .iter()
            .any(|p| p.name_key == key.name_key && p.category_key == key.category_key)
        {
            return Err(DbError::IdentityConflict {
                name_key: key.name_key.clone(),
                category_key: key.category_key.clone(),
            });
        }

        tables.next_product_id += 1;
        let now = Utc::now();
        let row = TrendingProductRow {
            id: tables.next_product_id,
            name: product.name.clone(),
            category: product.category.clone(),
            name_key: key.name_key.clone(),
            category_key: key.category_key.clone(),
            source_url: product.source_url.clone(),
            trend_score: product.score,
            search_volume: volume_to_i32(product.search_volume),
            price_estimate: product.price_estimate,
            velocity_score: product.breakdown.velocity,
            rank_score: product.breakdown.rank,
            price_score: product.breakdown.price,
            competition_score: product.breakdown.competition,
            status: product.status.as_str().to_owned(),
            notes: product.notes.clone(),
            first_seen_at: now,
            last_updated_at: now,
        };
        tables.products.push(row.clone());
        Ok(row)
    }

    async fn update_product(
        &self,
        id: i64,
        product: &ScoredProduct,
    ) -> Result<TrendingProductRow, DbError> {
        let mut tables = self.lock();
        let row = tables
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(DbError::NotFound)?;

        row.trend_score = product.score;
        row.search_volume = volume_to_i32(product.search_volume);
        row.price_estimate = product.price_estimate;
        row.velocity_score = product.breakdown.velocity;
        row.rank_score = product.breakdown.rank;
        row.price_score = product.breakdown.price;
        row.competition_score = product.breakdown.competition;
        row.notes.clone_from(&product.notes);
        row.last_updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn append_history(
        &self,
        product_id: i64,
        trend_score: f64,
        search_volume: u32,
    ) -> Result<TrendHistoryRow, DbError> {
        let mut tables = self.lock();
        if !tables.products.iter().any(|p| p.id == product_id) {
            return Err(DbError::NotFound);
        }
        tables.next_history_id += 1;
        let row = TrendHistoryRow {
            id: tables.next_history_id,
            product_id,
            trend_score,
            search_volume: volume_to_i32(search_volume),
            recorded_at: Utc::now(),
        };
        tables.history.push(row.clone());
        Ok(row)
    }

    async fn top_products(&self, limit: i64) -> Result<Vec<TrendingProductRow>, DbError> {
        let mut rows: Vec<TrendingProductRow> = self
            .lock()
            .products
            .iter()
            .filter(|p| p.status == ProductStatus::Active.as_str())
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.trend_score
                .total_cmp(&a.trend_score)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        rows.truncate(usize::try_from(limit.max(0)).unwrap_or(0));
        Ok(rows)
    }

    async fn get_product(&self, id: i64) -> Result<Option<TrendingProductRow>, DbError> {
        Ok(self.lock().products.iter().find(|p| p.id == id).cloned())
    }

    async fn product_history(
        &self,
        product_id: i64,
        limit: i64,
    ) -> Result<Vec<TrendHistoryRow>, DbError> {
        let mut rows: Vec<TrendHistoryRow> = self
            .lock()
            .history
            .iter()
            .filter(|h| h.product_id == product_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));
        rows.truncate(usize::try_from(limit.max(0)).unwrap_or(0));
        Ok(rows)
    }

    async fn archive_stale(&self, older_than_days: u32, below_score: f64) -> Result<u64, DbError> {
        let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));
        let mut archived = 0u64;
        for row in &mut self.lock().products {
            if row.status == ProductStatus::Active.as_str()
                && row.last_updated_at < cutoff
                && row.trend_score < below_score
            {
                row.status = ProductStatus::Archived.as_str().to_owned();
                archived += 1;
            }
        }
        Ok(archived)
    }
}
