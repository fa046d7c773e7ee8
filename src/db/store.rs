//! Storage boundary for the monitor.
//!
//! The reconciliation engine only needs the first four methods of
//! [`ProductStore`]; the rest back the operator surface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::db::queries;
use crate::models::product::{NewProduct, ProductQuery, ProductRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn count_total(&self) -> Result<u64, StoreError>;

    async fn select_ids_page(&self, offset: u64, limit: u64) -> Result<Vec<String>, StoreError>;

    /// Returns the number of rows updated.
    async fn bulk_update_validity(
        &self,
        product_ids: &[String],
        is_valid: bool,
        checked_at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    async fn select_invalid_unconfirmed(&self) -> Result<Vec<ProductRecord>, StoreError>;

    async fn find_by_product_id(&self, product_id: &str) -> Result<Option<ProductRecord>, StoreError>;

    async fn find_by_product_ids(&self, product_ids: &[String]) -> Result<Vec<ProductRecord>, StoreError>;

    /// Returns how many rows were actually inserted.
    async fn insert_ignore(&self, products: &[NewProduct]) -> Result<u64, StoreError>;

    /// Returns `true` if the row moved to confirmed.
    async fn mark_confirmed(&self, product_id: &str) -> Result<bool, StoreError>;

    /// Returns `true` if a row was deleted.
    async fn delete_by_product_id(&self, product_id: &str) -> Result<bool, StoreError>;

    async fn list(&self, query: &ProductQuery) -> Result<(Vec<ProductRecord>, u64), StoreError>;

    /// Cheap connectivity check for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// [`ProductStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn count_total(&self) -> Result<u64, StoreError> {
        let total = queries::count_total_products(&self.pool).await?;
        Ok(total.max(0) as u64)
    }

    async fn select_ids_page(&self, offset: u64, limit: u64) -> Result<Vec<String>, StoreError> {
        Ok(queries::select_product_ids_page(&self.pool, to_i64(offset), to_i64(limit)).await?)
    }

    async fn bulk_update_validity(
        &self,
        product_ids: &[String],
        is_valid: bool,
        checked_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        if product_ids.is_empty() {
            return Ok(0);
        }
        Ok(queries::batch_update_valid_status(&self.pool, product_ids, is_valid, checked_at).await?)
    }

    async fn select_invalid_unconfirmed(&self) -> Result<Vec<ProductRecord>, StoreError> {
        Ok(queries::select_invalid_unconfirmed(&self.pool).await?)
    }

    async fn find_by_product_id(&self, product_id: &str) -> Result<Option<ProductRecord>, StoreError> {
        Ok(queries::find_by_product_id(&self.pool, product_id).await?)
    }

    async fn find_by_product_ids(&self, product_ids: &[String]) -> Result<Vec<ProductRecord>, StoreError> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(queries::find_by_product_ids(&self.pool, product_ids).await?)
    }

    async fn insert_ignore(&self, products: &[NewProduct]) -> Result<u64, StoreError> {
        Ok(queries::batch_insert_ignore(&self.pool, products).await?)
    }

    async fn mark_confirmed(&self, product_id: &str) -> Result<bool, StoreError> {
        Ok(queries::mark_confirmed(&self.pool, product_id).await? > 0)
    }

    async fn delete_by_product_id(&self, product_id: &str) -> Result<bool, StoreError> {
        Ok(queries::delete_by_product_id(&self.pool, product_id).await? > 0)
    }

    async fn list(&self, query: &ProductQuery) -> Result<(Vec<ProductRecord>, u64), StoreError> {
        let (records, total) = queries::list_products(&self.pool, query).await?;
        Ok((records, total.max(0) as u64))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
