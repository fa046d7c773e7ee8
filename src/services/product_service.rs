//! Operator-facing product operations: list, add, confirm, delete, count.

use chrono::Utc;
use garde::Validate;
use std::collections::HashSet;
use std::sync::Arc;

use crate::db::store::{ProductStore, StoreError};
use crate::models::product::{ConfirmStatus, NewProduct, PageResult, ProductQuery, ProductRecord};
use crate::services::affiliate_api::{AffiliateApi, ApiClientError};

#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    /// A business rule rejected the request.
    #[error("{0}")]
    Business(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("商品不存在: {0}")]
    NotFound(String),

    #[error("调用 TTS API 失败: {0}")]
    Upstream(#[from] ApiClientError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ProductError {
    fn business(message: impl Into<String>) -> Self {
        Self::Business(message.into())
    }
}

#[derive(Clone)]
pub struct ProductService {
    store: Arc<dyn ProductStore>,
    api: Arc<dyn AffiliateApi>,
}

impl ProductService {
    pub fn new(store: Arc<dyn ProductStore>, api: Arc<dyn AffiliateApi>) -> Self {
        Self { store, api }
    }

    pub async fn list(&self, query: &ProductQuery) -> Result<PageResult<ProductRecord>, ProductError> {
        query
            .validate()
            .map_err(|e| ProductError::Validation(e.to_string()))?;

        let (records, total) = self.store.list(query).await?;
        tracing::debug!(total, page = query.page, size = query.size, "Listed products");
        Ok(PageResult::new(query.page, query.size, total, records))
    }

    /// Register new products to monitor. Every new ID is validated against
    /// the affiliate API once, up front. Returns how many rows were inserted.
    pub async fn add(&self, product_ids: &[String]) -> Result<u64, ProductError> {
        if product_ids.is_empty() {
            return Err(ProductError::business("商品ID列表不能为空"));
        }

        let mut seen = HashSet::new();
        let unique: Vec<String> = product_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .filter(|id| seen.insert(id.to_string()))
            .map(str::to_string)
            .collect();
        if unique.is_empty() {
            return Err(ProductError::business("有效的商品ID列表为空"));
        }

        let existing: HashSet<String> = self
            .store
            .find_by_product_ids(&unique)
            .await?
            .into_iter()
            .map(|r| r.product_id)
            .collect();
        let new_ids: Vec<String> = unique.into_iter().filter(|id| !existing.contains(id)).collect();
        if new_ids.is_empty() {
            tracing::warn!("All requested product IDs already exist, nothing to add");
            return Ok(0);
        }

        tracing::info!(new = new_ids.len(), existing = existing.len(), "Adding products");

        let products = self.api.query_by_ids(&new_ids).await?.into_products();
        if products.is_empty() {
            return Err(ProductError::business("商品ID无效，未查询到任何商品信息"));
        }

        let checked_at = Utc::now();
        let rows: Vec<NewProduct> = products
            .iter()
            .filter(|p| new_ids.contains(&p.id))
            .map(|p| NewProduct::from_info(p, checked_at))
            .collect();

        let inserted = self.store.insert_ignore(&rows).await?;
        tracing::info!(inserted, returned = products.len(), "Products added");
        Ok(inserted)
    }

    /// Acknowledge an invalid product so it stops producing alerts.
    pub async fn confirm(&self, product_id: &str) -> Result<(), ProductError> {
        let record = self.require(product_id).await?;

        if record.is_valid {
            return Err(ProductError::business("有效商品无需确认"));
        }
        if record.confirm_status == ConfirmStatus::Confirmed {
            tracing::warn!(product_id = %record.product_id, "Product already confirmed");
            return Ok(());
        }

        if !self.store.mark_confirmed(&record.product_id).await? {
            return Err(ProductError::business("确认商品失效失败"));
        }
        tracing::info!(product_id = %record.product_id, "Product invalidity confirmed");
        Ok(())
    }

    /// Stop monitoring a product. Invalid products must be confirmed first.
    pub async fn delete(&self, product_id: &str) -> Result<(), ProductError> {
        let record = self.require(product_id).await?;

        if record.is_awaiting_confirmation() {
            return Err(ProductError::business(
                "失效且未确认的商品不允许删除，请先确认后再删除",
            ));
        }

        if !self.store.delete_by_product_id(&record.product_id).await? {
            return Err(ProductError::business("删除商品失败"));
        }
        tracing::info!(product_id = %record.product_id, "Product deleted");
        Ok(())
    }

    pub async fn count(&self) -> Result<u64, ProductError> {
        Ok(self.store.count_total().await?)
    }

    async fn require(&self, product_id: &str) -> Result<ProductRecord, ProductError> {
        let product_id = product_id.trim();
        if product_id.is_empty() {
            return Err(ProductError::business("商品ID不能为空"));
        }
        self.store
            .find_by_product_id(product_id)
            .await?
            .ok_or_else(|| ProductError::NotFound(product_id.to_string()))
    }
}
