use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::store::ProductStore;
use crate::models::check::BatchOutcome;
use crate::models::tts::ProductInfo;
use crate::services::affiliate_api::AffiliateApi;
use crate::services::rate_limiter::RateLimiter;

/// Requested IDs split by validity, each group in request order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Classification {
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
}

/// An ID is valid only if the response contains it with a complete
/// commission block. IDs missing from the response are invalid. When the
/// response repeats an ID, the first entry wins.
pub fn classify_batch(requested: &[String], products: &[ProductInfo]) -> Classification {
    let mut by_id: HashMap<&str, &ProductInfo> = HashMap::with_capacity(products.len());
    for product in products {
        by_id.entry(product.id.as_str()).or_insert(product);
    }

    let mut result = Classification::default();
    for id in requested {
        match by_id.get(id.as_str()) {
            Some(info) if info.is_valid() => result.valid.push(id.clone()),
            _ => result.invalid.push(id.clone()),
        }
    }
    result
}

/// Validates one batch against the affiliate API and persists the result.
///
/// Failures never escape: a failed API call or write turns the whole batch
/// into `failed`.
#[derive(Clone)]
pub struct BatchProcessor {
    store: Arc<dyn ProductStore>,
    api: Arc<dyn AffiliateApi>,
    limiter: Arc<RateLimiter>,
}

impl BatchProcessor {
    pub fn new(store: Arc<dyn ProductStore>, api: Arc<dyn AffiliateApi>, limiter: Arc<RateLimiter>) -> Self {
        Self { store, api, limiter }
    }

    pub async fn process_single_batch(&self, product_ids: &[String], batch_index: usize) -> BatchOutcome {
        if product_ids.is_empty() {
            return BatchOutcome::default();
        }

        self.limiter.acquire().await;

        let response = match self.api.query_by_ids(product_ids).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    batch_index,
                    size = product_ids.len(),
                    error = %e,
                    "Batch lookup failed"
                );
                metrics::counter!("reconciliation_batches_failed_total").increment(1);
                return BatchOutcome::failed(product_ids.len());
            }
        };

        let classification = classify_batch(product_ids, response.products());
        let checked_at = Utc::now();

        for (ids, is_valid) in [(&classification.valid, true), (&classification.invalid, false)] {
            if ids.is_empty() {
                continue;
            }
            if let Err(e) = self.store.bulk_update_validity(ids, is_valid, checked_at).await {
                tracing::error!(
                    batch_index,
                    is_valid,
                    count = ids.len(),
                    error = %e,
                    "Failed to persist batch validity"
                );
                metrics::counter!("reconciliation_batches_failed_total").increment(1);
                return BatchOutcome::failed(product_ids.len());
            }
        }

        let outcome = BatchOutcome {
            checked: product_ids.len() as u64,
            valid: classification.valid.len() as u64,
            invalid: classification.invalid.len() as u64,
            failed: 0,
        };
        metrics::counter!("reconciliation_products_checked_total").increment(outcome.checked);

        tracing::debug!(
            batch_index,
            checked = outcome.checked,
            valid = outcome.valid,
            invalid = outcome.invalid,
            "Batch processed"
        );
        outcome
    }
}
