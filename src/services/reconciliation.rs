//! Reconciliation run
//!
//! Walks every stored product ID page by page, fans each page's batches out
//! to the worker pool and folds the batch outcomes into one [`CheckResult`].
//! Pages run strictly in order; batches within a page run concurrently.

use futures::FutureExt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::{AppConfig, ConfigError};
use crate::db::store::{ProductStore, StoreError};
use crate::models::check::{BatchOutcome, CheckResult};
use crate::services::batch_processor::BatchProcessor;
use crate::services::partition::partition_owned;
use crate::services::worker_pool::WorkerPool;

#[derive(Debug, Clone)]
pub struct ReconciliationSettings {
    pub page_size: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    /// Upper bound on waiting for one page's batches once all are submitted.
    pub page_timeout: Duration,
}

impl ReconciliationSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            page_size: config.page_size()?,
            batch_size: config.batch_size()?,
            page_timeout: config.page_timeout(),
        })
    }
}

#[derive(Clone)]
pub struct ReconciliationService {
    store: Arc<dyn ProductStore>,
    processor: BatchProcessor,
    pool: WorkerPool,
    settings: ReconciliationSettings,
}

impl ReconciliationService {
    pub fn new(
        store: Arc<dyn ProductStore>,
        processor: BatchProcessor,
        pool: WorkerPool,
        settings: ReconciliationSettings,
    ) -> Self {
        Self {
            store,
            processor,
            pool,
            settings,
        }
    }

    /// Run one full reconciliation.
    ///
    /// Batch failures are counted, never raised. Only a storage read failure
    /// ends the run early, with `success = false` and whatever counts were
    /// merged before it.
    pub async fn execute_product_check(&self) -> CheckResult {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let mut result = CheckResult::default();

        tracing::info!(%run_id, "Starting product validity check");

        if let Err(e) = self.run_pages(run_id, &mut result).await {
            tracing::error!(%run_id, error = %e, "Product validity check aborted");
            result.success = false;
            result.error_message = Some(e.to_string());
        }

        let elapsed = started.elapsed();
        result.duration_ms = elapsed.as_millis() as u64;

        let outcome = if result.success { "success" } else { "failure" };
        metrics::counter!("reconciliation_runs_total", "outcome" => outcome).increment(1);
        metrics::histogram!("reconciliation_run_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            %run_id,
            success = result.success,
            total = result.total_count,
            checked = result.checked_count,
            valid = result.valid_count,
            invalid = result.invalid_count,
            failed = result.failed_count,
            duration_ms = result.duration_ms,
            "Product validity check finished"
        );
        result
    }

    async fn run_pages(&self, run_id: Uuid, result: &mut CheckResult) -> Result<(), StoreError> {
        let total = self.store.count_total().await?;
        result.total_count = total;
        if total == 0 {
            tracing::info!(%run_id, "No products to check");
            return Ok(());
        }

        let page_size = self.settings.page_size.get() as u64;
        let pages = total.div_ceil(page_size);
        tracing::info!(%run_id, total, pages, page_size, "Checking products");

        for page in 0..pages {
            let ids = self.store.select_ids_page(page * page_size, page_size).await?;
            if ids.is_empty() {
                tracing::warn!(%run_id, page = page + 1, "Page came back empty, skipping");
                continue;
            }

            let outcome = self.process_page(run_id, page + 1, &ids).await;
            result.merge(&outcome);

            tracing::info!(
                %run_id,
                page = page + 1,
                pages,
                size = ids.len(),
                checked = outcome.checked,
                valid = outcome.valid,
                invalid = outcome.invalid,
                failed = outcome.failed,
                "Page done"
            );
        }
        Ok(())
    }

    /// Submit every batch of the page and collect their outcomes until all
    /// report back or the page timeout elapses.
    async fn process_page(&self, run_id: Uuid, page: u64, ids: &[String]) -> BatchOutcome {
        let batches = partition_owned(ids, self.settings.batch_size);
        let expected = batches.len();
        let (tx, mut rx) = mpsc::channel::<BatchOutcome>(expected.max(1));
        let mut page_outcome = BatchOutcome::default();

        for (batch_index, batch) in batches.into_iter().enumerate() {
            let size = batch.len();
            let processor = self.processor.clone();
            let tx = tx.clone();
            let task = async move {
                let outcome = processor.process_single_batch(&batch, batch_index).await;
                // Receiver gone means the page already timed out.
                let _ = tx.send(outcome).await;
            }
            .boxed();

            if let Err(e) = self.pool.submit(task).await {
                tracing::error!(%run_id, page, batch_index, error = %e, "Could not submit batch");
                metrics::counter!("reconciliation_batches_failed_total").increment(1);
                page_outcome.merge(&BatchOutcome::failed(size));
            }
        }
        // The channel closes once every submitted task has finished or been dropped.
        drop(tx);

        let deadline = tokio::time::Instant::now() + self.settings.page_timeout;
        let mut received = 0usize;
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(outcome)) => {
                    page_outcome.merge(&outcome);
                    received += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        %run_id,
                        page,
                        expected,
                        received,
                        timeout_secs = self.settings.page_timeout.as_secs(),
                        "Page timed out, continuing with partial results"
                    );
                    break;
                }
            }
        }
        page_outcome
    }
}
