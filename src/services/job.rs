//! Reconciliation job: one run followed by alerting, shared by the manual
//! trigger and the cron scheduler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::models::check::CheckResult;
use crate::services::alert::AlertDispatcher;
use crate::services::reconciliation::ReconciliationService;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] JobSchedulerError),

    #[error("Invalid cron expression '{cron}': {reason}")]
    InvalidCron { cron: String, reason: String },
}

/// The only entry point for runs in the process. Manual and scheduled
/// triggers share one clone-able handle, so they share the run guard and
/// the rate limiter behind it.
#[derive(Clone)]
pub struct ReconciliationJob {
    reconciliation: ReconciliationService,
    alerts: Arc<AlertDispatcher>,
    running: Arc<Mutex<()>>,
    skipped: Arc<AtomicU64>,
}

impl ReconciliationJob {
    pub fn new(reconciliation: ReconciliationService, alerts: Arc<AlertDispatcher>) -> Self {
        Self {
            reconciliation,
            alerts,
            running: Arc::new(Mutex::new(())),
            skipped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Triggers turned away because a run was already in flight.
    pub fn skipped_runs(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Run a reconciliation and, if it found invalid products, dispatch
    /// alerts. Returns `None` when another run already holds the guard.
    pub async fn run_once(&self) -> Option<CheckResult> {
        let Ok(_guard) = self.running.try_lock() else {
            self.skipped.fetch_add(1, Ordering::SeqCst);
            metrics::counter!("reconciliation_runs_skipped_total").increment(1);
            tracing::warn!("Product check already in progress, trigger skipped");
            return None;
        };

        let result = self.reconciliation.execute_product_check().await;

        if result.has_new_invalids() {
            match self.alerts.dispatch().await {
                Ok(report) => tracing::debug!(sent = report.sent, failed = report.failed, "Alerts dispatched"),
                Err(e) => tracing::error!(target: "alert", error = %e, "Failed to load products for alerting"),
            }
        } else if !result.success {
            tracing::warn!(
                error = result.error_message.as_deref().unwrap_or(""),
                "Product check failed, alerts skipped"
            );
        }
        Some(result)
    }

    /// Start a run in the background and return immediately.
    pub fn trigger(&self) -> tokio::task::JoinHandle<Option<CheckResult>> {
        let job = self.clone();
        tokio::spawn(async move { job.run_once().await })
    }
}

/// Build a scheduler that runs `job` on the six-field `cron` expression.
/// The scheduler is returned unstarted.
pub async fn build_scheduler(cron: &str, job: ReconciliationJob) -> Result<JobScheduler, SchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let scheduled = Job::new_async(cron, move |_uuid, _scheduler| {
        let job = job.clone();
        Box::pin(async move {
            tracing::info!("Scheduled product check triggered");
            job.run_once().await;
        })
    })
    .map_err(|e| SchedulerError::InvalidCron {
        cron: cron.to_string(),
        reason: e.to_string(),
    })?;

    scheduler.add(scheduled).await?;
    tracing::info!(cron, "Product check scheduled");
    Ok(scheduler)
}

/// Build and start the scheduler when scheduling is enabled.
pub async fn maybe_start_scheduler(
    enabled: bool,
    cron: &str,
    job: ReconciliationJob,
) -> Result<Option<JobScheduler>, SchedulerError> {
    if !enabled {
        tracing::info!("Scheduled product checks disabled");
        return Ok(None);
    }

    let scheduler = build_scheduler(cron, job).await?;
    scheduler.start().await?;
    Ok(Some(scheduler))
}
