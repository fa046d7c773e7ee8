use std::sync::Arc;

use crate::config::{AppConfig, ConfigError};
use crate::db::store::ProductStore;
use crate::services::{
    affiliate_api::{AffiliateApi, ApiClientError, TtsApiClient},
    alert::{AlertDispatcher, AlertSettings},
    batch_processor::BatchProcessor,
    job::ReconciliationJob,
    notifier::{FeishuNotifier, Notifier, NotifyError},
    product_service::ProductService,
    rate_limiter::RateLimiter,
    reconciliation::{ReconciliationService, ReconciliationSettings},
    worker_pool::{PoolError, WorkerPool, WorkerPoolConfig},
};

#[derive(Debug, thiserror::Error)]
pub enum WiringError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Worker pool: {0}")]
    Pool(#[from] PoolError),

    #[error("Affiliate API client: {0}")]
    Api(#[from] ApiClientError),

    #[error("Alert notifier: {0}")]
    Notifier(#[from] NotifyError),
}

/// Everything both binaries need, built once from configuration.
pub struct Services {
    pub pool: WorkerPool,
    pub job: ReconciliationJob,
    pub products: ProductService,
}

impl Services {
    /// Wire the production collaborators: the signed HTTP client and the
    /// webhook notifier.
    pub fn build(config: &AppConfig, store: Arc<dyn ProductStore>) -> Result<Self, WiringError> {
        let api: Arc<dyn AffiliateApi> = Arc::new(TtsApiClient::from_config(config)?);
        let notifier: Arc<dyn Notifier> = Arc::new(FeishuNotifier::new(config.alert_webhook_url.clone())?);
        Self::with_collaborators(config, store, api, notifier)
    }

    pub fn with_collaborators(
        config: &AppConfig,
        store: Arc<dyn ProductStore>,
        api: Arc<dyn AffiliateApi>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, WiringError> {
        config.validate()?;

        let limiter = Arc::new(RateLimiter::new(config.rate_limit_qps()?));
        let pool = WorkerPool::new(WorkerPoolConfig::from_app_config(config))?;
        let processor = BatchProcessor::new(Arc::clone(&store), Arc::clone(&api), limiter);
        let reconciliation = ReconciliationService::new(
            Arc::clone(&store),
            processor,
            pool.clone(),
            ReconciliationSettings::from_config(config)?,
        );
        let alerts = Arc::new(AlertDispatcher::new(
            Arc::clone(&store),
            notifier,
            AlertSettings::from_config(config),
        ));

        Ok(Self {
            pool,
            job: ReconciliationJob::new(reconciliation, alerts),
            products: ProductService::new(store, api),
        })
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProductStore>,
    pub products: ProductService,
    pub job: ReconciliationJob,
}

impl AppState {
    pub fn new(store: Arc<dyn ProductStore>, services: &Services) -> Self {
        Self {
            store,
            products: services.products.clone(),
            job: services.job.clone(),
        }
    }
}
