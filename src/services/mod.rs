pub mod affiliate_api;
pub mod alert;
pub mod batch_processor;
pub mod job;
pub mod notifier;
pub mod partition;
pub mod product_service;
pub mod rate_limiter;
pub mod reconciliation;
pub mod signature;
pub mod worker_pool;
