//! In-memory collaborators for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use product_monitor::app_state::Services;
use product_monitor::config::AppConfig;
use product_monitor::db::store::{ProductStore, StoreError};
use product_monitor::models::product::{ConfirmStatus, NewProduct, ProductQuery, ProductRecord};
use product_monitor::models::tts::{
    CommissionInfo, ProductData, ProductInfo, ProductQueryResponse, ShopInfo,
};
use product_monitor::services::affiliate_api::{AffiliateApi, ApiClientError};
use product_monitor::services::notifier::{Notifier, NotifyError};

/// Config with small sizes and short timeouts.
pub fn test_config() -> AppConfig {
    let vars = vec![
        ("DATABASE_URL".to_string(), "postgres://unused".to_string()),
        ("TTS_APP_KEY".to_string(), "key".to_string()),
        ("TTS_APP_SECRET".to_string(), "secret".to_string()),
        ("TTS_ACCESS_TOKEN".to_string(), "token".to_string()),
        ("RATE_LIMIT_QPS".to_string(), "1000".to_string()),
        ("BATCH_SIZE".to_string(), "20".to_string()),
        ("PAGE_SIZE".to_string(), "100".to_string()),
        ("POOL_CORE_SIZE".to_string(), "4".to_string()),
        ("POOL_MAX_SIZE".to_string(), "8".to_string()),
        ("POOL_QUEUE_CAPACITY".to_string(), "16".to_string()),
        ("POOL_SHUTDOWN_GRACE_SECS".to_string(), "5".to_string()),
        ("PAGE_TIMEOUT_SECS".to_string(), "30".to_string()),
    ];
    envy::from_iter(vars).expect("test config")
}

pub fn product_id(n: usize) -> String {
    format!("p{n:04}")
}

pub struct TestHarness {
    pub store: Arc<InMemoryProductStore>,
    pub api: Arc<ScriptedApi>,
    pub notifier: Arc<RecordingNotifier>,
    pub services: Services,
}

pub fn harness(config: &AppConfig, store: InMemoryProductStore, api: ScriptedApi) -> TestHarness {
    let store = Arc::new(store);
    let api = Arc::new(api);
    let notifier = Arc::new(RecordingNotifier::default());
    let services = Services::with_collaborators(config, store.clone(), api.clone(), notifier.clone())
        .expect("wire services");
    TestHarness {
        store,
        api,
        notifier,
        services,
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryProductStore {
    records: Mutex<Vec<ProductRecord>>,
    next_id: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_updates: AtomicBool,
    pub update_calls: AtomicUsize,
}

pub fn record(product_id: &str, is_valid: bool, confirm_status: ConfirmStatus) -> ProductRecord {
    let now = Utc::now();
    ProductRecord {
        id: 0,
        product_id: product_id.to_string(),
        title: Some(format!("Product {product_id}")),
        shop_name: Some("Demo Shop".to_string()),
        sale_region: Some("US".to_string()),
        is_valid,
        confirm_status,
        commission_rate: None,
        commission_amount: None,
        commission_currency: None,
        last_check_time: None,
        created_at: now,
        updated_at: now,
    }
}

impl InMemoryProductStore {
    /// `count` valid, pending products `p0000..`.
    pub fn with_products(count: usize) -> Self {
        let store = Self::default();
        for n in 0..count {
            store.insert(record(&product_id(n), true, ConfirmStatus::Pending));
        }
        store
    }

    pub fn insert(&self, mut record: ProductRecord) {
        record.id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        self.records.lock().unwrap().push(record);
    }

    pub fn get(&self, product_id: &str) -> Option<ProductRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.product_id == product_id)
            .cloned()
    }

    /// `(product_id, is_valid, confirm_status)` for every row, by id.
    pub fn validity_snapshot(&self) -> Vec<(String, bool, ConfirmStatus)> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.product_id.clone(), r.is_valid, r.confirm_status))
            .collect()
    }

    pub fn invalid_count(&self) -> usize {
        self.records.lock().unwrap().iter().filter(|r| !r.is_valid).count()
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn count_total(&self) -> Result<u64, StoreError> {
        self.check_reads()?;
        Ok(self.records.lock().unwrap().len() as u64)
    }

    async fn select_ids_page(&self, offset: u64, limit: u64) -> Result<Vec<String>, StoreError> {
        self.check_reads()?;
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|r| r.product_id.clone())
            .collect())
    }

    async fn bulk_update_validity(
        &self,
        product_ids: &[String],
        is_valid: bool,
        checked_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        let ids: HashSet<&String> = product_ids.iter().collect();
        let mut updated = 0;
        for record in self.records.lock().unwrap().iter_mut() {
            if ids.contains(&record.product_id) {
                record.is_valid = is_valid;
                record.last_check_time = Some(checked_at);
                record.updated_at = Utc::now();
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn select_invalid_unconfirmed(&self) -> Result<Vec<ProductRecord>, StoreError> {
        self.check_reads()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.is_awaiting_confirmation())
            .cloned()
            .collect())
    }

    async fn find_by_product_id(&self, product_id: &str) -> Result<Option<ProductRecord>, StoreError> {
        self.check_reads()?;
        Ok(self.get(product_id))
    }

    async fn find_by_product_ids(&self, product_ids: &[String]) -> Result<Vec<ProductRecord>, StoreError> {
        self.check_reads()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| product_ids.contains(&r.product_id))
            .cloned()
            .collect())
    }

    async fn insert_ignore(&self, products: &[NewProduct]) -> Result<u64, StoreError> {
        let mut inserted = 0;
        for product in products {
            if self.get(&product.product_id).is_some() {
                continue;
            }
            let mut row = record(&product.product_id, product.is_valid, ConfirmStatus::Pending);
            row.title = product.title.clone();
            row.shop_name = product.shop_name.clone();
            row.sale_region = product.sale_region.clone();
            row.commission_rate = product.commission_rate;
            row.commission_amount = product.commission_amount.clone();
            row.commission_currency = product.commission_currency.clone();
            row.last_check_time = Some(product.last_check_time);
            self.insert(row);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn mark_confirmed(&self, product_id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap();
        match records
            .iter_mut()
            .find(|r| r.product_id == product_id && r.is_awaiting_confirmation())
        {
            Some(record) => {
                record.confirm_status = ConfirmStatus::Confirmed;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_product_id(&self, product_id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.product_id != product_id || r.is_awaiting_confirmation());
        Ok(records.len() < before)
    }

    async fn list(&self, query: &ProductQuery) -> Result<(Vec<ProductRecord>, u64), StoreError> {
        self.check_reads()?;
        let mut matched: Vec<ProductRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| query.is_valid.map_or(true, |v| r.is_valid == v))
            .filter(|r| query.confirm_status.map_or(true, |s| r.confirm_status == s))
            .filter(|r| {
                query
                    .sale_region
                    .as_deref()
                    .map_or(true, |region| r.sale_region.as_deref() == Some(region))
            })
            .filter(|r| {
                query
                    .keyword
                    .as_deref()
                    .map_or(true, |k| r.product_id.contains(k))
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.size as usize)
            .collect();
        Ok((page, total))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_reads()
    }
}

// ---------------------------------------------------------------------------
// Affiliate API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Returned with a complete commission block.
    Valid,
    /// Returned without a commission block.
    NoCommission,
    /// Not in the response at all.
    Absent,
}

/// Answers lookups from a per-ID script. A batch containing any ID in
/// `failing` gets an application-level error.
pub struct ScriptedApi {
    default: Reply,
    overrides: Mutex<HashMap<String, Reply>>,
    failing: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<Vec<String>>>,
}

impl ScriptedApi {
    pub fn new(default: Reply) -> Self {
        Self {
            default,
            overrides: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, product_id: &str, reply: Reply) {
        self.overrides.lock().unwrap().insert(product_id.to_string(), reply);
    }

    pub fn fail_batch_containing(&self, product_id: &str) {
        self.failing.lock().unwrap().insert(product_id.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = self.requests.lock().unwrap().iter().map(Vec::len).collect();
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        sizes
    }

    fn reply_for(&self, product_id: &str) -> Reply {
        self.overrides
            .lock()
            .unwrap()
            .get(product_id)
            .copied()
            .unwrap_or(self.default)
    }
}

pub fn product_info(product_id: &str, complete: bool) -> ProductInfo {
    ProductInfo {
        id: product_id.to_string(),
        title: Some(format!("Product {product_id}")),
        sale_region: Some("US".to_string()),
        shop: Some(ShopInfo {
            name: Some("Demo Shop".to_string()),
        }),
        commission: complete.then(|| CommissionInfo {
            rate: Some(1000),
            currency: Some("USD".to_string()),
            amount: Some("2.50".to_string()),
        }),
        ..ProductInfo::default()
    }
}

#[async_trait]
impl AffiliateApi for ScriptedApi {
    async fn query_by_ids(&self, product_ids: &[String]) -> Result<ProductQueryResponse, ApiClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(product_ids.to_vec());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let fails = {
            let failing = self.failing.lock().unwrap();
            product_ids.iter().any(|id| failing.contains(id))
        };
        if fails {
            return Err(ApiClientError::ApiResponse {
                code: 105_002,
                message: "Too many requests".to_string(),
            });
        }

        let products = product_ids
            .iter()
            .filter_map(|id| match self.reply_for(id) {
                Reply::Valid => Some(product_info(id, true)),
                Reply::NoCommission => Some(product_info(id, false)),
                Reply::Absent => None,
            })
            .collect();

        Ok(ProductQueryResponse {
            code: Some(0),
            message: Some("Success".to_string()),
            request_id: Some("test".to_string()),
            data: Some(ProductData {
                products: Some(products),
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
    reject_containing: Mutex<Option<String>>,
}

impl RecordingNotifier {
    pub fn reject_messages_containing(&self, needle: &str) {
        *self.reject_containing.lock().unwrap() = Some(needle.to_string());
    }

    pub fn sent(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let reject = self.reject_containing.lock().unwrap().clone();
        if reject.is_some_and(|needle| message.contains(&needle)) {
            return Err(NotifyError::Rejected(500));
        }
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}
