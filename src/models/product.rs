use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::tts::ProductInfo;

/// Operator acknowledgement state of an invalid product.
///
/// Moves `Pending -> Confirmed` only, and only while the product is invalid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConfirmStatus {
    Pending,
    Confirmed,
}

impl ConfirmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmStatus::Pending => "pending",
            ConfirmStatus::Confirmed => "confirmed",
        }
    }
}

/// A monitored affiliate product as persisted in `tts_product_monitor`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: i64,
    pub product_id: String,
    pub title: Option<String>,
    pub shop_name: Option<String>,
    pub sale_region: Option<String>,
    pub is_valid: bool,
    pub confirm_status: ConfirmStatus,
    pub commission_rate: Option<i32>,
    pub commission_amount: Option<String>,
    pub commission_currency: Option<String>,
    pub last_check_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Invalid records awaiting operator acknowledgement cannot be deleted.
    pub fn is_awaiting_confirmation(&self) -> bool {
        !self.is_valid && self.confirm_status == ConfirmStatus::Pending
    }
}

/// Insert payload built from an upstream product during add-product.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub product_id: String,
    pub title: Option<String>,
    pub shop_name: Option<String>,
    pub sale_region: Option<String>,
    pub is_valid: bool,
    pub commission_rate: Option<i32>,
    pub commission_amount: Option<String>,
    pub commission_currency: Option<String>,
    pub last_check_time: DateTime<Utc>,
}

impl NewProduct {
    /// Commission fields are kept only when the block is complete; otherwise
    /// the product starts out invalid.
    pub fn from_info(info: &ProductInfo, checked_at: DateTime<Utc>) -> Self {
        let commission = info.complete_commission();
        Self {
            product_id: info.id.clone(),
            title: info.title.clone(),
            shop_name: info.shop_name().map(str::to_string),
            sale_region: info.sale_region.clone(),
            is_valid: commission.is_some(),
            commission_rate: commission.as_ref().map(|c| c.rate),
            commission_amount: commission.as_ref().map(|c| c.amount.to_string()),
            commission_currency: commission.as_ref().map(|c| c.currency.to_string()),
            last_check_time: checked_at,
        }
    }
}

/// Filters for the operator product list.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    #[garde(range(min = 1))]
    #[serde(default = "default_page")]
    pub page: u32,

    #[garde(range(min = 1, max = 100))]
    #[serde(default = "default_size")]
    pub size: u32,

    #[garde(skip)]
    pub is_valid: Option<bool>,

    #[garde(skip)]
    pub sale_region: Option<String>,

    #[garde(skip)]
    pub confirm_status: Option<ConfirmStatus>,

    /// Substring match on the product identifier.
    #[garde(skip)]
    pub keyword: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_size() -> u32 {
    20
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            size: default_size(),
            is_valid: None,
            sale_region: None,
            confirm_status: None,
            keyword: None,
        }
    }
}

impl ProductQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.size)
    }
}

/// Request body for adding products to the monitor.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductAddRequest {
    #[garde(length(min = 1, max = 1000))]
    pub product_ids: Vec<String>,
}

/// One page of the operator product list.
#[derive(Debug, Serialize)]
pub struct PageResult<T> {
    pub page: u32,
    pub size: u32,
    pub total: u64,
    pub pages: u64,
    pub records: Vec<T>,
}

impl<T> PageResult<T> {
    pub fn new(page: u32, size: u32, total: u64, records: Vec<T>) -> Self {
        let pages = if size == 0 { 0 } else { total.div_ceil(u64::from(size)) };
        Self {
            page,
            size,
            total,
            pages,
            records,
        }
    }
}
