//! Wire types for the affiliate open-collaboration product query.
//!
//! Every nested block is optional: the upstream omits whole sections when a
//! product is delisted or its commission plan is withdrawn, and validity is
//! derived from exactly that absence.

use serde::{Deserialize, Serialize};

/// Top-level response envelope. `code == 0` means success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductQueryResponse {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub data: Option<ProductData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductData {
    #[serde(default)]
    pub products: Option<Vec<ProductInfo>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub has_inventory: Option<bool>,
    #[serde(default)]
    pub units_sold: Option<i64>,
    #[serde(default)]
    pub sale_region: Option<String>,
    #[serde(default)]
    pub main_image_url: Option<String>,
    #[serde(default)]
    pub detail_link: Option<String>,
    #[serde(default)]
    pub shop: Option<ShopInfo>,
    #[serde(default)]
    pub original_price: Option<PriceInfo>,
    #[serde(default)]
    pub sales_price: Option<PriceInfo>,
    #[serde(default)]
    pub commission: Option<CommissionInfo>,
    #[serde(default)]
    pub shop_ads_commission: Option<ShopAdsCommission>,
    #[serde(default)]
    pub category_chains: Option<Vec<CategoryChain>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopInfo {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceInfo {
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub minimum_amount: Option<String>,
    #[serde(default)]
    pub maximum_amount: Option<String>,
}

/// Commission plan. `rate` is in basis points (100 = 1%).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommissionInfo {
    #[serde(default)]
    pub rate: Option<i32>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopAdsCommission {
    #[serde(default)]
    pub rate: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryChain {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub local_name: Option<String>,
    #[serde(default)]
    pub is_leaf: Option<bool>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// A commission block whose three fields are all present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteCommission<'a> {
    pub rate: i32,
    pub currency: &'a str,
    pub amount: &'a str,
}

impl ProductQueryResponse {
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returned products, empty when the data section is missing.
    pub fn products(&self) -> &[ProductInfo] {
        self.data
            .as_ref()
            .and_then(|d| d.products.as_deref())
            .unwrap_or(&[])
    }

    pub fn into_products(self) -> Vec<ProductInfo> {
        self.data.and_then(|d| d.products).unwrap_or_default()
    }

    pub fn empty_success() -> Self {
        Self {
            code: Some(0),
            message: Some("Success".to_string()),
            request_id: None,
            data: Some(ProductData {
                products: Some(Vec::new()),
            }),
        }
    }
}

impl ProductInfo {
    /// The commission block if rate, currency and amount are all present and
    /// the two strings are non-empty. This is the sole validity signal.
    pub fn complete_commission(&self) -> Option<CompleteCommission<'_>> {
        let commission = self.commission.as_ref()?;
        let rate = commission.rate?;
        let currency = non_empty(commission.currency.as_deref())?;
        let amount = non_empty(commission.amount.as_deref())?;
        Some(CompleteCommission {
            rate,
            currency,
            amount,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.complete_commission().is_some()
    }

    pub fn shop_name(&self) -> Option<&str> {
        self.shop.as_ref().and_then(|s| s.name.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(commission: Option<CommissionInfo>) -> ProductInfo {
        ProductInfo {
            id: "1729".to_string(),
            commission,
            ..ProductInfo::default()
        }
    }

    fn commission(rate: Option<i32>, currency: Option<&str>, amount: Option<&str>) -> CommissionInfo {
        CommissionInfo {
            rate,
            currency: currency.map(str::to_string),
            amount: amount.map(str::to_string),
        }
    }

    #[test]
    fn test_complete_commission_is_valid() {
        let p = product(Some(commission(Some(1500), Some("USD"), Some("2.35"))));
        assert!(p.is_valid());
        assert_eq!(
            p.complete_commission(),
            Some(CompleteCommission { rate: 1500, currency: "USD", amount: "2.35" })
        );
    }

    #[test]
    fn test_incomplete_commission_is_invalid() {
        assert!(!product(None).is_valid());
        assert!(!product(Some(commission(None, Some("USD"), Some("2.35")))).is_valid());
        assert!(!product(Some(commission(Some(100), None, Some("2.35")))).is_valid());
        assert!(!product(Some(commission(Some(100), Some("USD"), Some("")))).is_valid());
    }

    #[test]
    fn test_whitespace_strings_still_count_as_present() {
        assert!(product(Some(commission(Some(100), Some("  "), Some("1")))).is_valid());
        assert!(product(Some(commission(Some(100), Some("USD"), Some(" ")))).is_valid());
        assert!(!product(Some(commission(Some(100), Some(""), Some("1")))).is_valid());
    }

    #[test]
    fn test_deserialize_response_with_missing_sections() {
        let body = r#"{
            "code": 0,
            "message": "Success",
            "request_id": "2024abc",
            "data": {
                "products": [
                    {"id": "1", "title": "Mug", "sale_region": "US",
                     "shop": {"name": "Cozy"},
                     "commission": {"rate": 800, "currency": "USD", "amount": "1.20"}},
                    {"id": "2", "title": "Lamp"}
                ]
            }
        }"#;
        let resp: ProductQueryResponse = serde_json::from_str(body).unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.request_id.as_deref(), Some("2024abc"));
        assert_eq!(resp.products().len(), 2);
        assert!(resp.products()[0].is_valid());
        assert_eq!(resp.products()[0].shop_name(), Some("Cozy"));
        assert!(!resp.products()[1].is_valid());
    }

    #[test]
    fn test_error_response_has_no_products() {
        let resp: ProductQueryResponse =
            serde_json::from_str(r#"{"code": 36009004, "message": "invalid sign"}"#).unwrap();
        assert!(!resp.is_success());
        assert!(resp.products().is_empty());
    }
}
