//! Affiliate open API client
//!
//! Looks up collaboration products by ID. Calls are signed with the app
//! secret (see [`crate::services::signature`]) and authenticated with the
//! access token header.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::AppConfig;
use crate::models::tts::ProductQueryResponse;
use crate::services::signature::{build_query_string, sign_request};

pub const PRODUCT_QUERY_PATH: &str = "/affiliate_creator/202509/open_collaborations/products";

const ACCESS_TOKEN_HEADER: &str = "x-tts-access-token";
const CONTENT_TYPE_JSON: &str = "application/json";

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    /// Transport failure, non-200 status or an unreadable body.
    #[error("Affiliate API call failed: {0}")]
    ApiCall(String),

    /// The API answered but reported a non-zero application code.
    #[error("Affiliate API returned code {code}: {message}")]
    ApiResponse { code: i64, message: String },
}

impl From<reqwest::Error> for ApiClientError {
    fn from(err: reqwest::Error) -> Self {
        ApiClientError::ApiCall(err.to_string())
    }
}

/// External product lookup consumed by the batch processor and the
/// add-product flow.
#[async_trait]
pub trait AffiliateApi: Send + Sync {
    /// Returns only successful responses; a non-zero `code` becomes
    /// [`ApiClientError::ApiResponse`].
    async fn query_by_ids(&self, product_ids: &[String]) -> Result<ProductQueryResponse, ApiClientError>;
}

#[derive(Debug, Clone)]
pub struct TtsCredentials {
    pub app_key: String,
    pub app_secret: String,
    pub access_token: String,
}

pub struct TtsApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: TtsCredentials,
}

impl TtsApiClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: TtsCredentials,
        timeout: Duration,
    ) -> Result<Self, ApiClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("product-monitor/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ApiClientError> {
        Self::new(
            config.tts_base_url.clone(),
            TtsCredentials {
                app_key: config.tts_app_key.clone(),
                app_secret: config.tts_app_secret.clone(),
                access_token: config.tts_access_token.clone(),
            },
            config.tts_timeout(),
        )
    }

    /// Full request URL including the signature, for a given timestamp.
    pub fn signed_url(&self, product_ids: &[String], timestamp: i64) -> String {
        let mut params = BTreeMap::new();
        params.insert("app_key".to_string(), self.credentials.app_key.clone());
        params.insert("timestamp".to_string(), timestamp.to_string());
        params.insert("product_ids".to_string(), product_ids.join(","));

        let sign = sign_request(
            &params,
            None,
            &self.credentials.app_secret,
            PRODUCT_QUERY_PATH,
            CONTENT_TYPE_JSON,
        );
        params.insert("sign".to_string(), sign);

        format!(
            "{}{}?{}",
            self.base_url,
            PRODUCT_QUERY_PATH,
            build_query_string(&params)
        )
    }
}

#[async_trait]
impl AffiliateApi for TtsApiClient {
    async fn query_by_ids(&self, product_ids: &[String]) -> Result<ProductQueryResponse, ApiClientError> {
        if product_ids.is_empty() {
            return Ok(ProductQueryResponse::empty_success());
        }

        let url = self.signed_url(product_ids, chrono::Utc::now().timestamp());
        tracing::debug!(count = product_ids.len(), "Querying affiliate products");

        let response = self
            .http
            .post(&url)
            .header(ACCESS_TOKEN_HEADER, &self.credentials.access_token)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_JSON)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Affiliate API returned non-200 status");
            return Err(ApiClientError::ApiCall(format!("HTTP {status}")));
        }

        let parsed: ProductQueryResponse = response
            .json()
            .await
            .map_err(|e| ApiClientError::ApiCall(format!("Failed to parse response: {e}")))?;

        if !parsed.is_success() {
            let code = parsed.code.unwrap_or(-1);
            let message = parsed.message.clone().unwrap_or_default();
            tracing::warn!(
                code,
                message = %message,
                request_id = parsed.request_id.as_deref().unwrap_or(""),
                "Affiliate API reported failure"
            );
            return Err(ApiClientError::ApiResponse { code, message });
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TtsApiClient {
        TtsApiClient::new(
            "https://open-api.example.com/",
            TtsCredentials {
                app_key: "key".to_string(),
                app_secret: "secret".to_string(),
                access_token: "token".to_string(),
            },
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_signed_url_layout() {
        let ids = vec!["111".to_string(), "222".to_string()];
        let url = client().signed_url(&ids, 1_700_000_000);

        assert!(url.starts_with(
            "https://open-api.example.com/affiliate_creator/202509/open_collaborations/products?"
        ));
        assert!(url.contains("app_key=key"));
        assert!(url.contains("product_ids=111,222"));
        assert!(url.contains("timestamp=1700000000"));
        assert!(!url.contains("access_token"));

        let sign = url.split("sign=").nth(1).unwrap().split('&').next().unwrap();
        assert_eq!(sign.len(), 64);
    }

    #[test]
    fn test_signature_changes_with_timestamp() {
        let ids = vec!["1".to_string()];
        let c = client();
        assert_ne!(c.signed_url(&ids, 1), c.signed_url(&ids, 2));
    }

    #[tokio::test]
    async fn test_empty_ids_short_circuit() {
        let response = client().query_by_ids(&[]).await.unwrap();
        assert!(response.is_success());
        assert!(response.products().is_empty());
    }
}
