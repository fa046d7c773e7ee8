use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Alert webhook URL is not configured")]
    NotConfigured,

    #[error("Alert delivery failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Alert webhook returned HTTP {0}")]
    Rejected(u16),
}

/// Outbound alert channel. Receives a fully rendered message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

/// Feishu custom-bot webhook. Delivery succeeds on HTTP 200.
pub struct FeishuNotifier {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

impl FeishuNotifier {
    pub fn new(webhook_url: Option<String>) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            http,
            webhook_url: webhook_url.filter(|url| !url.trim().is_empty()),
        })
    }
}

/// Text message body accepted by the webhook.
pub fn text_payload(message: &str) -> serde_json::Value {
    json!({
        "msg_type": "text",
        "content": { "text": message }
    })
}

#[async_trait]
impl Notifier for FeishuNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let Some(url) = self.webhook_url.as_deref() else {
            tracing::warn!(target: "alert", "Alert webhook URL not configured, message dropped");
            return Err(NotifyError::NotConfigured);
        };

        let response = self.http.post(url).json(&text_payload(message)).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}
