use serde::Deserialize;
use std::num::{NonZeroU32, NonZeroUsize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8080"). Unused by the worker process.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Affiliate open API base URL
    #[serde(default = "default_tts_base_url")]
    pub tts_base_url: String,

    /// Affiliate app key
    pub tts_app_key: String,

    /// Affiliate app secret, also the HMAC signing key
    pub tts_app_secret: String,

    /// Affiliate access token
    pub tts_access_token: String,

    /// Per-call HTTP timeout in milliseconds
    #[serde(default = "default_tts_timeout_ms")]
    pub tts_timeout_ms: u64,

    /// Outbound API calls per second (token bucket refill rate and burst)
    #[serde(default = "default_rate_limit_qps")]
    pub rate_limit_qps: u32,

    /// Product IDs per API call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Product IDs read from storage per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_pool_core_size")]
    pub pool_core_size: usize,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: usize,

    #[serde(default = "default_pool_queue_capacity")]
    pub pool_queue_capacity: usize,

    /// Idle time after which workers above the core count exit
    #[serde(default = "default_pool_idle_timeout_secs")]
    pub pool_idle_timeout_secs: u64,

    /// How long shutdown waits for in-flight batches before abandoning them
    #[serde(default = "default_pool_shutdown_grace_secs")]
    pub pool_shutdown_grace_secs: u64,

    /// Ceiling on the wait for one page's batches
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    #[serde(default)]
    pub alert_enabled: bool,

    /// Feishu-style incoming webhook URL
    #[serde(default)]
    pub alert_webhook_url: Option<String>,

    #[serde(default = "default_alert_title")]
    pub alert_title: String,

    /// Message body template; see `services::alert::render_message`
    #[serde(default = "default_alert_content_template")]
    pub alert_content_template: String,

    #[serde(default = "default_schedule_enabled")]
    pub schedule_enabled: bool,

    /// Six-field cron expression (sec min hour day month weekday)
    #[serde(default = "default_schedule_cron")]
    pub schedule_cron: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_tts_base_url() -> String {
    "https://open-api.tiktokglobalshop.com".to_string()
}

fn default_tts_timeout_ms() -> u64 {
    10_000
}

fn default_rate_limit_qps() -> u32 {
    50
}

fn default_batch_size() -> usize {
    20
}

fn default_page_size() -> usize {
    1000
}

fn default_pool_core_size() -> usize {
    10
}

fn default_pool_max_size() -> usize {
    20
}

fn default_pool_queue_capacity() -> usize {
    100
}

fn default_pool_idle_timeout_secs() -> u64 {
    60
}

fn default_pool_shutdown_grace_secs() -> u64 {
    60
}

fn default_page_timeout_secs() -> u64 {
    30 * 60
}

fn default_alert_title() -> String {
    "【TTS商品失效告警】".to_string()
}

pub const DEFAULT_ALERT_TEMPLATE: &str = "商品ID: {productId}\n\
标题: {title}\n\
店铺: {shopName}\n\
销售地区: {saleRegion}\n\
佣金: {commission}\n\
最后校验时间: {lastCheckTime}\n\
请尽快处理，处理后在系统中确认失效。";

fn default_alert_content_template() -> String {
    DEFAULT_ALERT_TEMPLATE.to_string()
}

fn default_schedule_enabled() -> bool {
    true
}

fn default_schedule_cron() -> String {
    "0 0 2 * * *".to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Load from the environment (and `.env` if present), then validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: AppConfig = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later, mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.batch_size == 0 {
            return invalid("BATCH_SIZE must be greater than 0");
        }
        if self.page_size == 0 {
            return invalid("PAGE_SIZE must be greater than 0");
        }
        if self.rate_limit_qps == 0 {
            return invalid("RATE_LIMIT_QPS must be greater than 0");
        }
        if self.pool_core_size == 0 {
            return invalid("POOL_CORE_SIZE must be greater than 0");
        }
        if self.pool_core_size > self.pool_max_size {
            return invalid("POOL_CORE_SIZE must not exceed POOL_MAX_SIZE");
        }
        if self.pool_queue_capacity == 0 {
            return invalid("POOL_QUEUE_CAPACITY must be greater than 0");
        }
        if self.page_timeout_secs == 0 {
            return invalid("PAGE_TIMEOUT_SECS must be greater than 0");
        }
        for (name, value) in [
            ("TTS_APP_KEY", &self.tts_app_key),
            ("TTS_APP_SECRET", &self.tts_app_secret),
            ("TTS_ACCESS_TOKEN", &self.tts_access_token),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }
        if self.alert_enabled
            && self
                .alert_webhook_url
                .as_deref()
                .map_or(true, |url| url.trim().is_empty())
        {
            return invalid("ALERT_WEBHOOK_URL is required when ALERT_ENABLED=true");
        }
        Ok(())
    }

    pub fn batch_size(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.batch_size)
            .ok_or_else(|| ConfigError::Invalid("BATCH_SIZE must be greater than 0".to_string()))
    }

    pub fn page_size(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.page_size)
            .ok_or_else(|| ConfigError::Invalid("PAGE_SIZE must be greater than 0".to_string()))
    }

    pub fn rate_limit_qps(&self) -> Result<NonZeroU32, ConfigError> {
        NonZeroU32::new(self.rate_limit_qps)
            .ok_or_else(|| ConfigError::Invalid("RATE_LIMIT_QPS must be greater than 0".to_string()))
    }

    pub fn tts_timeout(&self) -> Duration {
        Duration::from_millis(self.tts_timeout_ms)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}
