//! Alerts for products that turned invalid and are still unacknowledged.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::store::{ProductStore, StoreError};
use crate::models::product::ProductRecord;
use crate::services::notifier::Notifier;

const LAST_CHECK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub enabled: bool,
    pub title: String,
    pub content_template: String,
}

impl AlertSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            enabled: config.alert_enabled,
            title: config.alert_title.clone(),
            content_template: config.alert_content_template.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertReport {
    pub candidates: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Fill the template for one record. Fields that were never stored get a
/// fixed stand-in; stored empty strings render as they are.
///
/// Placeholders: `{productId}`, `{title}`, `{shopName}`, `{saleRegion}`,
/// `{commission}`, `{lastCheckTime}`.
pub fn render_content(template: &str, record: &ProductRecord) -> String {
    let last_check = record
        .last_check_time
        .map(|t| t.format(LAST_CHECK_FORMAT).to_string())
        .unwrap_or_else(|| "未知".to_string());

    template
        .replace("{productId}", &record.product_id)
        .replace("{title}", or_placeholder(record.title.as_deref(), "无标题"))
        .replace("{shopName}", or_placeholder(record.shop_name.as_deref(), "无店铺"))
        .replace("{saleRegion}", or_placeholder(record.sale_region.as_deref(), "无"))
        // An invalid product has no usable commission by definition.
        .replace("{commission}", "无")
        .replace("{lastCheckTime}", &last_check)
}

fn or_placeholder<'a>(value: Option<&'a str>, placeholder: &'a str) -> &'a str {
    value.unwrap_or(placeholder)
}

pub struct AlertDispatcher {
    store: Arc<dyn ProductStore>,
    notifier: Arc<dyn Notifier>,
    settings: AlertSettings,
}

impl AlertDispatcher {
    pub fn new(store: Arc<dyn ProductStore>, notifier: Arc<dyn Notifier>, settings: AlertSettings) -> Self {
        Self {
            store,
            notifier,
            settings,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Title line followed by the rendered template.
    pub fn render_message(&self, record: &ProductRecord) -> String {
        format!(
            "{}\n{}",
            self.settings.title,
            render_content(&self.settings.content_template, record)
        )
    }

    /// Send one alert per invalid, pending product. A failed delivery is
    /// logged and counted; the remaining records are still attempted.
    pub async fn dispatch(&self) -> Result<AlertReport, StoreError> {
        if !self.settings.enabled {
            tracing::debug!(target: "alert", "Alerts disabled, skipping dispatch");
            return Ok(AlertReport::default());
        }

        let records = self.store.select_invalid_unconfirmed().await?;
        let mut report = AlertReport {
            candidates: records.len(),
            ..AlertReport::default()
        };
        if records.is_empty() {
            tracing::info!(target: "alert", "No unconfirmed invalid products to alert on");
            return Ok(report);
        }

        for record in &records {
            let message = self.render_message(record);
            match self.notifier.send(&message).await {
                Ok(()) => {
                    report.sent += 1;
                    metrics::counter!("alerts_sent_total", "outcome" => "success").increment(1);
                    tracing::info!(target: "alert", product_id = %record.product_id, "Invalid product alert sent");
                }
                Err(e) => {
                    report.failed += 1;
                    metrics::counter!("alerts_sent_total", "outcome" => "failure").increment(1);
                    tracing::error!(
                        target: "alert",
                        product_id = %record.product_id,
                        error = %e,
                        "Invalid product alert failed"
                    );
                }
            }
        }

        tracing::info!(
            target: "alert",
            candidates = report.candidates,
            sent = report.sent,
            failed = report.failed,
            "Alert dispatch finished"
        );
        Ok(report)
    }
}
