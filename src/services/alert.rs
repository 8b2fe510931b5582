// src/services/alert.rs

//! Operator alerts for failed runs and batches.

use async_trait::async_trait;
use reqwest::Client;

use crate::models::AlertConfig;
use crate::services::render;

/// Reports run-level failures to an operator.
///
/// Alerting is best effort: an alert that cannot be delivered is logged and
/// dropped.
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn alert(&self, term: &str, error: &str);
}

/// Posts an error embed to the operator console webhook.
pub struct WebhookAlerter {
    client: Client,
    url: String,
}

impl WebhookAlerter {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Alerter for WebhookAlerter {
    async fn alert(&self, term: &str, error: &str) {
        let body = render::error_embed(term, error);
        let result = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        if let Err(e) = result {
            log::error!("Failed to deliver operator alert: {e}");
        }
    }
}

/// Alerter used when no console webhook is configured.
pub struct LogAlerter;

#[async_trait]
impl Alerter for LogAlerter {
    async fn alert(&self, term: &str, error: &str) {
        log::error!("[ALERT] term {term}: {error}");
    }
}

/// Choose the alerter for a configuration.
pub fn from_config(config: &AlertConfig, client: &Client) -> Box<dyn Alerter> {
    match console_url(config) {
        Some(url) => Box::new(WebhookAlerter::new(client.clone(), url)),
        None => Box::new(LogAlerter),
    }
}

/// Console webhook to alert, `None` when unset or blank.
fn console_url(config: &AlertConfig) -> Option<&str> {
    config
        .webhook_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
}
