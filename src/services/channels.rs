// src/services/channels.rs

//! Notification delivery channels.
//!
//! Each channel turns a `Notification` into one outbound request. Transport
//! errors never escape: they come back as a failed `SendOutcome` so the
//! dispatcher can log them and move on to the next channel.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use crate::models::{ChannelKind, ChannelsConfig, MailgunConfig, TwilioConfig};
use crate::services::render::{self, Notification};
use crate::utils::http::truncate_body;

/// Result of a single send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub success: bool,
    /// HTTP status when the transport got that far
    pub status: Option<u16>,
    pub detail: Option<String>,
}

impl SendOutcome {
    pub fn ok(status: Option<u16>) -> Self {
        Self {
            success: true,
            status,
            detail: None,
        }
    }

    pub fn failed(status: Option<u16>, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            status,
            detail: Some(detail.into()),
        }
    }
}

/// One external delivery mechanism.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    async fn send(&self, destination: &str, notification: &Notification) -> SendOutcome;
}

/// Channels available to a run, by kind.
#[derive(Clone, Default)]
pub struct ChannelSet {
    channels: HashMap<ChannelKind, Arc<dyn NotificationChannel>>,
}

impl ChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under its own kind, replacing any previous one.
    pub fn with(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.insert(channel.kind(), channel);
        self
    }

    pub fn get(&self, kind: ChannelKind) -> Option<&Arc<dyn NotificationChannel>> {
        self.channels.get(&kind)
    }

    /// Build the real (or dry-run) channels from configuration.
    pub fn from_config(config: &ChannelsConfig, client: &Client) -> Self {
        if config.dry_run {
            log::info!("Channels running in dry-run mode; nothing will be sent");
            return ChannelKind::ALL
                .into_iter()
                .fold(Self::new(), |set, kind| set.with(Arc::new(DryRunChannel::new(kind))));
        }
        Self::new()
            .with(Arc::new(WebhookChannel::new(client.clone())))
            .with(Arc::new(SmsChannel::new(client.clone(), config.twilio.clone())))
            .with(Arc::new(EmailChannel::new(
                client.clone(),
                config.mailgun.clone(),
            )))
    }
}

/// Convert an HTTP response into a `SendOutcome`.
async fn outcome_from(result: reqwest::Result<reqwest::Response>) -> SendOutcome {
    match result {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                SendOutcome::ok(Some(status.as_u16()))
            } else {
                let body = response.text().await.unwrap_or_default();
                SendOutcome::failed(Some(status.as_u16()), truncate_body(&body, 200))
            }
        }
        Err(e) => SendOutcome::failed(e.status().map(|s| s.as_u16()), e.to_string()),
    }
}

/// Chat webhook: POSTs an embed to the destination URL.
pub struct WebhookChannel {
    client: Client,
}

impl WebhookChannel {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    async fn send(&self, destination: &str, notification: &Notification) -> SendOutcome {
        log::info!("Sending webhook message to {destination}");
        let body = render::webhook_embed(notification);
        outcome_from(self.client.post(destination).json(&body).send().await).await
    }
}

/// SMS through the Twilio Messages API.
pub struct SmsChannel {
    client: Client,
    config: TwilioConfig,
}

impl SmsChannel {
    pub fn new(client: Client, config: TwilioConfig) -> Self {
        Self { client, config }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.config.api_url.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn send(&self, destination: &str, notification: &Notification) -> SendOutcome {
        if self.config.account_sid.is_empty() || self.config.from_number.is_empty() {
            return SendOutcome::failed(None, "twilio credentials not configured");
        }
        log::info!("Sending text message to {destination}");
        let body = render::text_message(notification);
        let form = [
            ("From", self.config.from_number.as_str()),
            ("To", destination),
            ("Body", body.as_str()),
        ];
        let request = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form);
        outcome_from(request.send().await).await
    }
}

/// Email through the Mailgun messages API.
pub struct EmailChannel {
    client: Client,
    config: MailgunConfig,
}

impl EmailChannel {
    pub fn new(client: Client, config: MailgunConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, destination: &str, notification: &Notification) -> SendOutcome {
        if self.config.api_key.is_empty() {
            return SendOutcome::failed(None, "mailgun api key not configured");
        }
        log::info!("Sending email to {destination}");
        let (subject, text) = render::email_message(notification);
        let form = [
            ("from", self.config.from.as_str()),
            ("to", destination),
            ("subject", subject.as_str()),
            ("text", text.as_str()),
        ];
        let request = self
            .client
            .post(&self.config.api_url)
            .basic_auth("api", Some(&self.config.api_key))
            .form(&form);
        outcome_from(request.send().await).await
    }
}

/// Logs what would be sent and reports success.
pub struct DryRunChannel {
    kind: ChannelKind,
}

impl DryRunChannel {
    pub fn new(kind: ChannelKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl NotificationChannel for DryRunChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(&self, destination: &str, notification: &Notification) -> SendOutcome {
        log::info!(
            "[dry-run] {} to {destination}: {}",
            self.kind,
            render::text_message(notification).replace('\n', " | ")
        );
        SendOutcome::ok(None)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{Category, FieldChange, FieldDelta, SectionInfo};

    fn notification() -> Notification {
        Notification {
            section: SectionInfo {
                crn: "12345".into(),
                subject: "CSCE".into(),
                course_number: "121".into(),
                title: "Intro".into(),
            },
            instructor: None,
            change: FieldChange {
                resource_id: "12345".into(),
                delta: FieldDelta::SeatsRemaining {
                    previous: 0,
                    current: 5,
                },
                observed_at: Utc::now(),
            },
            category: Some(Category::Opened),
        }
    }

    #[test]
    fn test_dry_run_config_registers_every_kind() {
        let set = ChannelSet::from_config(&ChannelsConfig::default(), &Client::new());
        for kind in ChannelKind::ALL {
            assert_eq!(set.get(kind).map(|c| c.kind()), Some(kind));
        }
    }

    #[tokio::test]
    async fn test_dry_run_reports_success() {
        let channel = DryRunChannel::new(ChannelKind::Sms);
        let outcome = channel.send("+15550001111", &notification()).await;
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn test_sms_without_credentials_fails_locally() {
        let channel = SmsChannel::new(Client::new(), TwilioConfig::default());
        let outcome = channel.send("+15550001111", &notification()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.status, None);
    }

    #[tokio::test]
    async fn test_email_without_key_fails_locally() {
        let channel = EmailChannel::new(Client::new(), MailgunConfig::default());
        let outcome = channel.send("a@b.test", &notification()).await;
        assert!(!outcome.success);
    }

    #[test]
    fn test_twilio_messages_url() {
        let config = TwilioConfig {
            account_sid: "AC123".into(),
            ..TwilioConfig::default()
        };
        let channel = SmsChannel::new(Client::new(), config);
        assert_eq!(
            channel.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }
}
