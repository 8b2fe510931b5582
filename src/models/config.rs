//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::RunSettings;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Term polled when none is given on the command line
    #[serde(default)]
    pub term: Option<String>,

    /// Batching and worker concurrency
    #[serde(default)]
    pub run: RunConfig,

    /// HTTP client settings shared by the fetcher and channels
    #[serde(default)]
    pub http: HttpConfig,

    /// Upstream catalog endpoints
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Delivery channel credentials
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Where run failures are reported
    #[serde(default)]
    pub alert: AlertConfig,

    /// State store backend
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, using defaults only when the file does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match Self::load(&path) {
            Err(AppError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("No config file at {:?}, using defaults", path.as_ref());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.run.batch_size == 0 {
            return Err(AppError::validation("run.batch_size must be > 0"));
        }
        if self.run.max_concurrent == 0 {
            return Err(AppError::validation("run.max_concurrent must be > 0"));
        }
        Url::parse(&self.fetcher.howdy_url)
            .map_err(|e| AppError::validation(format!("fetcher.howdy_url: {e}")))?;
        Url::parse(&self.fetcher.compass_url)
            .map_err(|e| AppError::validation(format!("fetcher.compass_url: {e}")))?;
        if let Some(url) = &self.alert.webhook_url {
            Url::parse(url).map_err(|e| AppError::validation(format!("alert.webhook_url: {e}")))?;
        }
        if self.storage.backend == StorageBackend::S3 && self.storage.bucket.trim().is_empty() {
            return Err(AppError::validation("storage.bucket is empty for s3 backend"));
        }
        Ok(())
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            batch_size: self.run.batch_size,
            max_concurrent: self.run.max_concurrent,
        }
    }
}

/// Batching and concurrency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Resources per batch; batches run one after another
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Maximum concurrent workers within a batch
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::batch_size(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Catalog endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Section details and instructor API
    #[serde(default = "defaults::howdy_url")]
    pub howdy_url: String,

    /// Seat counts page
    #[serde(default = "defaults::compass_url")]
    pub compass_url: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            howdy_url: defaults::howdy_url(),
            compass_url: defaults::compass_url(),
        }
    }
}

/// Delivery channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Log sends instead of performing them
    #[serde(default = "defaults::dry_run")]
    pub dry_run: bool,

    #[serde(default)]
    pub twilio: TwilioConfig,

    #[serde(default)]
    pub mailgun: MailgunConfig,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            dry_run: defaults::dry_run(),
            twilio: TwilioConfig::default(),
            mailgun: MailgunConfig::default(),
        }
    }
}

/// Twilio SMS credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    #[serde(default = "defaults::twilio_url")]
    pub api_url: String,

    #[serde(default)]
    pub account_sid: String,

    #[serde(default)]
    pub auth_token: String,

    /// Sending phone number
    #[serde(default)]
    pub from_number: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::twilio_url(),
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
        }
    }
}

/// Mailgun email credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailgunConfig {
    #[serde(default = "defaults::mailgun_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "defaults::mail_from")]
    pub from: String,
}

impl Default for MailgunConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::mailgun_url(),
            api_key: String::new(),
            from: defaults::mail_from(),
        }
    }
}

/// Run failure reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Console webhook that receives an error embed
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Which state store backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    S3,
}

/// State store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the local backend
    #[serde(default = "defaults::storage_root")]
    pub root_dir: String,

    #[serde(default)]
    pub bucket: String,

    #[serde(default = "defaults::storage_prefix")]
    pub prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            root_dir: defaults::storage_root(),
            bucket: String::new(),
            prefix: defaults::storage_prefix(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    pub fn batch_size() -> usize {
        25
    }
    pub fn max_concurrent() -> usize {
        8
    }

    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; section-tracker/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    pub fn howdy_url() -> String {
        "https://howdy.tamu.edu/".into()
    }
    pub fn compass_url() -> String {
        "https://compass-ssb.tamu.edu/".into()
    }

    pub fn dry_run() -> bool {
        true
    }
    pub fn twilio_url() -> String {
        "https://api.twilio.com/2010-04-01".into()
    }
    pub fn mailgun_url() -> String {
        "https://api.mailgun.net/v3/email.aggieseek.net/messages".into()
    }
    pub fn mail_from() -> String {
        "AggieSeek <no-reply@email.aggieseek.net>".into()
    }

    pub fn storage_root() -> String {
        "storage".into()
    }
    pub fn storage_prefix() -> String {
        "tracker".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.http.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_batch_size() {
        let mut config = Config::default();
        config.run.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_s3_without_bucket() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::S3;
        assert!(config.validate().is_err());
        config.storage.bucket = "tracker-state".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert!(config.channels.dry_run);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[channels\ndry_run = false\n").unwrap();
        assert!(matches!(
            Config::load_or_default(&path),
            Err(AppError::Toml(_))
        ));
    }

    #[test]
    fn unreadable_path_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        // A directory exists but cannot be read as a file.
        assert!(matches!(
            Config::load_or_default(dir.path()),
            Err(AppError::Io(_))
        ));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            term = "202611"

            [run]
            batch_size = 50

            [channels]
            dry_run = false
            "#,
        )
        .unwrap();
        assert_eq!(config.term.as_deref(), Some("202611"));
        assert_eq!(config.run.batch_size, 50);
        assert_eq!(config.run.max_concurrent, 8);
        assert!(!config.channels.dry_run);
        assert_eq!(config.storage.backend, StorageBackend::Local);
    }
}
