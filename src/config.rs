// src/config.rs

//! Configuration loading utilities.
//!
//! Configuration comes from an optional TOML file, then environment
//! variables override individual values. Credentials are expected to come
//! from the environment in deployed runs.

use std::path::Path;

use crate::error::Result;
use crate::models::{Config, RunSettings, StorageBackend};

/// Source of the settings a run reads once while initializing.
pub trait RunSettingsProvider: Send + Sync {
    fn run_settings(&self) -> Result<RunSettings>;
}

impl RunSettingsProvider for Config {
    fn run_settings(&self) -> Result<RunSettings> {
        Ok(Config::run_settings(self))
    }
}

impl RunSettingsProvider for RunSettings {
    fn run_settings(&self) -> Result<RunSettings> {
        Ok(*self)
    }
}

/// Load configuration from a TOML file (defaults when the file is absent),
/// then apply environment overrides and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(path)?;
    apply_env(&mut config);
    config.validate()?;
    Ok(config)
}

/// Override configuration values from the process environment.
pub fn apply_env(config: &mut Config) {
    apply_env_from(config, |key| std::env::var(key).ok());
}

/// Override configuration values from an arbitrary variable lookup.
pub fn apply_env_from(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(term) = var("CURRENT_TERM") {
        config.term = Some(term);
    }

    if let Some(n) = var("BATCH_SIZE").and_then(|v| v.parse().ok()) {
        config.run.batch_size = n;
    }
    if let Some(n) = var("MAX_CONCURRENT").and_then(|v| v.parse().ok()) {
        config.run.max_concurrent = n;
    }
    if let Some(secs) = var("HTTP_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        config.http.timeout_secs = secs;
    }

    if let Some(mode) = var("PRODUCTION_MODE") {
        config.channels.dry_run = mode != "on";
    }

    if let Some(sid) = var("ACCOUNT_SID") {
        config.channels.twilio.account_sid = sid;
    }
    if let Some(token) = var("AUTH_TOKEN") {
        config.channels.twilio.auth_token = token;
    }
    if let Some(number) = var("PHONE_NUMBER") {
        config.channels.twilio.from_number = number;
    }
    if let Some(key) = var("MAILGUN_API_KEY") {
        config.channels.mailgun.api_key = key;
    }

    if let Some(url) = var("CONSOLE_URL") {
        config.alert.webhook_url = Some(url);
    }

    if let Some(backend) = var("STORAGE_BACKEND") {
        match backend.to_lowercase().as_str() {
            "s3" => config.storage.backend = StorageBackend::S3,
            "local" => config.storage.backend = StorageBackend::Local,
            other => log::warn!("Unknown STORAGE_BACKEND '{other}', keeping configured backend"),
        }
    }
    if let Some(dir) = var("STORAGE_DIR") {
        config.storage.root_dir = dir;
    }
    if let Some(bucket) = var("S3_BUCKET") {
        config.storage.bucket = bucket;
    }
    if let Some(prefix) = var("S3_PREFIX") {
        config.storage.prefix = prefix;
    }
}
