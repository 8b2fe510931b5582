// src/error.rs

//! Unified error handling for the tracker.
//!
//! `AppError` covers everything that can escape a component. Failures that
//! are handled locally by the run (fetch failures, preference anomalies)
//! have their own small types so they never get confused with the
//! unexpected errors that abandon a batch.

use std::fmt;

use thiserror::Error;

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// State store read/write failed
    #[error("Store error: {0}")]
    Store(String),

    /// Worker task aborted unexpectedly
    #[error("Worker error for {resource}: {message}")]
    Worker { resource: String, message: String },

    /// Run could not initialize; nothing was processed
    #[error("Run failed during {phase}: {message}")]
    Run { phase: String, message: String },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a store error.
    pub fn store(message: impl fmt::Display) -> Self {
        Self::Store(message.to_string())
    }

    /// Create a worker error with the resource it was processing.
    pub fn worker(resource: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Worker {
            resource: resource.into(),
            message: message.to_string(),
        }
    }

    /// Create a run-level failure.
    pub fn run(phase: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Run {
            phase: phase.into(),
            message: message.to_string(),
        }
    }
}

/// Why a resource could not be fetched this run.
///
/// The resource stays tracked; the next run polls it again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network failure or non-success status
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// Upstream answered with nothing for this id
    #[error("empty response")]
    Empty,

    /// Upstream answered with something we could not parse
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unreachable(err.to_string())
    }
}

/// A subscriber record that is missing required structure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreferenceAnomaly {
    #[error("user record not found")]
    MissingRecord,

    #[error("user record has no methods field")]
    MissingMethods,

    #[error("user record has no settings field")]
    MissingSettings,
}
