// src/lambda/mod.rs

//! AWS Lambda handler for the tracker.
//!
//! Each invocation performs one run:
//! 1. Builds configuration from the environment (optionally a bundled TOML file)
//! 2. Resolves the term from the event or `CURRENT_TERM`
//! 3. Runs the pipeline and reports counts

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::load_config;
use crate::error::{AppError, Result};
use crate::models::{Config, RunRecord};
use crate::pipeline;

/// Lambda invocation payload.
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    /// Term to check (falls back to `CURRENT_TERM`)
    #[serde(default)]
    pub term: Option<String>,
}

/// Lambda response payload.
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct RunResponse {
    /// `success` or `error`
    pub status: String,

    /// Sections checked this run
    pub resources: usize,

    /// Field changes detected
    pub changes: usize,

    /// Notifications delivered
    pub notifications: usize,

    /// Error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution time in milliseconds
    pub duration_ms: u64,
}

impl RunResponse {
    fn from_record(record: &RunRecord) -> Self {
        Self {
            status: "success".to_string(),
            resources: record.resource_count,
            changes: record.stats.changes_detected,
            notifications: record.stats.notifications_sent,
            error: None,
            duration_ms: record.duration_ms.unwrap_or(0),
        }
    }
}

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(
    event: LambdaEvent<RunRequest>,
) -> std::result::Result<RunResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (request, _context) = event.into_parts();

    info!("Starting run: term={:?}", request.term);

    match run(&request).await {
        Ok(record) => {
            let response = RunResponse::from_record(&record);
            info!(
                "Run completed: {} sections, {} changes, {} notifications in {}ms",
                response.resources, response.changes, response.notifications, response.duration_ms
            );
            Ok(response)
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Ok(RunResponse {
                status: "error".to_string(),
                error: Some(e.to_string()),
                duration_ms: start.elapsed().as_millis() as u64,
                ..Default::default()
            })
        }
    }
}

async fn run(request: &RunRequest) -> Result<RunRecord> {
    let config = load_lambda_config()?;
    let term = resolve_term(request, &config)?;
    pipeline::run_with_config(&config, &term).await
}

/// Configuration for the Lambda environment.
fn load_lambda_config() -> Result<Config> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_config(std::path::Path::new(&path))
}

fn resolve_term(request: &RunRequest, config: &Config) -> Result<String> {
    request
        .term
        .as_deref()
        .or(config.term.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::config("no term in event and CURRENT_TERM is not set"))
}
