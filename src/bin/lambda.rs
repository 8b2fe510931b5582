//! AWS Lambda entry point for the section tracker
//!
//! Deploy with `cargo lambda build --release --features lambda,s3`
//! and trigger on a schedule; each invocation performs one run.

use lambda_runtime::{Error as LambdaError, service_fn};
use section_tracker::lambda::handler;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Section tracker Lambda starting...");
    lambda_runtime::run(service_fn(handler)).await
}
