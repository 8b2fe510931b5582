//! AWS S3 backend.
//!
//! Stores the state document as a single object at `{bucket}/{prefix}/state.json`.

use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::storage::ObjectBackend;

/// S3-backed state document.
#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
    key: String,
}

impl S3Backend {
    /// Create a new S3 backend instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        let key = if prefix.is_empty() {
            "state.json".to_string()
        } else {
            format!("{prefix}/state.json")
        };
        Self {
            client,
            bucket: bucket.into(),
            key,
        }
    }

    /// Create an S3 backend from the default AWS environment.
    pub async fn from_env(bucket: impl Into<String>, prefix: &str) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), bucket, prefix)
    }
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::store(format!("reading {}: {e}", self.location())))?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                // Check if it's a "not found" error
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    log::info!("No existing state at {}", self.location());
                    Ok(None)
                } else {
                    Err(AppError::store(service_err))
                }
            }
        }
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| AppError::store(format!("writing {}: {e}", self.location())))?;
        Ok(())
    }

    fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}
