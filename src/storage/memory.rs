//! In-process backend.
//!
//! Keeps the serialized document in memory. Used for dry runs against a
//! seeded document and throughout the tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::storage::{DocumentStore, ObjectBackend, StateDocument};

/// `StateStore` that never leaves the process.
pub type MemoryStore = DocumentStore<MemoryBackend>;

/// Backend holding the last written bytes.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryBackend {
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Mutex::new(Some(bytes)),
        }
    }

    /// Last written bytes, if any.
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.contents())
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        *self
            .bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(bytes.to_vec());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

impl DocumentStore<MemoryBackend> {
    /// Empty in-memory store for `term`.
    pub fn in_memory(term: impl Into<String>) -> Self {
        Self::with_document(MemoryBackend::default(), term, StateDocument::default())
    }
}
