//! State store abstractions.
//!
//! The tracker keeps all persistent state in one JSON document:
//!
//! ```text
//! {
//!   "sections": { "{term}": { "{crn}": { "seats": 5, "instructor": "..", "users": { "{uid}": true } } } },
//!   "users":    { "{uid}": { "methods": {..}, "settings": {..}, "notifications": { "{ts} {crn}": {..} } } },
//!   "runs":     { "{term}": [ RunRecord, .. ] }
//! }
//! ```
//!
//! `DocumentStore` serves the `StateStore` operations from an in-memory copy
//! of the document and writes the whole document back through an
//! `ObjectBackend` after every mutation.

pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[cfg(not(feature = "s3"))]
use crate::error::AppError;
use crate::error::Result;
use crate::models::{
    FeedEntry, RunRecord, Snapshot, StorageBackend, StorageConfig, UserRecord,
};

// Re-export for convenience
pub use local::LocalBackend;
pub use memory::{MemoryBackend, MemoryStore};

/// Run records kept per term.
const MAX_RUN_HISTORY: usize = 50;

/// Open the configured store for `term`.
pub async fn open(config: &StorageConfig, term: &str) -> Result<Arc<dyn StateStore>> {
    match config.backend {
        StorageBackend::Local => {
            let store = DocumentStore::open(LocalBackend::new(&config.root_dir), term).await?;
            log::info!("Using local state at {}", store.backend().location());
            Ok(Arc::new(store))
        }
        #[cfg(feature = "s3")]
        StorageBackend::S3 => {
            let backend = s3::S3Backend::from_env(config.bucket.clone(), &config.prefix).await;
            let store = DocumentStore::open(backend, term).await?;
            log::info!("Using S3 state at {}", store.backend().location());
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => Err(AppError::config(
            "storage backend 's3' requires the `s3` feature",
        )),
    }
}

/// Persistent state the run reads and writes, scoped to one term.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Ids of every tracked resource.
    async fn tracked_ids(&self) -> Result<Vec<String>>;

    /// Last committed snapshot; `None` means never observed.
    async fn snapshot(&self, id: &str) -> Result<Option<Snapshot>>;

    /// Overwrite the tracked fields of an existing resource.
    async fn set_snapshot(&self, id: &str, snapshot: &Snapshot) -> Result<()>;

    /// Remove a resource and everything stored under it.
    async fn delete_resource(&self, id: &str) -> Result<()>;

    /// Users subscribed to a resource; empty when absent.
    async fn subscribers(&self, id: &str) -> Result<BTreeSet<String>>;

    /// Raw preferences for a user; `None` when the user record is missing.
    async fn user_preferences(&self, user_id: &str) -> Result<Option<UserRecord>>;

    /// Append to a user's in-app notification log.
    async fn append_feed(&self, user_id: &str, entry: &FeedEntry) -> Result<()>;

    /// Persist a finalized run record.
    async fn record_run(&self, record: &RunRecord) -> Result<()>;

    /// Most recent run record for this term.
    async fn last_run(&self) -> Result<Option<RunRecord>>;
}

/// Raw byte persistence for the state document.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Read the document, returning `None` if it doesn't exist yet.
    async fn read(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the document.
    async fn write(&self, bytes: &[u8]) -> Result<()>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}

/// A tracked section as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionEntry {
    #[serde(flatten)]
    pub snapshot: Snapshot,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub users: BTreeMap<String, bool>,
}

/// A user as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserEntry {
    #[serde(flatten)]
    pub record: UserRecord,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notifications: BTreeMap<String, FeedEntry>,
}

/// The whole persisted state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default)]
    pub sections: BTreeMap<String, BTreeMap<String, SectionEntry>>,

    #[serde(default)]
    pub users: BTreeMap<String, UserEntry>,

    #[serde(default)]
    pub runs: BTreeMap<String, Vec<RunRecord>>,
}

/// `StateStore` over a single JSON document.
pub struct DocumentStore<B> {
    backend: B,
    term: String,
    doc: Mutex<StateDocument>,
}

impl<B: ObjectBackend> DocumentStore<B> {
    /// Load the document from the backend (or start empty) for `term`.
    pub async fn open(backend: B, term: impl Into<String>) -> Result<Self> {
        let doc = match backend.read().await? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => {
                log::warn!("No state document at {}, starting empty", backend.location());
                StateDocument::default()
            }
        };
        Ok(Self::with_document(backend, term, doc))
    }

    /// Wrap an already loaded document without reading the backend.
    pub fn with_document(backend: B, term: impl Into<String>, doc: StateDocument) -> Self {
        Self {
            backend,
            term: term.into(),
            doc: Mutex::new(doc),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Copy of the current document.
    pub async fn document(&self) -> StateDocument {
        self.doc.lock().await.clone()
    }

    /// Subscribe a user to a section, creating the section if needed.
    pub async fn subscribe(&self, id: &str, user_id: &str) -> Result<()> {
        self.commit(|doc| {
            doc.sections
                .entry(self.term.clone())
                .or_default()
                .entry(id.to_string())
                .or_default()
                .users
                .insert(user_id.to_string(), true);
            true
        })
        .await
        .map(drop)
    }

    /// Add a section with no subscribers.
    pub async fn track(&self, id: &str) -> Result<()> {
        self.commit(|doc| {
            doc.sections
                .entry(self.term.clone())
                .or_default()
                .entry(id.to_string())
                .or_default();
            true
        })
        .await
        .map(drop)
    }

    /// Insert or replace a user's preferences.
    pub async fn put_user(&self, user_id: &str, record: UserRecord) -> Result<()> {
        self.commit(|doc| {
            doc.users.entry(user_id.to_string()).or_default().record = record;
            true
        })
        .await
        .map(drop)
    }

    /// Apply `change` to a copy of the document and adopt the copy once it is
    /// written. A change that reports `false` is neither written nor adopted.
    async fn commit(&self, change: impl FnOnce(&mut StateDocument) -> bool) -> Result<bool> {
        let mut doc = self.doc.lock().await;
        let mut next = doc.clone();
        if !change(&mut next) {
            return Ok(false);
        }
        let bytes = serde_json::to_vec_pretty(&next)?;
        self.backend.write(&bytes).await?;
        *doc = next;
        Ok(true)
    }

    fn section<'a>(&self, doc: &'a StateDocument, id: &str) -> Option<&'a SectionEntry> {
        doc.sections.get(&self.term).and_then(|s| s.get(id))
    }
}

#[async_trait]
impl<B: ObjectBackend> StateStore for DocumentStore<B> {
    async fn tracked_ids(&self) -> Result<Vec<String>> {
        let doc = self.doc.lock().await;
        Ok(doc
            .sections
            .get(&self.term)
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn snapshot(&self, id: &str) -> Result<Option<Snapshot>> {
        let doc = self.doc.lock().await;
        Ok(self
            .section(&doc, id)
            .map(|entry| entry.snapshot.clone())
            .filter(|snapshot| !snapshot.is_empty()))
    }

    async fn set_snapshot(&self, id: &str, snapshot: &Snapshot) -> Result<()> {
        let written = self
            .commit(|doc| {
                match doc.sections.get_mut(&self.term).and_then(|s| s.get_mut(id)) {
                    Some(entry) => {
                        entry.snapshot = snapshot.clone();
                        true
                    }
                    None => false,
                }
            })
            .await?;
        if !written {
            // Writing here would resurrect a deleted resource with no subscribers.
            log::warn!("Section {id} no longer tracked, dropping snapshot write");
        }
        Ok(())
    }

    async fn delete_resource(&self, id: &str) -> Result<()> {
        self.commit(|doc| {
            doc.sections
                .get_mut(&self.term)
                .and_then(|s| s.remove(id))
                .is_some()
        })
        .await
        .map(drop)
    }

    async fn subscribers(&self, id: &str) -> Result<BTreeSet<String>> {
        let doc = self.doc.lock().await;
        Ok(self
            .section(&doc, id)
            .map(|entry| {
                entry
                    .users
                    .iter()
                    .filter(|(_, active)| **active)
                    .map(|(uid, _)| uid.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn user_preferences(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let doc = self.doc.lock().await;
        Ok(doc.users.get(user_id).map(|u| u.record.clone()))
    }

    async fn append_feed(&self, user_id: &str, entry: &FeedEntry) -> Result<()> {
        self.commit(|doc| {
            let feed = &mut doc.users.entry(user_id.to_string()).or_default().notifications;
            // Seat and instructor changes of one section share a timestamp.
            let base = entry.key();
            let mut key = base.clone();
            let mut n = 1;
            while feed.contains_key(&key) {
                n += 1;
                key = format!("{base} #{n}");
            }
            feed.insert(key, entry.clone());
            true
        })
        .await
        .map(drop)
    }

    async fn record_run(&self, record: &RunRecord) -> Result<()> {
        self.commit(|doc| {
            let history = doc.runs.entry(self.term.clone()).or_default();
            history.push(record.clone());
            if history.len() > MAX_RUN_HISTORY {
                let excess = history.len() - MAX_RUN_HISTORY;
                history.drain(..excess);
            }
            true
        })
        .await
        .map(drop)
    }

    async fn last_run(&self) -> Result<Option<RunRecord>> {
        let doc = self.doc.lock().await;
        Ok(doc.runs.get(&self.term).and_then(|h| h.last().cloned()))
    }
}
