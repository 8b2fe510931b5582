//! Scriptable collaborators for pipeline tests.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{AppError, FetchError, Result};
use crate::models::{ChannelKind, FeedEntry, RunRecord, Section, SectionInfo, Snapshot, UserRecord};
use crate::services::render::Notification;
use crate::services::{Alerter, NotificationChannel, ResourceFetcher, SendOutcome};
use crate::storage::{MemoryStore, StateStore};

fn locked<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

/// Canned response for one resource.
#[derive(Debug, Clone)]
pub enum Script {
    Section(Section),
    Fail(FetchError),
    Panic,
}

/// Fetcher that answers from a fixed script and records what was asked.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    script: HashMap<String, Script>,
    fetched: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seats(mut self, id: &str, seats: i64, instructor: &str) -> Self {
        self.script.insert(
            id.to_string(),
            Script::Section(section(id, Snapshot::new(seats, instructor))),
        );
        self
    }

    pub fn fail(mut self, id: &str, error: FetchError) -> Self {
        self.script.insert(id.to_string(), Script::Fail(error));
        self
    }

    pub fn panic(mut self, id: &str) -> Self {
        self.script.insert(id.to_string(), Script::Panic);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        let mut ids = locked(&self.fetched).clone();
        ids.sort();
        ids
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn section(id: &str, snapshot: Snapshot) -> Section {
    Section {
        info: SectionInfo {
            crn: id.to_string(),
            subject: "CSCE".into(),
            course_number: "121".into(),
            title: "Intro to Programming".into(),
        },
        snapshot,
    }
}

#[async_trait]
impl ResourceFetcher for ScriptedFetcher {
    async fn fetch(&self, id: &str) -> std::result::Result<Section, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        locked(&self.fetched).push(id.to_string());
        match self.script.get(id) {
            Some(Script::Section(section)) => Ok(section.clone()),
            Some(Script::Fail(error)) => Err(error.clone()),
            Some(Script::Panic) => panic!("scripted panic for {id}"),
            None => Err(FetchError::Empty),
        }
    }
}

/// Channel that records destinations and optionally fails every send.
#[derive(Debug)]
pub struct RecordingChannel {
    kind: ChannelKind,
    fail: bool,
    calls: Mutex<Vec<String>>,
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingChannel {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            fail: false,
            calls: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(kind: ChannelKind) -> Self {
        Self {
            fail: true,
            ..Self::new(kind)
        }
    }

    pub fn calls(&self) -> Vec<String> {
        locked(&self.calls).clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        locked(&self.notifications).clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(&self, destination: &str, notification: &Notification) -> SendOutcome {
        locked(&self.calls).push(destination.to_string());
        locked(&self.notifications).push(notification.clone());
        if self.fail {
            SendOutcome::failed(Some(500), "scripted failure")
        } else {
            SendOutcome::ok(Some(200))
        }
    }
}

/// Alerter that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingAlerter {
    alerts: Mutex<Vec<String>>,
}

impl RecordingAlerter {
    pub fn alerts(&self) -> Vec<String> {
        locked(&self.alerts).clone()
    }
}

#[async_trait]
impl Alerter for RecordingAlerter {
    async fn alert(&self, _term: &str, error: &str) {
        locked(&self.alerts).push(error.to_string());
    }
}

/// Memory store with injectable failures.
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub unreachable: bool,
    pub failing_writes: HashSet<String>,
}

impl FaultyStore {
    pub fn unreachable() -> Self {
        Self {
            inner: MemoryStore::in_memory("202511"),
            unreachable: true,
            failing_writes: HashSet::new(),
        }
    }

    pub fn with_failing_write(inner: MemoryStore, id: &str) -> Self {
        Self {
            inner,
            unreachable: false,
            failing_writes: HashSet::from([id.to_string()]),
        }
    }

    fn check(&self) -> Result<()> {
        if self.unreachable {
            Err(AppError::store("connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StateStore for FaultyStore {
    async fn tracked_ids(&self) -> Result<Vec<String>> {
        self.check()?;
        self.inner.tracked_ids().await
    }

    async fn snapshot(&self, id: &str) -> Result<Option<Snapshot>> {
        self.check()?;
        self.inner.snapshot(id).await
    }

    async fn set_snapshot(&self, id: &str, snapshot: &Snapshot) -> Result<()> {
        self.check()?;
        if self.failing_writes.contains(id) {
            return Err(AppError::store(format!("write rejected for {id}")));
        }
        self.inner.set_snapshot(id, snapshot).await
    }

    async fn delete_resource(&self, id: &str) -> Result<()> {
        self.check()?;
        self.inner.delete_resource(id).await
    }

    async fn subscribers(&self, id: &str) -> Result<BTreeSet<String>> {
        self.check()?;
        self.inner.subscribers(id).await
    }

    async fn user_preferences(&self, user_id: &str) -> Result<Option<UserRecord>> {
        self.check()?;
        self.inner.user_preferences(user_id).await
    }

    async fn append_feed(&self, user_id: &str, entry: &FeedEntry) -> Result<()> {
        self.check()?;
        self.inner.append_feed(user_id, entry).await
    }

    async fn record_run(&self, record: &RunRecord) -> Result<()> {
        self.check()?;
        self.inner.record_run(record).await
    }

    async fn last_run(&self) -> Result<Option<RunRecord>> {
        self.check()?;
        self.inner.last_run().await
    }
}
