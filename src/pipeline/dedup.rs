//! Run-scoped deduplication of outbound sends.
//!
//! Several subscribers can share a destination (a class Discord webhook,
//! a shared inbox). The deduplicator makes sure one physical message goes
//! out per logical change and destination within a run.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::models::{ChannelKind, FieldDelta};

/// Identity of one logical send.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationEvent {
    pub resource_id: String,
    pub delta: FieldDelta,
    pub channel: ChannelKind,
    pub destination: String,
}

/// Insert-if-absent set shared by every worker in a run.
///
/// `admit` holds the lock only for the set insertion, so the check and the
/// record happen atomically and two workers racing on the same key cannot
/// both be admitted.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashSet<NotificationEvent>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time `event` is seen in this run.
    pub fn admit(&self, event: NotificationEvent) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(event)
    }

    /// Number of distinct events admitted so far.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
