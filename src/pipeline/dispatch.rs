// src/pipeline/dispatch.rs

//! Fan-out of one qualifying change to one subscriber.

use std::sync::Arc;

use futures::future::join_all;

use crate::models::{ChannelTarget, RunStats, Subscriber};
use crate::pipeline::dedup::{Deduplicator, NotificationEvent};
use crate::services::render::{self, Notification};
use crate::services::{ChannelSet, SendOutcome};
use crate::storage::StateStore;

/// What happened when a change was dispatched to one subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub sent: usize,
    pub failed: usize,
    /// Channels skipped because the same send already went out this run
    pub suppressed: usize,
    pub feed_written: bool,
}

impl DispatchOutcome {
    /// Fold into run counters.
    pub fn apply(&self, stats: &mut RunStats) {
        stats.notifications_sent += self.sent;
        stats.channel_failures += self.failed;
        stats.duplicates_suppressed += self.suppressed;
    }
}

/// Sends notifications through every enabled channel of a subscriber.
///
/// One dispatcher lives for one run. Its deduplicator is shared by every
/// worker of the run and dropped with it.
pub struct Dispatcher {
    channels: ChannelSet,
    store: Arc<dyn StateStore>,
    dedup: Deduplicator,
}

impl Dispatcher {
    pub fn new(channels: ChannelSet, store: Arc<dyn StateStore>) -> Self {
        Self {
            channels,
            store,
            dedup: Deduplicator::new(),
        }
    }

    /// Distinct sends admitted so far in this run.
    #[cfg(test)]
    pub(crate) fn admitted(&self) -> usize {
        self.dedup.len()
    }

    /// Deliver `notification` to `subscriber`.
    ///
    /// The in-app feed record is written first and does not depend on
    /// channel enablement. Channel sends are attempted independently; a
    /// failure on one never stops the others.
    pub async fn dispatch(
        &self,
        subscriber: &Subscriber,
        notification: &Notification,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        let entry = render::feed_entry(notification);
        match self.store.append_feed(&subscriber.user_id, &entry).await {
            Ok(()) => outcome.feed_written = true,
            Err(e) => log::warn!(
                "Could not write feed entry for user {} (section {}): {e}",
                subscriber.user_id,
                notification.section.crn
            ),
        }

        let mut admitted: Vec<&ChannelTarget> = Vec::new();
        for target in &subscriber.channels {
            let event = NotificationEvent {
                resource_id: notification.change.resource_id.clone(),
                delta: notification.change.delta.clone(),
                channel: target.kind,
                destination: target.destination.clone(),
            };
            if self.dedup.admit(event) {
                admitted.push(target);
            } else {
                log::debug!(
                    "Duplicate {} send to {} for section {} suppressed",
                    target.kind,
                    target.destination,
                    notification.change.resource_id
                );
                outcome.suppressed += 1;
            }
        }

        let sends = admitted
            .into_iter()
            .map(|target| async move { (target, self.send(target, notification).await) });

        for (target, result) in join_all(sends).await {
            if result.success {
                outcome.sent += 1;
            } else {
                outcome.failed += 1;
                log::warn!(
                    "{} send to {} failed (status {}): {}",
                    target.kind,
                    target.destination,
                    result
                        .status
                        .map_or_else(|| "none".to_string(), |s| s.to_string()),
                    result.detail.as_deref().unwrap_or("no detail")
                );
            }
        }

        outcome
    }

    async fn send(&self, target: &ChannelTarget, notification: &Notification) -> SendOutcome {
        match self.channels.get(target.kind) {
            Some(channel) => channel.send(&target.destination, notification).await,
            None => SendOutcome::failed(None, format!("no {} channel configured", target.kind)),
        }
    }
}
