//! Service layer for the tracker.
//!
//! This module contains the external collaborators:
//! - Section fetching (`ResourceFetcher`, `HowdyFetcher`)
//! - Notification delivery (`NotificationChannel`, `ChannelSet`)
//! - Operator alerts (`Alerter`)
//! - Rendering of notification payloads

pub mod alert;
pub mod channels;
pub mod fetcher;
pub mod render;
#[cfg(test)]
pub(crate) mod testing;

pub use alert::{Alerter, LogAlerter, WebhookAlerter};
pub use channels::{
    ChannelSet, DryRunChannel, EmailChannel, NotificationChannel, SendOutcome, SmsChannel,
    WebhookChannel,
};
pub use fetcher::{HowdyFetcher, ResourceFetcher, SeatCounts};
pub use render::Notification;
