// src/models/mod.rs

//! Domain models for the tracker.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod change;
mod config;
mod feed;
mod run;
mod section;
mod subscriber;

// Re-export all public types
pub use change::{Category, Field, FieldChange, FieldDelta};
pub use config::{
    AlertConfig, ChannelsConfig, Config, FetcherConfig, HttpConfig, LoggingConfig, MailgunConfig,
    RunConfig, StorageBackend, StorageConfig, TwilioConfig,
};
pub use feed::FeedEntry;
pub use run::{BatchOutcome, RunPhase, RunRecord, RunSettings, RunStats};
pub use section::{Section, SectionInfo, Snapshot};
pub use subscriber::{
    ChannelKind, ChannelTarget, Method, Methods, NotificationMode, Subscriber, Topics, UserRecord,
    UserSettings,
};
