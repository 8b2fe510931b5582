//! In-app notification feed entries.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry in a subscriber's persistent notification log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub crn: String,
    pub message: String,

    #[serde(rename = "origSeats")]
    pub previous: Value,

    #[serde(rename = "newSeats")]
    pub current: Value,
}

impl FeedEntry {
    /// Key under which the entry is stored, e.g. `2025-11-02T10:00:00Z 12345`.
    pub fn key(&self) -> String {
        format!(
            "{} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.crn
        )
    }
}
