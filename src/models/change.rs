//! Field changes detected between two snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked field on a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    SeatsRemaining,
    Instructor,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::SeatsRemaining => "seatsRemaining",
            Field::Instructor => "instructor",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Previous and current value of one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "camelCase")]
pub enum FieldDelta {
    SeatsRemaining { previous: i64, current: i64 },
    Instructor { previous: String, current: String },
}

impl FieldDelta {
    pub fn field(&self) -> Field {
        match self {
            FieldDelta::SeatsRemaining { .. } => Field::SeatsRemaining,
            FieldDelta::Instructor { .. } => Field::Instructor,
        }
    }

    /// Previous value rendered as text.
    pub fn previous_text(&self) -> String {
        match self {
            FieldDelta::SeatsRemaining { previous, .. } => previous.to_string(),
            FieldDelta::Instructor { previous, .. } => previous.clone(),
        }
    }

    /// Current value rendered as text.
    pub fn current_text(&self) -> String {
        match self {
            FieldDelta::SeatsRemaining { current, .. } => current.to_string(),
            FieldDelta::Instructor { current, .. } => current.clone(),
        }
    }
}

/// A single detected change on a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub resource_id: String,
    pub delta: FieldDelta,
    pub observed_at: DateTime<Utc>,
}

impl FieldChange {
    pub fn field(&self) -> Field {
        self.delta.field()
    }
}

/// Semantic category of a seat count transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Opened,
    Closed,
    Increased,
    Decreased,
    Unchanged,
}

impl Category {
    /// Opened and Closed are the threshold crossings.
    pub fn is_threshold(&self) -> bool {
        matches!(self, Category::Opened | Category::Closed)
    }
}
