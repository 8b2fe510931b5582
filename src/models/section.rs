//! Course section data structures.

use serde::{Deserialize, Serialize};

/// Tracked field values for a section at a point in time.
///
/// Each field is optional on its own: a stored snapshot written by an older
/// run may lack a field, and that absence is a baseline for the field rather
/// than a zero or empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Seats remaining (may be negative when a section is over-enrolled)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seats: Option<i64>,

    /// Instructor display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
}

impl Snapshot {
    pub fn new(seats: i64, instructor: impl Into<String>) -> Self {
        Self {
            seats: Some(seats),
            instructor: Some(instructor.into()),
        }
    }

    /// True when no tracked field carries a value.
    pub fn is_empty(&self) -> bool {
        self.seats.is_none() && self.instructor.is_none()
    }
}

/// Descriptive information about a section, used only for presentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionInfo {
    /// Course reference number
    pub crn: String,

    /// Subject code, e.g. `CSCE`
    pub subject: String,

    /// Course number, e.g. `121`
    pub course_number: String,

    /// Course title
    pub title: String,
}

impl SectionInfo {
    /// Short course label, e.g. `CSCE 121`.
    pub fn course(&self) -> String {
        format!("{} {}", self.subject, self.course_number)
    }
}

/// A freshly fetched section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub info: SectionInfo,
    pub snapshot: Snapshot,
}
