//! Change detection between the stored and fetched snapshot.
//!
//! Detection is read-only. It reports what changed and the snapshot the
//! caller should commit; the caller performs the single write.

use chrono::{DateTime, Utc};

use crate::error::FetchError;
use crate::models::{FieldChange, FieldDelta, Snapshot};

/// Result of comparing a fetched snapshot against the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Field changes worth evaluating for notification
    pub changes: Vec<FieldChange>,
    /// Snapshot to commit (stored values overlaid with fetched ones)
    pub next: Snapshot,
    /// Whether `next` differs from what is stored
    pub write_required: bool,
    /// The resource had no stored snapshot at all
    pub baseline: bool,
}

/// Compare `fetched` against `stored` as of now.
pub fn detect(
    resource_id: &str,
    stored: Option<&Snapshot>,
    fetched: &Snapshot,
) -> Result<Detection, FetchError> {
    detect_at(resource_id, stored, fetched, Utc::now())
}

/// Compare `fetched` against `stored`, stamping changes with `observed_at`.
///
/// An empty `fetched` snapshot is a fetch failure. A missing `stored`
/// snapshot (or a missing field within it) is a baseline: it must be
/// written but produces no change.
pub fn detect_at(
    resource_id: &str,
    stored: Option<&Snapshot>,
    fetched: &Snapshot,
    observed_at: DateTime<Utc>,
) -> Result<Detection, FetchError> {
    if fetched.is_empty() {
        return Err(FetchError::Empty);
    }

    let Some(stored) = stored else {
        return Ok(Detection {
            changes: Vec::new(),
            next: fetched.clone(),
            write_required: true,
            baseline: true,
        });
    };

    let mut changes = Vec::new();
    let mut next = stored.clone();
    let change = |delta| FieldChange {
        resource_id: resource_id.to_string(),
        delta,
        observed_at,
    };

    if let Some(current) = fetched.seats {
        match stored.seats {
            Some(previous) if previous != current => {
                changes.push(change(FieldDelta::SeatsRemaining { previous, current }));
            }
            _ => {}
        }
        next.seats = Some(current);
    }

    if let Some(current) = &fetched.instructor {
        match &stored.instructor {
            Some(previous) if previous != current => {
                changes.push(change(FieldDelta::Instructor {
                    previous: previous.clone(),
                    current: current.clone(),
                }));
            }
            _ => {}
        }
        next.instructor = Some(current.clone());
    }

    let write_required = next != *stored;
    Ok(Detection {
        changes,
        next,
        write_required,
        baseline: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Field;

    #[test]
    fn test_first_observation_is_baseline() {
        let fetched = Snapshot::new(5, "Smith");
        let detection = detect("12345", None, &fetched).unwrap();
        assert!(detection.baseline);
        assert!(detection.write_required);
        assert!(detection.changes.is_empty());
        assert_eq!(detection.next, fetched);
    }

    #[test]
    fn test_equal_snapshot_no_changes() {
        let stored = Snapshot::new(5, "Smith");
        let detection = detect("12345", Some(&stored), &stored.clone()).unwrap();
        assert!(detection.changes.is_empty());
        assert!(!detection.write_required);
        assert!(!detection.baseline);
    }

    #[test]
    fn test_seat_change() {
        let stored = Snapshot::new(0, "Smith");
        let fetched = Snapshot::new(5, "Smith");
        let detection = detect("12345", Some(&stored), &fetched).unwrap();
        assert_eq!(detection.changes.len(), 1);
        assert_eq!(
            detection.changes[0].delta,
            FieldDelta::SeatsRemaining {
                previous: 0,
                current: 5
            }
        );
        assert_eq!(detection.changes[0].resource_id, "12345");
        assert!(detection.write_required);
    }

    #[test]
    fn test_both_fields_change() {
        let stored = Snapshot::new(3, "Smith");
        let fetched = Snapshot::new(2, "Jones");
        let detection = detect("12345", Some(&stored), &fetched).unwrap();
        let fields: Vec<_> = detection.changes.iter().map(|c| c.field()).collect();
        assert_eq!(fields, vec![Field::SeatsRemaining, Field::Instructor]);
        assert_eq!(detection.next, fetched);
    }

    #[test]
    fn test_missing_stored_field_is_field_baseline() {
        let stored = Snapshot {
            seats: Some(4),
            instructor: None,
        };
        let fetched = Snapshot::new(4, "Smith");
        let detection = detect("12345", Some(&stored), &fetched).unwrap();
        assert!(detection.changes.is_empty());
        assert!(detection.write_required);
        assert_eq!(detection.next.instructor.as_deref(), Some("Smith"));
    }

    #[test]
    fn test_field_absent_from_fetch_keeps_stored_value() {
        let stored = Snapshot::new(4, "Smith");
        let fetched = Snapshot {
            seats: Some(2),
            instructor: None,
        };
        let detection = detect("12345", Some(&stored), &fetched).unwrap();
        assert_eq!(detection.changes.len(), 1);
        assert_eq!(detection.next, Snapshot::new(2, "Smith"));
    }

    #[test]
    fn test_empty_fetch_is_failure() {
        let stored = Snapshot::new(4, "Smith");
        let result = detect("12345", Some(&stored), &Snapshot::default());
        assert_eq!(result, Err(FetchError::Empty));
    }

    #[test]
    fn test_zero_to_zero_is_not_a_change() {
        let stored = Snapshot {
            seats: Some(0),
            instructor: None,
        };
        let fetched = Snapshot {
            seats: Some(0),
            instructor: None,
        };
        let detection = detect("12345", Some(&stored), &fetched).unwrap();
        assert!(detection.changes.is_empty());
        assert!(!detection.write_required);
    }
}
