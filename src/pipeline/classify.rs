//! Seat count classification.

use crate::models::{Category, FieldDelta};

/// Classify a seat transition.
///
/// Rules are evaluated in order and the first match wins, so a move from
/// zero to a positive count is always `Opened`, never `Increased`.
pub fn classify(previous: i64, current: i64) -> Category {
    if previous <= 0 && current > 0 {
        Category::Opened
    } else if previous >= 1 && current <= 0 {
        Category::Closed
    } else if previous > current {
        Category::Decreased
    } else if previous < current {
        Category::Increased
    } else {
        Category::Unchanged
    }
}

/// Category for a delta; instructor changes are not classified.
pub fn classify_delta(delta: &FieldDelta) -> Option<Category> {
    match delta {
        FieldDelta::SeatsRemaining { previous, current } => Some(classify(*previous, *current)),
        FieldDelta::Instructor { .. } => None,
    }
}
