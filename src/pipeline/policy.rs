//! Per-subscriber notification policy.

use crate::error::PreferenceAnomaly;
use crate::models::{Category, FieldChange, FieldDelta, NotificationMode, Subscriber};

/// What to do with one subscriber for one change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Notify,
    Suppress,
    /// The subscriber record is unusable; skip it for this change
    Skip(PreferenceAnomaly),
}

/// Whether a valid subscriber should hear about a change.
///
/// Seat changes follow the subscriber's mode. Instructor changes follow
/// only the instructor topic filter.
pub fn should_notify(
    subscriber: &Subscriber,
    change: &FieldChange,
    category: Option<Category>,
) -> bool {
    match &change.delta {
        FieldDelta::Instructor { .. } => subscriber.notify_instructor,
        FieldDelta::SeatsRemaining { .. } => match (subscriber.mode, category) {
            (_, None) | (_, Some(Category::Unchanged)) => false,
            (NotificationMode::All, Some(_)) => true,
            (NotificationMode::ThresholdOnly, Some(category)) => category.is_threshold(),
        },
    }
}

/// Evaluate a subscriber profile that may have failed validation.
pub fn evaluate(
    user_id: &str,
    profile: Result<&Subscriber, &PreferenceAnomaly>,
    change: &FieldChange,
    category: Option<Category>,
) -> Decision {
    match profile {
        Ok(subscriber) if should_notify(subscriber, change, category) => Decision::Notify,
        Ok(_) => Decision::Suppress,
        Err(anomaly) => {
            log::warn!(
                "User {user_id} skipped for section {}: {anomaly}",
                change.resource_id
            );
            Decision::Skip(anomaly.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::pipeline::classify::classify_delta;

    fn subscriber(mode: NotificationMode, notify_instructor: bool) -> Subscriber {
        Subscriber {
            user_id: "u1".into(),
            mode,
            channels: Vec::new(),
            notify_instructor,
        }
    }

    fn seats(previous: i64, current: i64) -> FieldChange {
        FieldChange {
            resource_id: "12345".into(),
            delta: FieldDelta::SeatsRemaining { previous, current },
            observed_at: Utc::now(),
        }
    }

    fn instructor() -> FieldChange {
        FieldChange {
            resource_id: "12345".into(),
            delta: FieldDelta::Instructor {
                previous: "Smith".into(),
                current: "Jones".into(),
            },
            observed_at: Utc::now(),
        }
    }

    fn check(sub: &Subscriber, change: &FieldChange) -> bool {
        should_notify(sub, change, classify_delta(&change.delta))
    }

    #[test]
    fn test_all_mode_accepts_every_seat_change() {
        let sub = subscriber(NotificationMode::All, false);
        assert!(check(&sub, &seats(10, 7)));
        assert!(check(&sub, &seats(7, 10)));
        assert!(check(&sub, &seats(0, 5)));
        assert!(check(&sub, &seats(5, 0)));
    }

    #[test]
    fn test_threshold_mode_only_crossings() {
        let sub = subscriber(NotificationMode::ThresholdOnly, false);
        assert!(check(&sub, &seats(0, 5)));
        assert!(check(&sub, &seats(1, 0)));
        assert!(!check(&sub, &seats(10, 7)));
        assert!(!check(&sub, &seats(7, 10)));
    }

    #[test]
    fn test_unchanged_never_notifies() {
        let sub = subscriber(NotificationMode::All, true);
        assert!(!should_notify(&sub, &seats(5, 5), Some(Category::Unchanged)));
    }

    #[test]
    fn test_instructor_follows_topic_filter_only() {
        let on = subscriber(NotificationMode::ThresholdOnly, true);
        let off = subscriber(NotificationMode::All, false);
        assert!(check(&on, &instructor()));
        assert!(!check(&off, &instructor()));
    }

    #[test]
    fn test_anomaly_is_skipped() {
        let anomaly = PreferenceAnomaly::MissingMethods;
        let change = seats(0, 5);
        let decision = evaluate("u1", Err(&anomaly), &change, Some(Category::Opened));
        assert_eq!(decision, Decision::Skip(PreferenceAnomaly::MissingMethods));
    }

    #[test]
    fn test_evaluate_valid_subscriber() {
        let sub = subscriber(NotificationMode::ThresholdOnly, false);
        let change = seats(10, 7);
        assert_eq!(
            evaluate("u1", Ok(&sub), &change, Some(Category::Decreased)),
            Decision::Suppress
        );
        let change = seats(0, 7);
        assert_eq!(
            evaluate("u1", Ok(&sub), &change, Some(Category::Opened)),
            Decision::Notify
        );
    }
}
