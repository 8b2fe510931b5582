//! Subscriber preferences.
//!
//! `UserRecord` is the raw shape persisted by the state store. It is
//! converted into a validated `Subscriber` once per run; records missing
//! required structure become a `PreferenceAnomaly` instead.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PreferenceAnomaly;

/// How a subscriber wants seat changes filtered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationMode {
    /// Every seat change
    #[default]
    All,
    /// Only openings and closings
    ThresholdOnly,
}

/// External delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Chat webhook (Discord-style embed)
    Webhook,
    Sms,
    Email,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [ChannelKind::Webhook, ChannelKind::Sms, ChannelKind::Email];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Webhook => "webhook",
            ChannelKind::Sms => "sms",
            ChannelKind::Email => "email",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One enabled channel and where to deliver it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelTarget {
    pub kind: ChannelKind,
    pub destination: String,
}

/// A single delivery method as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub value: String,
}

impl Method {
    pub fn enabled(value: impl Into<String>) -> Self {
        Self {
            enabled: true,
            value: value.into(),
        }
    }
}

/// Stored delivery methods, keyed the way the user-facing app writes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Methods {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord: Option<Method>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<Method>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Method>,
}

impl Methods {
    fn get(&self, kind: ChannelKind) -> Option<&Method> {
        match kind {
            ChannelKind::Webhook => self.discord.as_ref(),
            ChannelKind::Sms => self.phone.as_ref(),
            ChannelKind::Email => self.email.as_ref(),
        }
    }
}

/// Optional topics beyond seat changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topics {
    /// Also notify on instructor changes
    #[serde(default)]
    pub instructors: bool,
}

/// Stored notification settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<NotificationMode>,

    #[serde(default, rename = "notificationModes")]
    pub topics: Topics,
}

/// Raw user preferences as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Methods>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<UserSettings>,
}

/// Validated subscriber preferences for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub user_id: String,
    pub mode: NotificationMode,
    pub channels: Vec<ChannelTarget>,
    pub notify_instructor: bool,
}

impl Subscriber {
    /// Validate a stored record.
    ///
    /// A missing record, methods map, or settings object is an anomaly.
    /// Within a present settings object an unset mode means `All`.
    pub fn from_record(
        user_id: &str,
        record: Option<&UserRecord>,
    ) -> Result<Self, PreferenceAnomaly> {
        let record = record.ok_or(PreferenceAnomaly::MissingRecord)?;
        let methods = record
            .methods
            .as_ref()
            .ok_or(PreferenceAnomaly::MissingMethods)?;
        let settings = record
            .settings
            .as_ref()
            .ok_or(PreferenceAnomaly::MissingSettings)?;

        let mut channels = Vec::new();
        for kind in ChannelKind::ALL {
            let Some(method) = methods.get(kind) else {
                continue;
            };
            if !method.enabled {
                continue;
            }
            let destination = method.value.trim();
            if destination.is_empty() {
                log::warn!("User {user_id} has {kind} enabled without a destination, ignoring");
                continue;
            }
            channels.push(ChannelTarget {
                kind,
                destination: destination.to_string(),
            });
        }

        Ok(Self {
            user_id: user_id.to_string(),
            mode: settings.mode.unwrap_or_default(),
            channels,
            notify_instructor: settings.topics.instructors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record() -> UserRecord {
        UserRecord {
            methods: Some(Methods {
                discord: Some(Method::enabled("https://discord.test/hook")),
                phone: Some(Method {
                    enabled: false,
                    value: "+15550001111".into(),
                }),
                email: Some(Method::enabled("a@b.test")),
            }),
            settings: Some(UserSettings::default()),
        }
    }

    #[test]
    fn test_missing_record_is_anomaly() {
        assert_eq!(
            Subscriber::from_record("u1", None),
            Err(PreferenceAnomaly::MissingRecord)
        );
    }

    #[test]
    fn test_missing_methods_is_anomaly() {
        let record = UserRecord {
            methods: None,
            settings: Some(UserSettings::default()),
        };
        assert_eq!(
            Subscriber::from_record("u1", Some(&record)),
            Err(PreferenceAnomaly::MissingMethods)
        );
    }

    #[test]
    fn test_missing_settings_is_anomaly() {
        let record = UserRecord {
            methods: Some(Methods::default()),
            settings: None,
        };
        assert_eq!(
            Subscriber::from_record("u1", Some(&record)),
            Err(PreferenceAnomaly::MissingSettings)
        );
    }

    #[test]
    fn test_unset_mode_defaults_to_all() {
        let subscriber = Subscriber::from_record("u1", Some(&full_record())).unwrap();
        assert_eq!(subscriber.mode, NotificationMode::All);
        assert!(!subscriber.notify_instructor);
    }

    #[test]
    fn test_only_enabled_channels_kept() {
        let subscriber = Subscriber::from_record("u1", Some(&full_record())).unwrap();
        let kinds: Vec<_> = subscriber.channels.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ChannelKind::Webhook, ChannelKind::Email]);
    }

    #[test]
    fn test_blank_destination_ignored() {
        let mut record = full_record();
        record.methods.as_mut().unwrap().email = Some(Method::enabled("   "));
        let subscriber = Subscriber::from_record("u1", Some(&record)).unwrap();
        assert_eq!(subscriber.channels.len(), 1);
    }

    #[test]
    fn test_parses_stored_json() {
        let json = r#"{
            "methods": {
                "discord": {"enabled": true, "value": "https://discord.test/hook"},
                "phone": {"enabled": true, "value": "+15550001111"}
            },
            "settings": {
                "mode": "threshold-only",
                "notificationModes": {"instructors": true}
            }
        }"#;
        let record: UserRecord = serde_json::from_str(json).unwrap();
        let subscriber = Subscriber::from_record("u1", Some(&record)).unwrap();
        assert_eq!(subscriber.mode, NotificationMode::ThresholdOnly);
        assert!(subscriber.notify_instructor);
        assert_eq!(subscriber.channels.len(), 2);
    }
}
