//! Presentation of notifications.
//!
//! Classification stays a plain `Category`; everything human-facing
//! (emoji, wording, embeds) is derived here.

use serde_json::{Value, json};

use crate::models::{Category, FeedEntry, FieldChange, FieldDelta, SectionInfo};

const EMBED_COLOR: u32 = 0x09adef;
const EMBED_USERNAME: &str = "AggieSeek";
const ERROR_COLOR: u32 = 0xe74c3c;

/// Everything a channel needs to render one change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub section: SectionInfo,
    /// Instructor as of this run, shown alongside seat changes
    pub instructor: Option<String>,
    pub change: FieldChange,
    pub category: Option<Category>,
}

impl Notification {
    /// Short keyword describing the change, e.g. `opened`.
    pub fn keyword(&self) -> &'static str {
        match self.category {
            Some(category) => badge(category).1,
            None => "changed",
        }
    }

    /// Course label, CRN and instructor, e.g. `CSCE 121 - 12345 - Smith`.
    pub fn headline(&self) -> String {
        let mut parts = vec![self.section.course(), self.section.crn.clone()];
        if let Some(instructor) = &self.instructor {
            parts.push(instructor.clone());
        }
        parts.join(" - ")
    }
}

/// Emoji and keyword for a seat category.
pub fn badge(category: Category) -> (&'static str, &'static str) {
    match category {
        Category::Opened => ("✅", "opened"),
        Category::Closed => ("❌", "closed"),
        Category::Decreased => ("📉", "decreased"),
        Category::Increased => ("📈", "increased"),
        Category::Unchanged => ("‼️", "changed"),
    }
}

/// Plain text body for SMS.
pub fn text_message(n: &Notification) -> String {
    let section = &n.section;
    let course = section.course();
    match &n.change.delta {
        FieldDelta::SeatsRemaining { previous, current } => {
            let (emoji, keyword) = n.category.map(badge).unwrap_or(("‼️", "changed"));
            let instructor = n.instructor.as_deref().unwrap_or("Seats");
            format!(
                "{emoji} {course} / {} / {}\n{instructor} {keyword}!\n{previous} -> {current}",
                section.title, section.crn
            )
        }
        FieldDelta::Instructor { previous, current } => format!(
            "{course} / {} / {}\nInstructor has changed!\n{previous} -> {current}",
            section.title, section.crn
        ),
    }
}

/// Subject and body for email.
pub fn email_message(n: &Notification) -> (String, String) {
    let subject = match &n.change.delta {
        FieldDelta::SeatsRemaining { .. } => {
            format!("{}: seats {}", n.section.course(), n.keyword())
        }
        FieldDelta::Instructor { .. } => format!("{}: instructor changed", n.section.course()),
    };
    (subject, text_message(n))
}

/// Discord-style webhook payload.
pub fn webhook_embed(n: &Notification) -> Value {
    let description = match &n.change.delta {
        FieldDelta::SeatsRemaining { .. } => {
            let (emoji, keyword) = n.category.map(badge).unwrap_or(("‼️", "changed"));
            format!(
                "{emoji} **SEATS {}** {emoji}",
                keyword.to_uppercase()
            )
        }
        FieldDelta::Instructor { .. } => "**INSTRUCTOR CHANGED**".to_string(),
    };

    json!({
        "username": EMBED_USERNAME,
        "embeds": [{
            "color": EMBED_COLOR,
            "title": n.headline(),
            "description": description,
            "fields": [
                { "name": "Previous", "value": n.change.delta.previous_text(), "inline": true },
                { "name": "Current", "value": n.change.delta.current_text(), "inline": true }
            ],
            "footer": { "text": n.section.title },
            "timestamp": n.change.observed_at.to_rfc3339()
        }]
    })
}

/// In-app feed entry for a subscriber.
pub fn feed_entry(n: &Notification) -> FeedEntry {
    let (message, previous, current) = match &n.change.delta {
        FieldDelta::SeatsRemaining { previous, current } => (
            format!("Seats {}", n.keyword()),
            Value::from(*previous),
            Value::from(*current),
        ),
        FieldDelta::Instructor { previous, current } => (
            "Instructor changed".to_string(),
            Value::from(previous.as_str()),
            Value::from(current.as_str()),
        ),
    };
    FeedEntry {
        title: n.section.course(),
        timestamp: n.change.observed_at,
        crn: n.section.crn.clone(),
        message,
        previous,
        current,
    }
}

/// Console webhook payload describing a failed run.
pub fn error_embed(term: &str, error: &str) -> Value {
    json!({
        "username": EMBED_USERNAME,
        "embeds": [{
            "color": ERROR_COLOR,
            "title": format!("Run failed for term {term}"),
            "description": format!("```{error}```"),
            "timestamp": chrono::Utc::now().to_rfc3339()
        }]
    })
}
