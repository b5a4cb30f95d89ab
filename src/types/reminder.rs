use crate::error::InvalidReminder;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

/// A schedulable reminder as exchanged between the page, the worker and the server.
///
/// `date` and `time` stay in their wire form and are combined into an absolute
/// instant only when the reminder is scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub date: String,
    pub time: String,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub notification: NotificationSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub time_before: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_kind() -> String {
    "push".to_string()
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            kind: default_kind(),
            time_before: 0,
        }
    }
}

impl Reminder {
    pub fn new(
        title: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: None,
            date: date.into(),
            time: time.into(),
            entity_type: entity_type.into(),
            entity_id: None,
            notification: NotificationSettings::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Returns the identifier, assigning `<unix millis>-<sequence>` if none is set.
    ///
    /// The sequence is process-wide, so reminders created within the same
    /// millisecond still get distinct ids.
    pub fn ensure_id(&mut self, now: OffsetDateTime) -> &str {
        static SEQUENCE: AtomicU64 = AtomicU64::new(1);

        let missing = self.id.as_deref().is_none_or(|id| id.trim().is_empty());
        if missing {
            let millis = now.unix_timestamp_nanos() / 1_000_000;
            let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
            self.id = Some(format!("{millis}-{sequence}"));
        }
        self.id.as_deref().unwrap_or_default()
    }

    /// Combines the date and time fields into one instant, read in `offset`.
    pub fn fire_at(&self, offset: UtcOffset) -> Result<OffsetDateTime, InvalidReminder> {
        let date = parse_date(&self.date)?;
        let time = parse_time(&self.time)?;
        Ok(PrimitiveDateTime::new(date, time).assume_offset(offset))
    }

    pub fn validate(&self) -> Result<(), InvalidReminder> {
        if self.title.trim().is_empty() {
            return Err(InvalidReminder::EmptyTitle);
        }
        parse_date(&self.date)?;
        parse_time(&self.time)?;
        Ok(())
    }

    pub fn body<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self.description.as_deref().map(str::trim) {
            Some(description) if !description.is_empty() => description,
            _ => fallback,
        }
    }
}

fn parse_date(raw: &str) -> Result<Date, InvalidReminder> {
    let raw = raw.trim();
    // Server records may carry a full timestamp in the date field.
    if raw.contains('T')
        && let Ok(at) = OffsetDateTime::parse(raw, &Rfc3339)
    {
        return Ok(at.date());
    }
    let date_part = raw.split_once('T').map_or(raw, |(date, _)| date);
    Date::parse(date_part, format_description!("[year]-[month]-[day]"))
        .map_err(|_| InvalidReminder::Date(raw.to_string()))
}

fn parse_time(raw: &str) -> Result<Time, InvalidReminder> {
    let raw = raw.trim();
    Time::parse(raw, format_description!("[hour]:[minute]"))
        .or_else(|_| Time::parse(raw, format_description!("[hour]:[minute]:[second]")))
        .map_err(|_| InvalidReminder::Time(raw.to_string()))
}

/// Query parameters for `GET /reminders`; filtering applies only when both are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl ReminderFilter {
    pub fn entity(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: Some(entity_type.into()),
            entity_id: Some(entity_id.into()),
        }
    }

    pub fn matches(&self, reminder: &Reminder) -> bool {
        match (self.entity_type.as_deref(), self.entity_id.as_deref()) {
            (Some(entity_type), Some(entity_id)) => {
                reminder.entity_type == entity_type
                    && reminder.entity_id.as_deref() == Some(entity_id)
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReminderResponse {
    pub success: bool,
    pub reminder: Reminder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderList {
    pub reminders: Vec<Reminder>,
}
