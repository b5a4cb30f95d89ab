//! Page ↔ worker message protocol.
//!
//! Every request travels in an [`Envelope`] carrying a correlation token, a
//! tag and a JSON payload. The worker answers with a [`ReplyEnvelope`] bearing
//! the same token. Payloads are validated when the worker decodes them.

use crate::types::reminder::Reminder;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TAG_SCHEDULE_NOTIFICATION: &str = "schedule-notification";
pub const TAG_GET_STORED_REMINDERS: &str = "get-stored-reminders";
pub const TAG_CLEAR_STORED_REMINDERS: &str = "clear-stored-reminders";
pub const TAG_MANUAL_SYNC: &str = "manual-sync";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerRequest {
    ScheduleNotification(Reminder),
    GetStoredReminders,
    ClearStoredReminders,
    ManualSync,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub token: u64,
    pub tag: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub token: u64,
    #[serde(flatten)]
    pub reply: Reply,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reply {
    Ok(Value),
    Error(String),
}

impl WorkerRequest {
    pub fn tag(&self) -> &'static str {
        match self {
            WorkerRequest::ScheduleNotification(_) => TAG_SCHEDULE_NOTIFICATION,
            WorkerRequest::GetStoredReminders => TAG_GET_STORED_REMINDERS,
            WorkerRequest::ClearStoredReminders => TAG_CLEAR_STORED_REMINDERS,
            WorkerRequest::ManualSync => TAG_MANUAL_SYNC,
        }
    }

    pub fn to_envelope(&self, token: u64) -> Result<Envelope, serde_json::Error> {
        let payload = match self {
            WorkerRequest::ScheduleNotification(reminder) => serde_json::to_value(reminder)?,
            _ => Value::Null,
        };
        Ok(Envelope {
            token,
            tag: self.tag().to_string(),
            payload,
        })
    }

    /// Decodes an envelope. Unknown tags yield `Ok(None)`.
    pub fn from_envelope(envelope: &Envelope) -> Result<Option<Self>, serde_json::Error> {
        let request = match envelope.tag.as_str() {
            TAG_SCHEDULE_NOTIFICATION => {
                let reminder = Reminder::deserialize(&envelope.payload)?;
                WorkerRequest::ScheduleNotification(reminder)
            }
            TAG_GET_STORED_REMINDERS => WorkerRequest::GetStoredReminders,
            TAG_CLEAR_STORED_REMINDERS => WorkerRequest::ClearStoredReminders,
            TAG_MANUAL_SYNC => WorkerRequest::ManualSync,
            _ => return Ok(None),
        };
        Ok(Some(request))
    }
}

impl Reply {
    pub fn success() -> Self {
        Reply::Ok(serde_json::json!({ "success": true }))
    }
}
