use serde::{Deserialize, Serialize};

pub const ACTION_OPEN: &str = "open";
pub const ACTION_CLOSE: &str = "close";

/// A system notification as handed to the host for display.
///
/// Push messages deserialize straight into this shape, so every field except
/// the title is optional on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vibrate: Vec<u32>,
    #[serde(default)]
    pub data: NotificationData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<NotificationAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

impl NotificationAction {
    pub fn new(action: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            title: title.into(),
        }
    }
}

impl NotificationPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon: None,
            badge: None,
            tag: None,
            vibrate: Vec::new(),
            data: NotificationData::default(),
            actions: Vec::new(),
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn notification_payload__should_accept_minimal_push_descriptor() {
        // Given
        let json = r#"{"title":"Invoice due","data":{"url":"/Finances"}}"#;

        // When
        let payload: NotificationPayload = serde_json::from_str(json).expect("deserialize");

        // Then
        assert_eq!(payload.title, "Invoice due");
        assert_eq!(payload.body, "");
        assert_eq!(payload.data.url.as_deref(), Some("/Finances"));
        assert!(payload.actions.is_empty());
    }

    #[test]
    fn notification_payload__should_serialize_camel_case_data() {
        // Given
        let mut payload = NotificationPayload::new("Pay rent", "Reminder!");
        payload.data.entity_type = Some("todo".to_string());
        payload.data.entity_id = Some("t1".to_string());

        // When
        let value = serde_json::to_value(&payload).expect("serialize");

        // Then
        assert_eq!(value["data"]["entityType"], "todo");
        assert_eq!(value["data"]["entityId"], "t1");
        assert!(value.get("vibrate").is_none());
    }
}
