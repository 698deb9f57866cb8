//! Outbound room notification and glance payloads.

use std::collections::HashMap;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Room notification body.
///
/// # Example
/// ```
/// use snapaddon::notification::{Notification, MessageFormat};
///
/// let notification = Notification::builder()
///     .message("@acme You're a queryf.")
///     .message_format(MessageFormat::Text)
///     .notify(true)
///     .build();
/// ```
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    #[builder(into)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_format: Option<MessageFormat>,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub notify: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    /// Platform card payload, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<serde_json::Value>,
}

impl Notification {
    pub fn text(message: impl Into<String>) -> Self {
        Self::builder()
            .message(message)
            .message_format(MessageFormat::Text)
            .build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageFormat {
    Text,
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Color {
    Yellow,
    Green,
    Red,
    Purple,
    Gray,
    Random,
}

/// Batch of glance updates pushed to a room.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GlanceUpdates {
    #[serde(rename = "glance")]
    pub updates: Vec<GlanceUpdate>,
}

impl GlanceUpdates {
    pub fn single(key: impl Into<String>, content: GlanceData) -> Self {
        Self {
            updates: vec![GlanceUpdate {
                key: key.into(),
                content,
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlanceUpdate {
    pub content: GlanceData,
    pub key: String,
}

/// What a glance displays: label, status lozenge or icon, custom metadata.
#[derive(Debug, Clone, Default, Builder, Serialize, Deserialize, PartialEq)]
pub struct GlanceData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<GlanceLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<GlanceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<GlanceMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlanceLabel {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl GlanceLabel {
    pub fn html(value: impl Into<String>) -> Self {
        Self {
            kind: "html".to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlanceStatus {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: GlanceStatusValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GlanceStatusValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "url@2x", skip_serializing_if = "Option::is_none")]
    pub url_2x: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GlanceMetadata {
    #[serde(rename = "customData")]
    pub custom_data: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn notification_omits_unset_fields() {
        let value = serde_json::to_value(Notification::text("hi")).unwrap();
        assert_eq!(value, json!({"message": "hi", "message_format": "text"}));
    }

    #[test]
    fn notification_serializes_notify_and_color() {
        let notification = Notification::builder()
            .message("hi")
            .notify(true)
            .color(Color::Purple)
            .build();
        let value = serde_json::to_value(notification).unwrap();
        assert_eq!(value, json!({"message": "hi", "notify": true, "color": "purple"}));
    }

    #[test]
    fn glance_updates_use_platform_field_names() {
        let updates = GlanceUpdates::single(
            "snap.glance",
            GlanceData::builder().label(GlanceLabel::html("<b>3</b> snaps")).build(),
        );
        let value = serde_json::to_value(updates).unwrap();
        assert_eq!(
            value,
            json!({"glance": [{"key": "snap.glance", "content": {"label": {"type": "html", "value": "<b>3</b> snaps"}}}]})
        );
    }
}
