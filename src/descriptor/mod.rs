//! Capabilities descriptor the platform fetches to learn about the add-on.

use serde::{Deserialize, Serialize};

/// Top-level capabilities document.
///
/// Pure data: behaviour for webhooks and glances is registered on the
/// server next to the entry it serves, never stored here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesDescriptor {
    pub name: String,
    pub description: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<Vendor>,
    pub links: Links,
    pub capabilities: Capabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vendor {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Links {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// URL the descriptor itself is served from.
    #[serde(rename = "self")]
    pub self_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hipchat_api_consumer: Option<ApiConsumer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installable: Option<Installable>,
    #[serde(rename = "webhook", default, skip_serializing_if = "Vec::is_empty")]
    pub webhooks: Vec<WebHook>,
    #[serde(rename = "glance", default, skip_serializing_if = "Vec::is_empty")]
    pub glances: Vec<Glance>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiConsumer {
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Image>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Installable {
    pub allow_global: bool,
    pub allow_room: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uninstalled_url: Option<String>,
}

/// Subscription to a room event, delivered to `url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebHook {
    pub event: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl WebHook {
    /// JWT-authenticated webhook for `event` at `url`.
    pub fn new(event: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            url: url.into(),
            authentication: Some("jwt".to_string()),
            key: None,
            name: None,
            pattern: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Glance {
    pub key: String,
    pub name: I18nValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<Image>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i16>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    pub url: String,
    #[serde(rename = "url@2x", skip_serializing_if = "Option::is_none")]
    pub url_2x: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct I18nValue {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub i18n: Option<String>,
}

impl I18nValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            i18n: None,
        }
    }
}

/// Path component of an absolute or relative URL, used for routing.
pub fn url_path(url: &str) -> Option<String> {
    if url.is_empty() {
        return None;
    }
    if url.starts_with('/') {
        return Some(url.split(['?', '#']).next().unwrap_or(url).to_string());
    }
    url::Url::parse(url).ok().map(|parsed| parsed.path().to_string())
}
