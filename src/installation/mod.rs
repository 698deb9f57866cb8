//! Tenant installation records and the platform payloads that create them.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AddonError;
use crate::token::{AccessToken, Clock, TokenIssuer, TokenSlot};

/// A tenant's credentials and API endpoints.
///
/// Clones share the tenant's [`TokenSlot`], so every copy handed out by the
/// store sees (and refreshes) the same cached token. The token itself is
/// never persisted.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationRecord {
    tenant_id: String,
    pub capabilities_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub oauth_secret: String,
    pub token_url: String,
    pub api_url: String,
    #[serde(skip)]
    token: Arc<TokenSlot>,
}

impl InstallationRecord {
    pub fn new(
        tenant_id: impl Into<String>,
        capabilities_url: impl Into<String>,
        oauth_secret: impl Into<String>,
        token_url: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            capabilities_url: capabilities_url.into(),
            room_id: None,
            group_id: None,
            oauth_secret: oauth_secret.into(),
            token_url: token_url.into(),
            api_url: api_url.into(),
            token: Arc::new(TokenSlot::new()),
        }
    }

    pub fn with_room_id(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Stable issuer id; the store's primary key.
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Currently cached token, if any has been issued.
    pub fn cached_token(&self) -> Option<AccessToken> {
        self.token.current()
    }

    /// Valid access token for this tenant, issuing a new one when the cached
    /// token is missing or expired.
    pub async fn access_token(
        &self,
        issuer: &dyn TokenIssuer,
        clock: &dyn Clock,
    ) -> Result<AccessToken, AddonError> {
        self.token.get_or_issue(self, issuer, clock).await
    }

    /// Room id, or a configuration error naming the operation that needed it.
    pub fn require_room_id(&self, operation: &str) -> Result<&str, AddonError> {
        self.room_id.as_deref().ok_or_else(|| {
            AddonError::Config(format!(
                "{operation}: installation {} has no room id",
                self.tenant_id
            ))
        })
    }
}

impl fmt::Debug for InstallationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallationRecord")
            .field("tenant_id", &self.tenant_id)
            .field("capabilities_url", &self.capabilities_url)
            .field("room_id", &self.room_id)
            .field("group_id", &self.group_id)
            .field("oauth_secret", &"..")
            .field("token_url", &self.token_url)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl PartialEq for InstallationRecord {
    fn eq(&self, other: &Self) -> bool {
        self.tenant_id == other.tenant_id
            && self.capabilities_url == other.capabilities_url
            && self.room_id == other.room_id
            && self.group_id == other.group_id
            && self.oauth_secret == other.oauth_secret
            && self.token_url == other.token_url
            && self.api_url == other.api_url
    }
}

impl Eq for InstallationRecord {}

/// Body of the platform's install callback.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallRequest {
    pub oauth_id: String,
    pub capabilities_url: String,
    pub oauth_secret: String,
    #[serde(default, deserialize_with = "optional_id")]
    pub room_id: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub group_id: Option<String>,
}

impl InstallRequest {
    pub fn into_record(self, endpoints: ApiEndpoints) -> InstallationRecord {
        InstallationRecord {
            tenant_id: self.oauth_id,
            capabilities_url: self.capabilities_url,
            room_id: self.room_id,
            group_id: self.group_id,
            oauth_secret: self.oauth_secret,
            token_url: endpoints.token_url,
            api_url: endpoints.api_url,
            token: Arc::new(TokenSlot::new()),
        }
    }
}

/// Endpoints a tenant advertises in its capabilities document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    pub token_url: String,
    pub api_url: String,
}

impl ApiEndpoints {
    /// Read `capabilities.oauth2Provider.tokenUrl` and
    /// `capabilities.hipchatApiProvider.url`.
    pub fn from_capabilities(body: &[u8]) -> Result<Self, AddonError> {
        let doc: CapabilitiesDocument = serde_json::from_slice(body)?;
        let token_url = doc
            .capabilities
            .oauth2_provider
            .map(|p| p.token_url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                AddonError::Decode("capabilities document has no oauth2Provider.tokenUrl".into())
            })?;
        let api_url = doc
            .capabilities
            .api_provider
            .map(|p| p.url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                AddonError::Decode("capabilities document has no hipchatApiProvider.url".into())
            })?;
        Ok(Self { token_url, api_url })
    }
}

#[derive(Debug, Deserialize)]
struct CapabilitiesDocument {
    capabilities: PlatformCapabilities,
}

#[derive(Debug, Deserialize)]
struct PlatformCapabilities {
    #[serde(rename = "oauth2Provider")]
    oauth2_provider: Option<OAuth2Provider>,
    #[serde(rename = "hipchatApiProvider")]
    api_provider: Option<ApiProvider>,
}

#[derive(Debug, Deserialize)]
struct OAuth2Provider {
    #[serde(rename = "tokenUrl")]
    token_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiProvider {
    url: String,
}

/// Body served at an uninstall `installable_url`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallableInfo {
    pub oauth_id: String,
}

/// Room and group ids arrive as JSON numbers or strings.
fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(serde_json::Number),
        Text(String),
    }

    let raw = Option::<RawId>::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawId::Number(n)) => Some(n.to_string()),
        Some(RawId::Text(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}
