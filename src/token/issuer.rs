use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use tracing::debug;

use super::access_token::{AccessToken, TokenResponse, DEFAULT_GRACE_SECONDS};
use super::clock::{Clock, SystemClock};
use crate::error::AddonError;
use crate::installation::InstallationRecord;

/// Scope requested from every tenant token endpoint.
pub const DEFAULT_SCOPE: &str = "send_notification";

/// Exchanges a tenant's credentials for a fresh [`AccessToken`].
///
/// Implementations never retry; the caller owns retry policy.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self, record: &InstallationRecord) -> Result<AccessToken, AddonError>;
}

/// Client-credentials grant against `record.token_url`, authenticated with
/// HTTP Basic `(tenant_id, oauth_secret)`.
///
/// # Example
/// ```no_run
/// use snapaddon::token::HttpTokenIssuer;
///
/// let issuer = HttpTokenIssuer::new(reqwest::Client::new()).with_grace_seconds(60);
/// ```
#[derive(Debug, Clone)]
pub struct HttpTokenIssuer {
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
    grace_seconds: i64,
    scope: String,
}

impl HttpTokenIssuer {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            clock: Arc::new(SystemClock),
            grace_seconds: DEFAULT_GRACE_SECONDS,
            scope: DEFAULT_SCOPE.to_string(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_grace_seconds(mut self, grace_seconds: i64) -> Self {
        self.grace_seconds = grace_seconds;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
    async fn issue(&self, record: &InstallationRecord) -> Result<AccessToken, AddonError> {
        let tenant_id = record.tenant_id();
        debug!(tenant_id, url = %record.token_url, "requesting access token");

        let resp = self
            .client
            .post(&record.token_url)
            .header(ACCEPT, "application/json")
            .basic_auth(tenant_id, Some(&record.oauth_secret))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AddonError::Network(format!("token request for {tenant_id}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AddonError::auth(
                status.as_u16(),
                format!("token endpoint rejected {tenant_id}: {body}"),
            ));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| AddonError::Network(format!("token response for {tenant_id}: {e}")))?;
        let payload: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| AddonError::Decode(format!("token response for {tenant_id}: {e}")))?;
        if payload.access_token.is_empty() {
            return Err(AddonError::Decode(format!(
                "token response for {tenant_id} has an empty access_token"
            )));
        }
        if payload.expires_in < 0 {
            return Err(AddonError::Decode(format!(
                "token response for {tenant_id} has negative expires_in {}",
                payload.expires_in
            )));
        }

        let token = AccessToken::from_response(payload, self.clock.now(), self.grace_seconds);
        debug!(tenant_id, expires_at = token.expires_at(), "access token issued");
        Ok(token)
    }
}
