use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::clock::Clock;

/// Seconds shaved off the server-reported lifetime so a token is never
/// served when it could expire mid-request.
pub const DEFAULT_GRACE_SECONDS: i64 = 120;

/// Bearer credential issued by a tenant's token endpoint.
///
/// Immutable once constructed. A refresh produces a new value that replaces
/// the cached one whole.
///
/// # Example
/// ```
/// use snapaddon::token::AccessToken;
///
/// let token = AccessToken::new("abc", "bearer", "send_notification", 1_000);
/// assert!(token.is_valid_at(999));
/// assert!(!token.is_valid_at(1_000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    value: String,
    token_type: String,
    scope: String,
    expires_at: i64,
}

impl AccessToken {
    pub fn new(
        value: impl Into<String>,
        token_type: impl Into<String>,
        scope: impl Into<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            value: value.into(),
            token_type: token_type.into(),
            scope: scope.into(),
            expires_at,
        }
    }

    /// Build a token from a credential-exchange response received at `now`.
    pub fn from_response(response: TokenResponse, now: i64, grace_seconds: i64) -> Self {
        Self {
            value: response.access_token,
            token_type: response.token_type,
            scope: response.scope,
            expires_at: now
                .saturating_add(response.expires_in)
                .saturating_sub(grace_seconds),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Expiry as seconds since the Unix epoch, grace margin already applied.
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn expires_at_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires_at, 0)
    }

    /// Non-empty and strictly before the expiry instant.
    pub fn is_valid_at(&self, now: i64) -> bool {
        !self.value.is_empty() && now < self.expires_at
    }

    pub fn is_valid(&self, clock: &dyn Clock) -> bool {
        self.is_valid_at(clock.now())
    }
}

/// Body of a successful client-credentials exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
    pub expires_in: i64,
}
