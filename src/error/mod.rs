//! Error types for the add-on runtime.

use thiserror::Error;

use crate::auth::UnauthorizedReason;

/// Primary error type for all add-on operations.
#[derive(Error, Debug)]
pub enum AddonError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Credential exchange rejected (status {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    /// Inbound request failed authentication. The reason is kept for logging
    /// only; `Display` is identical for every reason.
    #[error("Unauthorized")]
    Unauthorized(UnauthorizedReason),

    #[error("Installation not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Installation state unreadable: {0}")]
    PersistenceFatal(String),

    #[error("Install rejected: {0}")]
    Rejected(String),
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Authentication,
    Serialization,
    Unauthorized,
    NotFound,
    Configuration,
    Storage,
    Rejected,
}

impl AddonError {
    pub fn auth(status: u16, message: impl Into<String>) -> Self {
        Self::Auth {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network(_) => ErrorCategory::Network,
            Self::Auth { .. } => ErrorCategory::Authentication,
            Self::Decode(_) => ErrorCategory::Serialization,
            Self::Unauthorized(_) => ErrorCategory::Unauthorized,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Persistence(_) | Self::PersistenceFatal(_) => ErrorCategory::Storage,
            Self::Rejected(_) => ErrorCategory::Rejected,
        }
    }

    /// Whether the caller may reasonably retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Network)
    }

    /// HTTP status the add-on server answers with when this error ends a request.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 401,
            Self::NotFound(_) => 404,
            Self::Decode(_) | Self::Config(_) => 400,
            _ => 500,
        }
    }

    /// The authentication failure reason, if this is an `Unauthorized` error.
    pub fn unauthorized_reason(&self) -> Option<UnauthorizedReason> {
        match self {
            Self::Unauthorized(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AddonError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return Self::Decode(error.to_string());
        }
        Self::Network(error.to_string())
    }
}

impl From<serde_json::Error> for AddonError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(error.to_string())
    }
}

impl From<std::io::Error> for AddonError {
    fn from(error: std::io::Error) -> Self {
        Self::Persistence(error.to_string())
    }
}

impl From<UnauthorizedReason> for AddonError {
    fn from(reason: UnauthorizedReason) -> Self {
        Self::Unauthorized(reason)
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AddonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_display_does_not_leak_reason() {
        let unknown = AddonError::Unauthorized(UnauthorizedReason::UnknownTenant);
        let bad_sig = AddonError::Unauthorized(UnauthorizedReason::BadSignature);
        assert_eq!(unknown.to_string(), bad_sig.to_string());
        assert_eq!(unknown.status_code(), 401);
        assert_eq!(
            unknown.unauthorized_reason(),
            Some(UnauthorizedReason::UnknownTenant)
        );
    }

    #[test]
    fn only_network_errors_are_retryable() {
        assert!(AddonError::Network("reset".to_string()).is_retryable());
        assert!(!AddonError::auth(401, "bad secret").is_retryable());
        assert!(!AddonError::Decode("eof".to_string()).is_retryable());
        assert!(!AddonError::Config("no room".to_string()).is_retryable());
    }

    #[test]
    fn serde_errors_map_to_decode() {
        let err: AddonError = serde_json::from_str::<serde_json::Value>("{nope")
            .unwrap_err()
            .into();
        assert_eq!(err.category(), ErrorCategory::Serialization);
    }
}
