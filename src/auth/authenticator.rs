use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::info;

use super::signed_request::SignedRequest;
use super::UnauthorizedReason;
use crate::error::AddonError;
use crate::installation::InstallationRecord;
use crate::store::InstallationStore;

/// Verifies that an inbound request was signed by an installed tenant.
///
/// This is the only gate in front of webhook and glance handlers; nothing
/// downstream re-checks the token.
#[derive(Clone)]
pub struct RequestAuthenticator {
    store: Arc<dyn InstallationStore>,
    leeway_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct IssuerClaim {
    iss: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifiedClaims {
    iss: String,
}

impl RequestAuthenticator {
    pub fn new(store: Arc<dyn InstallationStore>) -> Self {
        Self {
            store,
            leeway_seconds: 0,
        }
    }

    /// Clock skew tolerated on `exp`/`nbf`.
    pub fn with_leeway_seconds(mut self, leeway_seconds: u64) -> Self {
        self.leeway_seconds = leeway_seconds;
        self
    }

    /// Resolve the tenant that signed `request`.
    ///
    /// Every failure is [`AddonError::Unauthorized`]; the reason is logged
    /// here and carried on the error for observability only.
    pub fn authenticate(
        &self,
        request: &SignedRequest<'_>,
    ) -> Result<InstallationRecord, AddonError> {
        self.verify(request).map_err(|reason| {
            info!(reason = %reason, "rejected signed request");
            AddonError::Unauthorized(reason)
        })
    }

    fn verify(&self, request: &SignedRequest<'_>) -> Result<InstallationRecord, UnauthorizedReason> {
        let token = request.token().ok_or(UnauthorizedReason::MissingToken)?;
        let tenant_id = unverified_issuer(&token)?;
        let record = self
            .store
            .get(&tenant_id)
            .ok_or(UnauthorizedReason::UnknownTenant)?;
        if record.oauth_secret.is_empty() {
            return Err(UnauthorizedReason::EmptySecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.validate_aud = false;
        validation.validate_nbf = true;
        validation.leeway = self.leeway_seconds;

        let key = DecodingKey::from_secret(record.oauth_secret.as_bytes());
        let verified = decode::<VerifiedClaims>(&token, &key, &validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => {
                    UnauthorizedReason::Expired
                }
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    UnauthorizedReason::BadSignature
                }
                _ => UnauthorizedReason::Malformed,
            }
        })?;
        if verified.claims.iss != tenant_id {
            return Err(UnauthorizedReason::Malformed);
        }

        Ok(record)
    }
}

/// Read `iss` from the claim set without trusting it.
fn unverified_issuer(token: &str) -> Result<String, UnauthorizedReason> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(UnauthorizedReason::Malformed);
    };
    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| UnauthorizedReason::Malformed)?;
    let claims: IssuerClaim =
        serde_json::from_slice(&decoded).map_err(|_| UnauthorizedReason::Malformed)?;
    claims
        .iss
        .filter(|iss| !iss.is_empty())
        .ok_or(UnauthorizedReason::MissingIssuer)
}
