//! Signed-request authentication for inbound platform callbacks.

pub mod authenticator;
pub mod signed_request;

pub use authenticator::RequestAuthenticator;
pub use signed_request::{SignedRequest, SIGNED_REQUEST_PARAM};

use strum::{Display, IntoStaticStr};

/// Why an inbound request was rejected.
///
/// Only logged; every reason produces the same 401 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum UnauthorizedReason {
    /// No bearer/JWT header and no `signed_request` parameter.
    MissingToken,
    /// Not a three-part JWT, undecodable claims, or missing required claims.
    Malformed,
    /// Claims carry no `iss`.
    MissingIssuer,
    /// `iss` names a tenant that is not installed.
    UnknownTenant,
    /// The installation has no shared secret to verify against.
    EmptySecret,
    /// `exp` has passed or `nbf` is still in the future.
    Expired,
    /// Signature does not match the tenant's secret.
    BadSignature,
}
