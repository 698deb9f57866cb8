//! OAuth access-token lifecycle: acquisition, caching, expiry, refresh.

pub mod access_token;
pub mod clock;
pub mod issuer;
pub mod slot;

pub use access_token::{AccessToken, TokenResponse, DEFAULT_GRACE_SECONDS};
pub use clock::{Clock, SystemClock};
pub use issuer::{HttpTokenIssuer, TokenIssuer, DEFAULT_SCOPE};
pub use slot::TokenSlot;
