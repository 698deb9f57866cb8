//! Convenience re-exports for common use.

pub use crate::auth::{RequestAuthenticator, SignedRequest, UnauthorizedReason};
pub use crate::config::AddonConfig;
pub use crate::descriptor::{CapabilitiesDescriptor, Glance, WebHook};
pub use crate::error::{AddonError, Result};
pub use crate::installation::{InstallRequest, InstallationRecord};
pub use crate::notification::{GlanceData, GlanceUpdates, Notification};
pub use crate::runtime::{AddonRuntime, GlanceProvider, InstallationHooks, WebhookHandler};
pub use crate::server::AddonServer;
pub use crate::store::{FileInstallationStore, InstallationStore, MemoryInstallationStore};
pub use crate::token::{AccessToken, Clock, HttpTokenIssuer, TokenIssuer};
