use async_trait::async_trait;

use super::AddonRuntime;
use crate::descriptor::{Glance, WebHook};
use crate::error::AddonError;
use crate::installation::{InstallRequest, InstallationRecord};
use crate::notification::GlanceData;

/// Lifecycle callbacks around store changes.
#[async_trait]
pub trait InstallationHooks: Send + Sync {
    /// Runs before anything is fetched or stored. An error aborts the install.
    async fn before_install(&self, _request: &InstallRequest) -> Result<(), AddonError> {
        Ok(())
    }

    /// Runs after the record is stored. Errors are logged, not propagated.
    async fn installed(&self, _record: &InstallationRecord) -> Result<(), AddonError> {
        Ok(())
    }

    /// Runs after the record is deleted. Errors are logged, not propagated.
    async fn uninstalled(&self, _record: &InstallationRecord) -> Result<(), AddonError> {
        Ok(())
    }
}

/// Hooks that accept every change.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl InstallationHooks for NoopHooks {}

/// Handles an authenticated webhook event for one installation.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    async fn handle(
        &self,
        runtime: &AddonRuntime,
        record: &InstallationRecord,
        webhook: &WebHook,
        event: serde_json::Value,
    ) -> Result<(), AddonError>;
}

/// Computes the current content of a glance for one installation.
#[async_trait]
pub trait GlanceProvider: Send + Sync {
    async fn glance_data(
        &self,
        runtime: &AddonRuntime,
        record: &InstallationRecord,
        glance: &Glance,
    ) -> Result<GlanceData, AddonError>;
}
