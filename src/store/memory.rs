use std::sync::{PoisonError, RwLock};

use super::{InstallationMap, InstallationStore};
use crate::error::AddonError;
use crate::installation::InstallationRecord;

/// Process-local store without persistence.
#[derive(Debug, Default)]
pub struct MemoryInstallationStore {
    installations: RwLock<InstallationMap>,
}

impl MemoryInstallationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InstallationStore for MemoryInstallationStore {
    fn add(&self, record: InstallationRecord) -> Result<(), AddonError> {
        self.installations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.tenant_id().to_string(), record);
        Ok(())
    }

    fn get(&self, tenant_id: &str) -> Option<InstallationRecord> {
        self.installations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tenant_id)
            .cloned()
    }

    fn get_all(&self) -> InstallationMap {
        self.installations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn delete(&self, tenant_id: &str) -> Result<Option<InstallationRecord>, AddonError> {
        Ok(self
            .installations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(tenant_id))
    }

    fn len(&self) -> usize {
        self.installations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
