//! Keyed registry of tenant installations.

pub mod file;
pub mod memory;

pub use file::FileInstallationStore;
pub use memory::MemoryInstallationStore;

use std::collections::BTreeMap;

use crate::error::AddonError;
use crate::installation::InstallationRecord;

/// Snapshot of every installation, keyed by tenant id.
pub type InstallationMap = BTreeMap<String, InstallationRecord>;

/// Storage abstraction for installation records.
///
/// Implementations are shared across request workers: reads run
/// concurrently, `add`/`delete` are exclusive. Callers only ever receive
/// copies of records.
///
/// Methods are synchronous and may block on I/O. Async callers should run
/// mutations through `tokio::task::spawn_blocking`, as
/// [`AddonRuntime`](crate::runtime::AddonRuntime) does.
pub trait InstallationStore: Send + Sync {
    /// Insert or replace the record keyed by its tenant id.
    fn add(&self, record: InstallationRecord) -> Result<(), AddonError>;

    fn get(&self, tenant_id: &str) -> Option<InstallationRecord>;

    /// Copy of the whole registry; mutating it does not touch the store.
    fn get_all(&self) -> InstallationMap;

    /// Remove a record, returning it. Unknown tenants are a no-op.
    fn delete(&self, tenant_id: &str) -> Result<Option<InstallationRecord>, AddonError>;

    fn len(&self) -> usize {
        self.get_all().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
