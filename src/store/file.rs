use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{InstallationMap, InstallationStore};
use crate::error::AddonError;
use crate::installation::InstallationRecord;

const STATE_FILE_VERSION: u32 = 1;

/// Store persisted as a single JSON snapshot.
///
/// Every mutation rewrites the whole snapshot to a temp file beside the
/// target and renames it into place while the writer lock is held, so the
/// durable file is always either the previous or the new snapshot.
///
/// # Example
/// ```no_run
/// use snapaddon::store::{FileInstallationStore, InstallationStore};
///
/// let store = FileInstallationStore::open("/var/lib/snapaddon/state.json")?;
/// println!("{} installations", store.len());
/// # Ok::<(), snapaddon::error::AddonError>(())
/// ```
#[derive(Debug)]
pub struct FileInstallationStore {
    path: PathBuf,
    installations: RwLock<InstallationMap>,
}

impl FileInstallationStore {
    /// Load the snapshot at `path`.
    ///
    /// A missing or zero-length file is an empty store. Anything else that
    /// cannot be decoded fails with [`AddonError::PersistenceFatal`].
    /// Temp files left behind by an interrupted write are removed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AddonError> {
        let path = path.into();
        remove_stale_temp_files(&path);
        let installations = read_snapshot(&path)?;
        info!(
            path = %path.display(),
            installations = installations.len(),
            "loaded installation state"
        );
        Ok(Self {
            path,
            installations: RwLock::new(installations),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InstallationStore for FileInstallationStore {
    fn add(&self, record: InstallationRecord) -> Result<(), AddonError> {
        let mut installations = self
            .installations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let tenant_id = record.tenant_id().to_string();
        let previous = installations.insert(tenant_id.clone(), record);
        if let Err(err) = write_snapshot(&self.path, &installations) {
            match previous {
                Some(previous) => installations.insert(tenant_id, previous),
                None => installations.remove(&tenant_id),
            };
            return Err(err);
        }
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
        let mut installations = self
            .installations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(removed) = installations.remove(tenant_id) else {
            return Ok(None);
        };
        if let Err(err) = write_snapshot(&self.path, &installations) {
            installations.insert(tenant_id.to_string(), removed);
            return Err(err);
        }
        Ok(Some(removed))
    }

    fn len(&self) -> usize {
        self.installations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct StateFile {
    version: u32,
    saved_at: DateTime<Utc>,
    installations: InstallationMap,
}

fn read_snapshot(path: &Path) -> Result<InstallationMap, AddonError> {
    let raw = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(InstallationMap::new())
        }
        Err(err) => {
            return Err(AddonError::PersistenceFatal(format!(
                "cannot read {}: {err}",
                path.display()
            )))
        }
    };
    if raw.is_empty() {
        return Ok(InstallationMap::new());
    }

    let state: StateFile = serde_json::from_slice(&raw).map_err(|err| {
        AddonError::PersistenceFatal(format!("corrupt state file {}: {err}", path.display()))
    })?;
    if state.version != STATE_FILE_VERSION {
        return Err(AddonError::PersistenceFatal(format!(
            "unsupported state file version {} at {}",
            state.version,
            path.display()
        )));
    }
    if let Some((key, record)) = state
        .installations
        .iter()
        .find(|(key, record)| key.as_str() != record.tenant_id())
    {
        return Err(AddonError::PersistenceFatal(format!(
            "state file {} maps key {key} to tenant {}",
            path.display(),
            record.tenant_id()
        )));
    }
    Ok(state.installations)
}

fn write_snapshot(path: &Path, installations: &InstallationMap) -> Result<(), AddonError> {
    let state = StateFile {
        version: STATE_FILE_VERSION,
        saved_at: Utc::now(),
        installations: installations.clone(),
    };
    let serialized = serde_json::to_vec_pretty(&state)
        .map_err(|err| AddonError::Persistence(format!("encode state: {err}")))?;
    let temp_path = write_temp(path, &serialized)?;
    commit_temp(&temp_path, path)?;
    debug!(path = %path.display(), installations = installations.len(), "state saved");
    Ok(())
}

fn temp_prefix(path: &Path) -> Result<String, AddonError> {
    let file_name = path.file_name().ok_or_else(|| {
        AddonError::Persistence(format!("state path {} has no file name", path.display()))
    })?;
    Ok(format!(".{}.tmp-", file_name.to_string_lossy()))
}

/// First phase: the full snapshot lands in a fresh temp file next to `path`.
fn write_temp(path: &Path, data: &[u8]) -> Result<PathBuf, AddonError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_name = format!("{}{}-{nonce}", temp_prefix(path)?, std::process::id());
    let temp_path = path.with_file_name(temp_name);

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(AddonError::Persistence(format!(
            "write {}: {err}",
            temp_path.display()
        )));
    }
    Ok(temp_path)
}

/// Second phase: atomically replace the durable file.
fn commit_temp(temp_path: &Path, path: &Path) -> Result<(), AddonError> {
    if let Err(err) = fs::rename(temp_path, path) {
        let _ = fs::remove_file(temp_path);
        return Err(AddonError::Persistence(format!(
            "rename into {}: {err}",
            path.display()
        )));
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}

fn remove_stale_temp_files(path: &Path) {
    let Ok(prefix) = temp_prefix(path) else {
        return;
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(&prefix) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => debug!(path = %entry.path().display(), "removed leftover state temp file"),
            Err(err) => warn!(path = %entry.path().display(), error = %err, "cannot remove leftover state temp file"),
        }
    }
}
