//! File-backed record store.
//!
//! # Storage layout
//!
//! ```text
//! <root>/                      (default: ~/.ensemble/store)
//!   <aggregate>/
//!     <slot>/
//!       <id>.json              (one document per record: mode 0600)
//! ```
//!
//! Ids are allocated per slot as `max(existing) + 1`, starting at 1.
//! Writes go to a `.json.tmp` sibling first and are then renamed over the
//! target, so a crashed write never leaves a truncated record behind.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use ensemble_core::{Attributes, SlotName};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};

/// On-disk record document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: u64,
    pub slot: SlotName,
    pub attributes: Attributes,
    /// `<reference>_id` → id of the referenced record, `None` if it was
    /// unsaved when this one was written.
    #[serde(default)]
    pub links: BTreeMap<String, Option<u64>>,
    pub saved_at: DateTime<Utc>,
}

/// Root directory holding records of every aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<home>/.ensemble/store`
    pub fn at_home(home: &Path) -> Self {
        Self::new(home.join(".ensemble").join("store"))
    }

    /// Store under the user's home directory (uses `dirs::home_dir()`).
    pub fn open_default() -> Result<Self, StoreError> {
        dirs::home_dir()
            .map(|home| Self::at_home(&home))
            .ok_or(StoreError::HomeNotFound)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<aggregate>/<slot>/`: pure, no I/O.
    ///
    /// Both names must be single path components (see [`is_path_component`]),
    /// so the result always lies under the root.
    pub fn slot_dir(&self, aggregate: &str, slot: &SlotName) -> Result<PathBuf, StoreError> {
        for name in [aggregate, slot.as_str()] {
            if !is_path_component(name) {
                return Err(StoreError::InvalidName {
                    name: name.to_owned(),
                });
            }
        }
        Ok(self.root.join(aggregate).join(slot.as_str()))
    }

    /// `<root>/<aggregate>/<slot>/<id>.json`: pure, no I/O.
    pub fn record_path(
        &self,
        aggregate: &str,
        slot: &SlotName,
        id: u64,
    ) -> Result<PathBuf, StoreError> {
        Ok(self.slot_dir(aggregate, slot)?.join(format!("{id}.json")))
    }

    /// Ids of all records stored for `slot`, sorted ascending.
    pub fn list(&self, aggregate: &str, slot: &SlotName) -> Result<Vec<u64>, StoreError> {
        let dir = self.slot_dir(aggregate, slot)?;
        if !dir.exists() {
            return Ok(vec![]);
        }
        let mut ids: Vec<u64> = std::fs::read_dir(&dir)
            .map_err(|e| io_err(&dir, e))?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.strip_suffix(".json")?.parse::<u64>().ok()
            })
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    pub fn next_id(&self, aggregate: &str, slot: &SlotName) -> Result<u64, StoreError> {
        let last = self.list(aggregate, slot)?.last().copied().unwrap_or(0);
        Ok(last + 1)
    }

    /// Atomically write `record`, replacing any previous version.
    ///
    /// Write flow: serialize → `.json.tmp` sibling → `chmod 0600` → `rename`.
    pub fn write(&self, aggregate: &str, record: &StoredRecord) -> Result<PathBuf, StoreError> {
        let dir = self.slot_dir(aggregate, &record.slot)?;
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
            set_dir_permissions(&dir)?;
        }

        let path = self.record_path(aggregate, &record.slot, record.id)?;
        let tmp = path.with_file_name(format!("{}.json.tmp", record.id));
        let json = serde_json::to_string_pretty(record).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;

        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        set_file_permissions(&tmp)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&path, e));
        }

        tracing::debug!(path = %path.display(), "wrote record");
        Ok(path)
    }

    /// Load a single record.
    ///
    /// Returns `StoreError::NotFound` if absent, `StoreError::Json` if the
    /// document is malformed.
    pub fn load(&self, aggregate: &str, slot: &SlotName, id: u64) -> Result<StoredRecord, StoreError> {
        let path = self.record_path(aggregate, slot, id)?;
        if !path.exists() {
            return Err(StoreError::NotFound { path });
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        serde_json::from_str(&contents).map_err(|source| StoreError::Json { path, source })
    }
}

/// True when `name` is exactly one normal path component: non-empty, not
/// `.` or `..`, no separator, no root or drive prefix.
pub fn is_path_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(first)), None) if first == name
    )
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
