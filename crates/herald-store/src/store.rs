//! File-backed persistence for cursors, projection state, and configuration.
//!
//! Values are JSON documents replaced whole on every write. Cursor entries
//! for all projections of a tenant share one index file, `state/cursors.json`.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use herald_types::{normalize_domain, to_rfc3339};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Cursor position meaning "start of the log". Returned for projections that
/// have never synced.
pub const CURSOR_START: &str = "";

const STATE_DIR: &str = "state";
const CONFIG_DIR: &str = "config";
const CURSOR_INDEX: &str = "cursors";

/// The persisted position of one projection in the remote log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorEntry {
    /// Opaque position of the last consumed event.
    pub position: String,
    /// When the projection last completed a sync (RFC 3339).
    pub last_updated: String,
}

/// Handle on one tenant's state and config directories.
///
/// Opening a store performs no I/O; directories are created on first write.
#[derive(Debug, Clone)]
pub struct Store {
    tenant: String,
    root: PathBuf,
}

impl Store {
    /// Opens the store for `discovery_domain` under `data_dir`.
    ///
    /// The domain is normalized, so `https://Discover.Example/` and
    /// `discover.example` share one store.
    pub fn open(data_dir: impl AsRef<Path>, discovery_domain: &str) -> Self {
        let tenant = tenant_dir_name(discovery_domain);
        let root = data_dir.as_ref().join(&tenant);
        Self { tenant, root }
    }

    /// The directory name this tenant's data lives under.
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join(CONFIG_DIR)
    }

    // ── Cursors ──────────────────────────────────────────────────────

    /// Returns the last consumed position for `name`, or [`CURSOR_START`].
    ///
    /// # Errors
    ///
    /// Returns `StoreError` only if the cursor index exists but cannot be
    /// read or parsed.
    pub fn get_cursor(&self, name: &str) -> Result<String, StoreError> {
        Ok(self
            .cursor_entry(name)?
            .map(|entry| entry.position)
            .unwrap_or_else(|| CURSOR_START.to_string()))
    }

    /// Returns the full cursor entry for `name`, if one was ever written.
    pub fn cursor_entry(&self, name: &str) -> Result<Option<CursorEntry>, StoreError> {
        Ok(self.cursors()?.remove(name))
    }

    /// Returns every cursor entry for this tenant.
    pub fn cursors(&self) -> Result<BTreeMap<String, CursorEntry>, StoreError> {
        read_json_or_default(&self.state_path(CURSOR_INDEX))
    }

    /// Records `position` for `name` and stamps `last_updated` with now.
    ///
    /// Positions never move backwards: if `position` is empty, or both
    /// positions are numeric and `position` is lower, the stored position is
    /// kept and only the timestamp advances.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the cursor index cannot be read or written.
    pub fn set_cursor(&self, name: &str, position: &str) -> Result<CursorEntry, StoreError> {
        let mut cursors = self.cursors()?;

        let next_position = match cursors.get(name) {
            Some(existing) if !moves_forward(&existing.position, position) => {
                if existing.position != position {
                    tracing::debug!(
                        cursor = name,
                        stored = %existing.position,
                        offered = %position,
                        "ignoring cursor regression"
                    );
                }
                existing.position.clone()
            }
            _ => position.to_string(),
        };

        let entry = CursorEntry {
            position: next_position,
            last_updated: to_rfc3339(chrono::Utc::now()),
        };
        cursors.insert(name.to_string(), entry.clone());
        write_json(&self.state_path(CURSOR_INDEX), &cursors)?;

        Ok(entry)
    }

    // ── Projection state ─────────────────────────────────────────────

    /// Loads the materialized value of `name`, or `T::default()` if none
    /// was ever saved.
    pub fn load_state<T>(&self, name: &str) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Default,
    {
        read_json_or_default(&self.state_path(name))
    }

    /// Replaces the materialized value of `name`.
    pub fn save_state<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        write_json(&self.state_path(name), value)
    }

    /// Removes all derived state (cursors included). Configuration is kept.
    pub fn reset_state(&self) -> Result<(), StoreError> {
        let dir = self.state_dir();
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::info!(tenant = %self.tenant, "reset derived state");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(dir, e)),
        }
    }

    // ── Configuration ────────────────────────────────────────────────

    /// Loads the user-authored config `name`, defaulting when absent.
    ///
    /// The default is returned, not written; config is persisted only by
    /// [`Store::save_config`].
    pub fn load_config<T>(&self, name: &str) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Default,
    {
        read_json_or_default(&self.config_path(name))
    }

    /// Persists the user-authored config `name`.
    pub fn save_config<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        write_json(&self.config_path(name), value)
    }

    fn state_path(&self, name: &str) -> PathBuf {
        self.state_dir().join(format!("{name}.json"))
    }

    fn config_path(&self, name: &str) -> PathBuf {
        self.config_dir().join(format!("{name}.json"))
    }
}

/// Lists the tenants (discovery-service directories) under `data_dir`.
///
/// A missing `data_dir` yields an empty list.
pub fn list_tenants(data_dir: impl AsRef<Path>) -> Result<Vec<String>, StoreError> {
    let data_dir = data_dir.as_ref();
    let entries = match fs::read_dir(data_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(data_dir, e)),
    };

    let mut tenants = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(data_dir, e))?;
        let path = entry.path();
        let is_tenant =
            path.is_dir() && (path.join(STATE_DIR).is_dir() || path.join(CONFIG_DIR).is_dir());
        if is_tenant {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                tenants.push(name.to_string());
            }
        }
    }
    tenants.sort();
    Ok(tenants)
}

fn tenant_dir_name(discovery_domain: &str) -> String {
    let normalized = normalize_domain(discovery_domain);
    let sanitized: String = normalized
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "default".to_string()
    } else {
        sanitized
    }
}

/// Only numeric positions can be checked for regression; other opaque
/// tokens are trusted as issued by the discovery service.
fn moves_forward(stored: &str, offered: &str) -> bool {
    if offered.is_empty() {
        return false;
    }
    match (stored.parse::<u64>(), offered.parse::<u64>()) {
        (Ok(stored), Ok(offered)) => offered >= stored,
        _ => true,
    }
}

fn read_json_or_default<T>(path: &Path) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_slice(&bytes).map_err(|e| StoreError::serialization(path, e))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::serialization(path, e))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &bytes).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))?;
    Ok(())
}
