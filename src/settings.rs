//! Settings persistence
//!
//! Process-wide user settings backed by a single JSON document: explicit
//! load-on-start, explicit polling watch with a reload callback, explicit
//! whole-document replace on write. Missing or partial documents fall
//! back to fixed defaults per field.
//!
//! Single-writer assumption: nothing reconciles concurrent writers of the
//! document; the last replace wins.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default location of the settings document
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/shared-storage-admin.conf.json";

// =============================================================================
// Document
// =============================================================================

/// Samba-specific settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SambaSettings {
    /// Path to smb.conf
    pub conf_path: PathBuf,
}

impl Default for SambaSettings {
    fn default() -> Self {
        Self {
            conf_path: PathBuf::from("/etc/samba/smb.conf"),
        }
    }
}

/// NFS-specific settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NfsSettings {
    /// Path to the managed exports file
    pub conf_path: PathBuf,
}

impl Default for NfsSettings {
    fn default() -> Self {
        Self {
            conf_path: PathBuf::from("/etc/exports.d/shared-storage-admin.exports"),
        }
    }
}

/// iSCSI-specific settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IscsiSettings {
    /// Path to the iSCSI configuration file
    pub conf_path: PathBuf,
}

impl Default for IscsiSettings {
    fn default() -> Self {
        Self {
            conf_path: PathBuf::from("/tmp/iSCSI.conf"),
        }
    }
}

/// The whole settings document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserSettings {
    pub samba: SambaSettings,
    pub nfs: NfsSettings,
    pub iscsi: IscsiSettings,
    /// Include users and groups with uid and gid from 1 to 999
    pub include_system_accounts: bool,
}

// =============================================================================
// Store
// =============================================================================

/// File-backed settings store
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<UserSettings>,
}

impl SettingsStore {
    /// Load the document at `path`, falling back to defaults if absent
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current = Self::read_document(&path)?;
        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    fn read_document(path: &Path) -> Result<UserSettings> {
        match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                Error::Configuration(format!(
                    "malformed settings document {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no settings document at {}, using defaults", path.display());
                Ok(UserSettings::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current settings
    pub fn get(&self) -> UserSettings {
        self.current.read().clone()
    }

    /// Write the whole document and update the in-memory copy
    pub fn replace(&self, settings: UserSettings) -> Result<()> {
        let json = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&self.path, json)?;
        *self.current.write() = settings;
        Ok(())
    }

    /// Re-read the document; returns the fresh settings if they changed
    pub fn reload(&self) -> Result<Option<UserSettings>> {
        let fresh = Self::read_document(&self.path)?;
        let mut current = self.current.write();
        if *current == fresh {
            return Ok(None);
        }
        *current = fresh.clone();
        Ok(Some(fresh))
    }

    /// Spawn a polling reload task invoking `on_change` for each change
    pub fn spawn_watch<F>(
        self: &Arc<Self>,
        interval: Duration,
        on_change: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Fn(&UserSettings) + Send + Sync + 'static,
    {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match store.reload() {
                    Ok(Some(fresh)) => on_change(&fresh),
                    Ok(None) => {}
                    Err(e) => warn!("settings reload failed: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn temp_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("settings.conf.json")
    }

    #[test]
    fn test_missing_document_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(temp_path(&dir)).unwrap();

        assert_eq!(store.get(), UserSettings::default());
        assert_eq!(
            store.get().samba.conf_path,
            PathBuf::from("/etc/samba/smb.conf")
        );
    }

    #[test]
    fn test_partial_document_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        std::fs::write(
            &path,
            r#"{"samba": {"confPath": "/custom/smb.conf"}, "includeSystemAccounts": true}"#,
        )
        .unwrap();

        let settings = SettingsStore::load(&path).unwrap().get();

        assert_eq!(settings.samba.conf_path, PathBuf::from("/custom/smb.conf"));
        assert_eq!(settings.nfs, NfsSettings::default());
        assert_eq!(settings.iscsi, IscsiSettings::default());
        assert!(settings.include_system_accounts);
    }

    #[test]
    fn test_malformed_document_is_a_configuration_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        std::fs::write(&path, "not json").unwrap();

        let err = SettingsStore::load(&path).unwrap_err();
        assert_matches!(err, Error::Configuration(_));
    }

    #[test]
    fn test_replace_writes_the_whole_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        let store = SettingsStore::load(&path).unwrap();

        let mut settings = store.get();
        settings.iscsi.conf_path = PathBuf::from("/etc/iscsi-admin.conf");
        store.replace(settings.clone()).unwrap();

        assert_eq!(store.get(), settings);

        // Every section lands on disk, not just the changed one
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("confPath"));
        assert!(raw.contains("includeSystemAccounts"));
        assert_eq!(SettingsStore::load(&path).unwrap().get(), settings);
    }

    #[tokio::test]
    async fn test_watch_invokes_callback_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        let store = Arc::new(SettingsStore::load(&path).unwrap());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let handle = store.spawn_watch(Duration::from_millis(10), move |fresh| {
            let _ = tx.send(fresh.clone());
        });

        std::fs::write(&path, r#"{"includeSystemAccounts": true}"#).unwrap();

        let fresh = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no settings change observed")
            .expect("watch channel closed");
        assert!(fresh.include_system_accounts);

        handle.abort();
    }

    #[test]
    fn test_reload_picks_up_external_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        let store = SettingsStore::load(&path).unwrap();

        assert!(store.reload().unwrap().is_none());

        std::fs::write(&path, r#"{"includeSystemAccounts": true}"#).unwrap();
        let fresh = store.reload().unwrap().expect("change detected");

        assert!(fresh.include_system_accounts);
        assert!(store.get().include_system_accounts);
    }
}
