//! ConfigStore - relay configuration file access
//!
//! ## Responsibilities
//!
//! - Load/parse/serialize/write of the relay's YAML document
//! - Per-camera CRUD on the `paths` mapping
//! - Basic-auth credential derivation for the relay's query API
//!
//! ## Design Principles
//!
//! - The file is the single source of truth: every operation re-reads it,
//!   there is no in-memory cache
//! - All mutations serialize through one async mutex held across
//!   load -> mutate -> save, so concurrent writers cannot lose updates
//! - Callers must not hold a mutation open across slow work (reloads run
//!   after the save, never inside it)

mod types;

pub use types::{AuthUser, CameraEntry, ConfigDocument};

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Credentials used when the document carries no internal user list
const FALLBACK_USER: &str = "wrakash";
const FALLBACK_PASS: &str = "akash@1997";

/// ConfigStore instance
pub struct ConfigStore {
    path: PathBuf,
    /// Single-writer serialization point for all mutations
    write_lock: Mutex<()>,
}

impl ConfigStore {
    /// Create a store over the given YAML file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the governed file
    pub fn file_path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the whole document
    pub async fn load(&self) -> Result<ConfigDocument> {
        let raw = fs::read_to_string(&self.path).await.map_err(|e| {
            Error::ConfigIo(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    async fn save(&self, doc: &ConfigDocument) -> Result<()> {
        let rendered = serde_yaml::to_string(doc)?;
        fs::write(&self.path, rendered).await.map_err(|e| {
            Error::ConfigIo(format!("failed to write {}: {}", self.path.display(), e))
        })
    }

    /// Overwrite the whole document
    pub async fn replace(&self, doc: &ConfigDocument) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save(doc).await
    }

    /// Run one load -> mutate -> save cycle as a single logical unit.
    ///
    /// The closure's error aborts the cycle before anything is written.
    pub async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut ConfigDocument) -> Result<T>,
    {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;
        let out = f(&mut doc)?;
        self.save(&doc).await?;
        Ok(out)
    }

    /// Fetch one camera entry
    pub async fn get_camera(&self, name: &str) -> Result<CameraEntry> {
        let doc = self.load().await?;
        doc.paths
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Camera {} not found", name)))
    }

    /// All cameras as (name, entry) pairs
    pub async fn list_cameras(&self) -> Result<Vec<(String, CameraEntry)>> {
        let doc = self.load().await?;
        Ok(doc.paths.into_iter().collect())
    }

    /// Add a camera; fails when the name is already taken
    pub async fn add_camera(&self, name: &str, entry: CameraEntry) -> Result<CameraEntry> {
        self.mutate(|doc| {
            if doc.paths.contains_key(name) {
                return Err(Error::AlreadyExists(format!(
                    "Camera {} already exists",
                    name
                )));
            }
            doc.paths.insert(name.to_string(), entry.clone());
            Ok(entry)
        })
        .await
    }

    /// Mutate one existing camera entry in place; fails when absent
    pub async fn update_camera<T, F>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut CameraEntry) -> Result<T>,
    {
        self.mutate(|doc| match doc.paths.get_mut(name) {
            Some(entry) => f(entry),
            None => Err(Error::NotFound(format!("Camera {} not found", name))),
        })
        .await
    }

    /// Remove a camera; fails when absent
    pub async fn delete_camera(&self, name: &str) -> Result<()> {
        self.mutate(|doc| {
            if doc.paths.remove(name).is_none() {
                return Err(Error::NotFound(format!("Camera {} not found", name)));
            }
            Ok(())
        })
        .await
    }

    /// Basic-auth credentials for the relay's query API: first internal
    /// user when present, fixed fallback pair otherwise
    pub async fn auth_credentials(&self) -> Result<(String, String)> {
        Ok(credentials_of(&self.load().await?))
    }
}

/// Credential derivation as a pure function of the document
pub fn credentials_of(doc: &ConfigDocument) -> (String, String) {
    match doc.auth_internal_users.as_deref() {
        Some([first, ..]) => (
            first.user.clone().unwrap_or_else(|| FALLBACK_USER.to_string()),
            first.pass.clone().unwrap_or_else(|| FALLBACK_PASS.to_string()),
        ),
        _ => (FALLBACK_USER.to_string(), FALLBACK_PASS.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
logLevel: info
api: yes
authInternalUsers:
  - user: operator
    pass: hunter2
paths:
  cam1:
    source: rtsp://cam1.local/stream
    runOnReady: /usr/bin/ffmpeg -i rtsp://cam1.local/stream -an -f flv rtmp://out/live1
    runOnReadyRestart: true
    sourceOnDemand: true
"#;

    fn store_with(contents: &str) -> (tempfile::TempDir, ConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mediamtx.yml");
        std::fs::write(&path, contents).unwrap();
        (dir, ConfigStore::new(path))
    }

    #[tokio::test]
    async fn load_save_round_trip_preserves_unknown_fields() {
        let (_dir, store) = store_with(SAMPLE);
        let doc = store.load().await.unwrap();
        store.replace(&doc).await.unwrap();
        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded, doc);
        assert!(reloaded.extra.contains_key("logLevel"));
        assert!(reloaded.paths["cam1"].extra.contains_key("sourceOnDemand"));
    }

    #[tokio::test]
    async fn add_duplicate_fails() {
        let (_dir, store) = store_with(SAMPLE);
        let entry = CameraEntry::new("rtsp://x/s", "rtmp://y/l");
        let err = store.add_camera("cam1", entry).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn add_then_get() {
        let (_dir, store) = store_with(SAMPLE);
        let entry = CameraEntry::new("rtsp://cam2.local/s", "rtmp://out/live2");
        store.add_camera("cam2", entry.clone()).await.unwrap();
        assert_eq!(store.get_camera("cam2").await.unwrap(), entry);
    }

    #[tokio::test]
    async fn update_missing_fails() {
        let (_dir, store) = store_with(SAMPLE);
        let err = store
            .update_camera("ghost", |_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_mutation_writes_nothing() {
        let (_dir, store) = store_with(SAMPLE);
        let before = store.load().await.unwrap();
        let _ = store
            .update_camera("cam1", |entry| {
                entry.source = Some("rtsp://changed/s".to_string());
                Err::<(), _>(Error::Validation("nope".to_string()))
            })
            .await;
        assert_eq!(store.load().await.unwrap(), before);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let (_dir, store) = store_with(SAMPLE);
        store.delete_camera("cam1").await.unwrap();
        assert!(matches!(
            store.get_camera("cam1").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn credentials_from_first_user() {
        let (_dir, store) = store_with(SAMPLE);
        let (user, pass) = store.auth_credentials().await.unwrap();
        assert_eq!(user, "operator");
        assert_eq!(pass, "hunter2");
    }

    #[tokio::test]
    async fn credentials_fall_back_when_list_absent() {
        let (_dir, store) = store_with("paths: {}\n");
        let (user, pass) = store.auth_credentials().await.unwrap();
        assert_eq!(user, FALLBACK_USER);
        assert_eq!(pass, FALLBACK_PASS);
    }

    #[tokio::test]
    async fn load_failure_is_config_io() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("missing.yml"));
        assert!(matches!(
            store.load().await.unwrap_err(),
            Error::ConfigIo(_)
        ));
    }
}
