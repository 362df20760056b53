//! StreamLifecycle - pause/resume state machine over camera entries
//!
//! A camera entry's combination of `runOnReady`, `paused` and the
//! `original*` backup fields encodes one of three states. This module
//! gives that encoding a typed view and owns the only two transitions,
//! so invalid shapes (paused with no backup) cannot be produced here.
//!
//! Transitions persist through the ConfigStore mutation queue and are
//! durable once the save succeeds; the relay reload that follows is the
//! caller's concern and reported separately.

use crate::config_store::{CameraEntry, ConfigStore};
use crate::error::{Error, Result};
use serde::Serialize;
use std::sync::Arc;

/// Typed view of one entry's lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    /// Has a transcode command and is not paused
    Active { command: String, restart: bool },
    /// Command parked in the backup fields while the stream is disabled
    Paused {
        backup_command: String,
        backup_restart: bool,
    },
    /// No command and not paused (freshly misconfigured entry), or a
    /// paused flag with no backup to restore from
    Inactive,
}

impl StreamState {
    /// Classify an entry by its field shape
    pub fn classify(entry: &CameraEntry) -> Self {
        if entry.paused == Some(true) {
            return match &entry.original_run_on_ready {
                Some(backup) => StreamState::Paused {
                    backup_command: backup.clone(),
                    backup_restart: entry.original_run_on_ready_restart.unwrap_or(false),
                },
                None => StreamState::Inactive,
            };
        }
        match &entry.run_on_ready {
            Some(command) => StreamState::Active {
                command: command.clone(),
                restart: entry.run_on_ready_restart,
            },
            None => StreamState::Inactive,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StreamState::Active { .. } => "active",
            StreamState::Paused { .. } => "paused",
            StreamState::Inactive => "inactive",
        }
    }
}

/// Camera status as reported by the API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraStatus {
    pub name: String,
    pub status: &'static str,
    pub paused: bool,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_on_ready: Option<String>,
    pub run_on_ready_restart: bool,
}

/// StreamLifecycle instance
pub struct StreamLifecycle {
    store: Arc<ConfigStore>,
}

impl StreamLifecycle {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }

    /// Pause an active camera: park the command in the backup fields and
    /// clear it from the entry.
    ///
    /// Pausing an already-paused camera is an idempotent success that
    /// leaves the existing backup untouched. Returns whether the entry
    /// changed, so callers can skip the relay reload on the no-op path.
    pub async fn pause(&self, name: &str) -> Result<bool> {
        let changed = self
            .store
            .update_camera(name, |entry| match StreamState::classify(entry) {
                StreamState::Paused { .. } => Ok(false),
                StreamState::Active { .. } => {
                    entry.original_run_on_ready = entry.run_on_ready.take();
                    entry.original_run_on_ready_restart = Some(entry.run_on_ready_restart);
                    entry.run_on_ready_restart = false;
                    entry.paused = Some(true);
                    Ok(true)
                }
                StreamState::Inactive => Err(Error::InvalidState(format!(
                    "Camera {} has no active command to pause",
                    name
                ))),
            })
            .await?;

        if changed {
            tracing::info!(camera = name, "camera paused");
        } else {
            tracing::debug!(camera = name, "camera already paused, nothing to do");
        }
        Ok(changed)
    }

    /// Resume a paused camera: restore the command from the backup fields
    /// and drop the pause markers.
    pub async fn resume(&self, name: &str) -> Result<()> {
        self.store
            .update_camera(name, |entry| match StreamState::classify(entry) {
                StreamState::Paused { .. } => {
                    entry.run_on_ready = entry.original_run_on_ready.take();
                    entry.run_on_ready_restart =
                        entry.original_run_on_ready_restart.take().unwrap_or(false);
                    entry.paused = None;
                    Ok(())
                }
                _ => Err(Error::InvalidState(format!(
                    "Camera {} is not paused or has no saved command",
                    name
                ))),
            })
            .await?;

        tracing::info!(camera = name, "camera resumed");
        Ok(())
    }

    /// Current lifecycle status of one camera
    pub async fn status(&self, name: &str) -> Result<CameraStatus> {
        let entry = self.store.get_camera(name).await?;
        let state = StreamState::classify(&entry);
        Ok(CameraStatus {
            name: name.to_string(),
            status: state.label(),
            paused: matches!(state, StreamState::Paused { .. }),
            active: matches!(state, StreamState::Active { .. }),
            run_on_ready: entry.run_on_ready,
            run_on_ready_restart: entry.run_on_ready_restart,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_store::ConfigStore;

    const COMMAND: &str = "/usr/bin/ffmpeg -i rtsp://cam1.local/stream -an -f flv rtmp://out/live1";

    fn sample_config() -> String {
        format!(
            "paths:\n  cam1:\n    source: rtsp://cam1.local/stream\n    runOnReady: {}\n    runOnReadyRestart: true\n",
            COMMAND
        )
    }

    fn lifecycle_with(contents: &str) -> (tempfile::TempDir, Arc<ConfigStore>, StreamLifecycle) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mediamtx.yml");
        std::fs::write(&path, contents).unwrap();
        let store = Arc::new(ConfigStore::new(path));
        let lifecycle = StreamLifecycle::new(store.clone());
        (dir, store, lifecycle)
    }

    #[test]
    fn classification() {
        let mut entry = CameraEntry {
            run_on_ready: Some(COMMAND.to_string()),
            run_on_ready_restart: true,
            ..Default::default()
        };
        assert!(matches!(
            StreamState::classify(&entry),
            StreamState::Active { .. }
        ));

        entry.paused = Some(true);
        entry.original_run_on_ready = Some(COMMAND.to_string());
        assert!(matches!(
            StreamState::classify(&entry),
            StreamState::Paused { .. }
        ));

        // paused flag with no backup is an invalid shape; it classifies as
        // inactive and resume refuses it
        entry.original_run_on_ready = None;
        assert_eq!(StreamState::classify(&entry), StreamState::Inactive);

        assert_eq!(
            StreamState::classify(&CameraEntry::default()),
            StreamState::Inactive
        );
    }

    #[tokio::test]
    async fn pause_parks_the_command() {
        let (_dir, store, lifecycle) = lifecycle_with(&sample_config());
        assert!(lifecycle.pause("cam1").await.unwrap());

        let entry = store.get_camera("cam1").await.unwrap();
        assert_eq!(entry.run_on_ready, None);
        assert!(!entry.run_on_ready_restart);
        assert_eq!(entry.paused, Some(true));
        assert_eq!(entry.original_run_on_ready.as_deref(), Some(COMMAND));
        assert_eq!(entry.original_run_on_ready_restart, Some(true));
    }

    #[tokio::test]
    async fn repeated_pause_keeps_the_first_backup() {
        let (_dir, store, lifecycle) = lifecycle_with(&sample_config());
        assert!(lifecycle.pause("cam1").await.unwrap());
        assert!(!lifecycle.pause("cam1").await.unwrap());

        let entry = store.get_camera("cam1").await.unwrap();
        assert_eq!(entry.original_run_on_ready.as_deref(), Some(COMMAND));
    }

    #[tokio::test]
    async fn pause_resume_restores_byte_for_byte() {
        let (_dir, store, lifecycle) = lifecycle_with(&sample_config());
        lifecycle.pause("cam1").await.unwrap();
        lifecycle.resume("cam1").await.unwrap();

        let entry = store.get_camera("cam1").await.unwrap();
        assert_eq!(entry.run_on_ready.as_deref(), Some(COMMAND));
        assert!(entry.run_on_ready_restart);
        assert_eq!(entry.paused, None);
        assert_eq!(entry.original_run_on_ready, None);
        assert_eq!(entry.original_run_on_ready_restart, None);
    }

    #[tokio::test]
    async fn resume_without_pause_is_invalid() {
        let (_dir, _store, lifecycle) = lifecycle_with(&sample_config());
        assert!(matches!(
            lifecycle.resume("cam1").await.unwrap_err(),
            Error::InvalidState(_)
        ));
    }

    #[tokio::test]
    async fn pause_of_inactive_camera_is_invalid() {
        let (_dir, _store, lifecycle) =
            lifecycle_with("paths:\n  cam1:\n    source: rtsp://cam1.local/stream\n");
        assert!(matches!(
            lifecycle.pause("cam1").await.unwrap_err(),
            Error::InvalidState(_)
        ));
    }

    #[tokio::test]
    async fn pause_of_missing_camera_is_not_found() {
        let (_dir, _store, lifecycle) = lifecycle_with(&sample_config());
        assert!(matches!(
            lifecycle.pause("ghost").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn status_labels() {
        let (_dir, _store, lifecycle) = lifecycle_with(&sample_config());
        assert_eq!(lifecycle.status("cam1").await.unwrap().status, "active");
        lifecycle.pause("cam1").await.unwrap();
        let status = lifecycle.status("cam1").await.unwrap();
        assert_eq!(status.status, "paused");
        assert!(status.paused);
        assert!(!status.active);
    }
}
