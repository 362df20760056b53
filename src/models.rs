//! Shared response models
//!
//! Types used by several handler modules live here to avoid circular
//! dependencies.

use crate::lifecycle::StreamState;
use crate::reload::ReloadOutcome;
use serde::Serialize;

/// Health check response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub config_readable: bool,
    pub relay_connected: bool,
}

/// Response for every mutating camera operation.
///
/// The mutation's durability and the relay reload are independent
/// concerns: `ok` refers to the saved configuration alone, while `reload`
/// carries the restart/verification outcome, with a warning when the
/// operator needs to intervene.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationReport<T: Serialize> {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub reload: ReloadOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> MutationReport<T> {
    /// Report a durable mutation together with its reload outcome
    pub fn new(message: impl Into<String>, data: Option<T>, reload: ReloadOutcome) -> Self {
        Self {
            ok: true,
            message: message.into(),
            warning: reload.warning(),
            reload,
            data,
        }
    }
}

/// One camera as listed by the API: config entry fields joined with the
/// derived RTMP target and lifecycle state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraView {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtsp_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtmp_url: Option<String>,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_on_ready: Option<String>,
    pub run_on_ready_restart: bool,
    pub paused: bool,
}

impl CameraView {
    pub fn from_entry(name: &str, entry: &crate::config_store::CameraEntry) -> Self {
        let state = StreamState::classify(entry);
        Self {
            name: name.to_string(),
            rtsp_url: entry.source.clone(),
            rtmp_url: entry
                .run_on_ready
                .as_deref()
                .and_then(crate::ffmpeg_cmd::extract_rtmp_target),
            status: state.label(),
            run_on_ready: entry.run_on_ready.clone(),
            run_on_ready_restart: entry.run_on_ready_restart,
            paused: matches!(state, StreamState::Paused { .. }),
        }
    }
}
