//! API Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::config_store::{CameraEntry, ConfigDocument};
use crate::error::{Error, Result};
use crate::ffmpeg_cmd::{self, CommandLine, SettingsPatch};
use crate::models::{CameraView, MutationReport};
use crate::reload::ReloadOutcome;
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // Raw configuration document
        .route("/api/config", get(get_config))
        .route("/api/config", post(replace_config))
        // Cameras
        .route("/api/cameras", get(list_cameras))
        .route("/api/cameras", post(create_camera))
        .route("/api/cameras/:name", get(get_camera))
        .route("/api/cameras/:name", put(update_camera))
        .route("/api/cameras/:name", delete(delete_camera))
        .route("/api/cameras/:name/stream-settings", get(get_stream_settings))
        .route("/api/cameras/:name/stream-settings", put(update_stream_settings))
        .route("/api/cameras/:name/pause", post(pause_camera))
        .route("/api/cameras/:name/resume", post(resume_camera))
        .route("/api/cameras/:name/status", get(camera_status))
        // Aggregate and per-stream status
        .route("/api/status", get(aggregate_status))
        .route("/api/streams/:name/status", get(stream_status))
        .route("/api/streams/:name/processing", get(stream_processing))
        .route("/api/streams/:name/io", get(stream_io))
        .route("/api/server/info", get(server_info))
        // Container logs
        .route("/api/logs/:container", get(container_logs))
        .with_state(state)
}

// ========================================
// Raw configuration handlers
// ========================================

async fn get_config(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let doc = state.store.load().await?;
    Ok(Json(doc))
}

async fn replace_config(
    State(state): State<AppState>,
    Json(doc): Json<ConfigDocument>,
) -> Result<impl IntoResponse> {
    state.store.replace(&doc).await?;
    let reload = state.reload.reload().await;
    Ok(Json(MutationReport::<()>::new(
        "Configuration replaced",
        None,
        reload,
    )))
}

// ========================================
// Camera handlers
// ========================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCameraRequest {
    name: String,
    rtsp_url: String,
    rtmp_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCameraRequest {
    rtsp_url: String,
    rtmp_url: String,
}

fn validate_urls(rtsp_url: &str, rtmp_url: &str) -> Result<()> {
    if !rtsp_url.starts_with("rtsp://") {
        return Err(Error::Validation(
            "RTSP URL must start with rtsp://".to_string(),
        ));
    }
    if !rtmp_url.starts_with("rtmp://") {
        return Err(Error::Validation(
            "RTMP URL must start with rtmp://".to_string(),
        ));
    }
    Ok(())
}

async fn list_cameras(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let cameras = state.store.list_cameras().await?;
    let views: Vec<CameraView> = cameras
        .iter()
        .map(|(name, entry)| CameraView::from_entry(name, entry))
        .collect();
    Ok(Json(views))
}

async fn get_camera(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    let entry = state.store.get_camera(&name).await?;
    Ok(Json(CameraView::from_entry(&name, &entry)))
}

async fn create_camera(
    State(state): State<AppState>,
    Json(req): Json<CreateCameraRequest>,
) -> Result<impl IntoResponse> {
    if req.name.trim().is_empty() {
        return Err(Error::Validation(
            "Camera name must not be empty".to_string(),
        ));
    }
    validate_urls(&req.rtsp_url, &req.rtmp_url)?;

    let entry = CameraEntry::new(&req.rtsp_url, &req.rtmp_url);
    let entry = state.store.add_camera(&req.name, entry).await?;
    tracing::info!(camera = %req.name, "camera added");

    let reload = state.reload.reload().await;
    Ok((
        StatusCode::CREATED,
        Json(MutationReport::new(
            "Camera added successfully",
            Some(CameraView::from_entry(&req.name, &entry)),
            reload,
        )),
    ))
}

async fn update_camera(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<UpdateCameraRequest>,
) -> Result<impl IntoResponse> {
    validate_urls(&req.rtsp_url, &req.rtmp_url)?;

    let entry = state
        .store
        .update_camera(&name, |entry| {
            entry.source = Some(req.rtsp_url.clone());
            entry.run_on_ready = Some(ffmpeg_cmd::default_command(&req.rtsp_url, &req.rtmp_url));
            entry.run_on_ready_restart = true;
            // a full reconfiguration makes the new command live; stale
            // pause markers would leave the entry in an invalid shape
            entry.paused = None;
            entry.original_run_on_ready = None;
            entry.original_run_on_ready_restart = None;
            Ok(entry.clone())
        })
        .await?;
    tracing::info!(camera = %name, "camera updated");

    let reload = state.reload.reload().await;
    Ok(Json(MutationReport::new(
        "Camera updated successfully",
        Some(CameraView::from_entry(&name, &entry)),
        reload,
    )))
}

async fn delete_camera(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    state.store.delete_camera(&name).await?;
    tracing::info!(camera = %name, "camera deleted");

    let reload = state.reload.reload().await;
    Ok(Json(MutationReport::<()>::new(
        format!("Camera '{}' deleted", name),
        None,
        reload,
    )))
}

// ========================================
// Stream settings handlers
// ========================================

async fn get_stream_settings(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    let entry = state.store.get_camera(&name).await?;
    let command = CommandLine::parse(entry.run_on_ready.as_deref().unwrap_or(""));
    Ok(Json(command.settings()))
}

async fn update_stream_settings(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(patch): Json<SettingsPatch>,
) -> Result<impl IntoResponse> {
    patch.validate()?;

    let updated_command = state
        .store
        .update_camera(&name, |entry| {
            let current = entry.run_on_ready.as_deref().ok_or_else(|| {
                Error::InvalidState(format!(
                    "Camera {} has no active command; resume it before editing settings",
                    name
                ))
            })?;
            let mut command = CommandLine::parse(current);
            command.apply(&patch);
            let rendered = command.render();
            entry.run_on_ready = Some(rendered.clone());
            Ok(rendered)
        })
        .await?;
    tracing::info!(camera = %name, "stream settings updated");

    let reload = state.reload.reload().await;
    Ok(Json(MutationReport::new(
        "Stream settings updated",
        Some(updated_command),
        reload,
    )))
}

// ========================================
// Lifecycle handlers
// ========================================

async fn pause_camera(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    let changed = state.lifecycle.pause(&name).await?;

    // an already-paused camera needs no relay restart
    let reload = if changed {
        state.reload.reload().await
    } else {
        ReloadOutcome {
            succeeded: true,
            verified: true,
            error: None,
        }
    };
    let message = if changed {
        format!("Camera '{}' paused", name)
    } else {
        format!("Camera '{}' was already paused", name)
    };
    let status = state.lifecycle.status(&name).await?;
    Ok(Json(MutationReport::new(message, Some(status), reload)))
}

async fn resume_camera(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    state.lifecycle.resume(&name).await?;

    let reload = state.reload.reload().await;
    let status = state.lifecycle.status(&name).await?;
    Ok(Json(MutationReport::new(
        format!("Camera '{}' resumed", name),
        Some(status),
        reload,
    )))
}

async fn camera_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.lifecycle.status(&name).await?))
}

// ========================================
// Status handlers
// ========================================

async fn aggregate_status(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.status.snapshot().await?))
}

async fn stream_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.relay.get_path(&name).await?))
}

async fn stream_processing(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.status.stream_processing(&name).await?))
}

async fn stream_io(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.status.stream_io(&name).await?))
}

async fn server_info(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.relay.global_config().await?))
}

// ========================================
// Log handlers
// ========================================

#[derive(Debug, Deserialize)]
struct LogsQuery {
    lines: Option<u32>,
}

async fn container_logs(
    State(state): State<AppState>,
    Path(container): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<impl IntoResponse> {
    let logs = state
        .docker
        .logs(&container, query.lines.unwrap_or(100))
        .await?;
    Ok(Json(logs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_scheme_validation() {
        assert!(validate_urls("rtsp://cam.local/s", "rtmp://out/live").is_ok());
        assert!(validate_urls("http://cam.local/s", "rtmp://out/live").is_err());
        assert!(validate_urls("rtsp://cam.local/s", "https://out/live").is_err());
    }
}
