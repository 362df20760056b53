//! StatusAggregator - merged live/config status views
//!
//! ## Responsibilities
//!
//! - One coherent snapshot combining the relay's runtime data (paths,
//!   RTSP/RTMP sessions) with configuration-derived metadata (transcode
//!   command, RTMP target)
//! - Per-stream processing and I/O detail views
//!
//! Session list failures degrade to empty lists with a warning instead of
//! failing the whole call; only the path list is load-bearing. Output
//! figures for external RTMP targets are estimates, and the payload says
//! so: `OutputMetrics` is tagged `measured` or `estimated` so consumers
//! cannot mistake one for the other.

use crate::config_store::{CameraEntry, ConfigStore};
use crate::error::Result;
use crate::ffmpeg_cmd::CommandLine;
use crate::relay_api::{PathInfo, RelayClient, SessionInfo};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Assumed pass-through ratio when estimating output from input bitrate
const ESTIMATED_PASSTHROUGH: f64 = 0.8;

/// Aggregate status of all paths and sessions
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub paths: Vec<PathInfo>,
    pub rtsp_sessions: Vec<SessionInfo>,
    pub rtmp_sessions: Vec<SessionInfo>,
    /// Per-stream processing records for ready paths with a config entry
    pub streams: Vec<StreamRecord>,
    pub totals: Totals,
    /// Degraded sections, named so the operator can retry them
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub paths: usize,
    pub active_paths: usize,
    pub sessions: usize,
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

/// One ready stream joined with its configuration
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtmp_url: Option<String>,
    pub restart: bool,
}

/// Transcode process view derived from the config entry and path readiness
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FfmpegProcess {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub status: &'static str,
    pub restart_policy: &'static str,
}

/// Per-stream processing detail
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamProcessing {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub ready: bool,
    pub ffmpeg: FfmpegProcess,
    pub rtmp_output: RtmpOutput,
    pub transfer: TransferStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtmpOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStatus {
    pub input_connected: bool,
    pub output_connected: bool,
    pub processing_active: bool,
}

/// Output figures, explicitly tagged by provenance.
///
/// `Measured` comes from internal RTMP sessions; `Estimated` is derived
/// from the input bitrate (or the command's `-b:v`) and elapsed time, and
/// is an approximation, not a measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OutputMetrics {
    #[serde(rename_all = "camelCase")]
    Measured { bytes_sent: u64, bitrate: u64 },
    #[serde(rename_all = "camelCase")]
    Estimated { bytes_sent: u64, bitrate: u64 },
}

/// Per-stream I/O detail
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamIo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
    pub input: InputSide,
    pub output: OutputSide,
    pub ffmpeg: FfmpegProcess,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSide {
    pub connected: bool,
    pub protocol: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub sessions: usize,
    pub bytes_received: u64,
    pub bitrate: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSide {
    pub connected: bool,
    pub protocol: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub sessions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<OutputMetrics>,
}

/// StatusAggregator instance
pub struct StatusAggregator {
    relay: Arc<RelayClient>,
    store: Arc<ConfigStore>,
}

impl StatusAggregator {
    pub fn new(relay: Arc<RelayClient>, store: Arc<ConfigStore>) -> Self {
        Self { relay, store }
    }

    /// Aggregate snapshot of every path, session and configured stream
    pub async fn snapshot(&self) -> Result<StatusSnapshot> {
        let paths = self.relay.list_paths().await?;
        let mut warnings = Vec::new();

        let rtsp_sessions = match self.relay.list_rtsp_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!(error = %e, "RTSP session list unavailable, degrading to empty");
                warnings.push(format!("RTSP session list unavailable: {}", e));
                Vec::new()
            }
        };
        let rtmp_sessions = match self.relay.list_rtmp_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!(error = %e, "RTMP session list unavailable, degrading to empty");
                warnings.push(format!("RTMP session list unavailable: {}", e));
                Vec::new()
            }
        };

        let doc = self.store.load().await?;
        let streams = paths
            .iter()
            .filter(|p| p.ready)
            .filter_map(|p| doc.paths.get(&p.name).map(|entry| stream_record(p, entry)))
            .collect();

        let totals = Totals {
            paths: paths.len(),
            active_paths: paths.iter().filter(|p| p.ready).count(),
            sessions: rtsp_sessions.len() + rtmp_sessions.len(),
            bytes_received: paths.iter().map(|p| p.bytes_received).sum(),
            bytes_sent: paths.iter().map(|p| p.bytes_sent).sum(),
        };

        Ok(StatusSnapshot {
            paths,
            rtsp_sessions,
            rtmp_sessions,
            streams,
            totals,
            warnings,
        })
    }

    /// Processing detail for one stream
    pub async fn stream_processing(&self, name: &str) -> Result<StreamProcessing> {
        let path = self.relay.get_path(name).await?;
        let entry = self.store.get_camera(name).await?;

        let command = entry.run_on_ready.clone();
        let rtmp_url = command.as_deref().and_then(crate::ffmpeg_cmd::extract_rtmp_target);
        let has_command = command.is_some();

        Ok(StreamProcessing {
            name: name.to_string(),
            source: entry.source.clone(),
            ready: path.ready,
            ffmpeg: ffmpeg_process(&entry, path.ready),
            rtmp_output: RtmpOutput {
                status: if path.ready && rtmp_url.is_some() {
                    "active"
                } else {
                    "inactive"
                },
                url: rtmp_url.clone(),
            },
            transfer: TransferStatus {
                input_connected: path.ready,
                output_connected: path.ready && rtmp_url.is_some(),
                processing_active: path.ready && has_command,
            },
        })
    }

    /// I/O detail for one stream, with measured-or-estimated output figures
    pub async fn stream_io(&self, name: &str) -> Result<StreamIo> {
        let path = self.relay.get_path(name).await?;
        let entry = self.store.get_camera(name).await?;
        let mut warnings = Vec::new();

        let rtsp_sessions: Vec<SessionInfo> = match self.relay.list_rtsp_sessions().await {
            Ok(sessions) => sessions
                .into_iter()
                .filter(|s| s.path.as_deref() == Some(name))
                .collect(),
            Err(e) => {
                warnings.push(format!("RTSP session list unavailable: {}", e));
                Vec::new()
            }
        };
        let rtmp_sessions: Vec<SessionInfo> = match self.relay.list_rtmp_sessions().await {
            Ok(sessions) => sessions
                .into_iter()
                .filter(|s| s.path.as_deref() == Some(name))
                .collect(),
            Err(e) => {
                warnings.push(format!("RTMP session list unavailable: {}", e));
                Vec::new()
            }
        };

        let input_bitrate: u64 = rtsp_sessions.iter().map(|s| s.bitrate).sum();
        let bytes_received: u64 = rtsp_sessions.iter().map(|s| s.bytes_received).sum();

        let command = entry.run_on_ready.as_deref().map(CommandLine::parse);
        let rtmp_url = command.as_ref().and_then(CommandLine::rtmp_target);
        let metrics = output_metrics(
            &rtmp_sessions,
            command.as_ref(),
            path.ready,
            input_bitrate,
            path.last_activity,
            Utc::now(),
        );
        let output_connected =
            !rtmp_sessions.is_empty() || (path.ready && rtmp_url.is_some());

        Ok(StreamIo {
            name: name.to_string(),
            source: entry.source.clone(),
            ready: path.ready,
            last_activity: path.last_activity,
            input: InputSide {
                connected: path.ready,
                protocol: "RTSP",
                url: entry.source.clone(),
                sessions: rtsp_sessions.len(),
                bytes_received,
                bitrate: input_bitrate,
            },
            output: OutputSide {
                connected: output_connected,
                protocol: "RTMP",
                url: rtmp_url,
                sessions: rtmp_sessions.len(),
                metrics,
            },
            ffmpeg: ffmpeg_process(&entry, path.ready),
            warnings,
        })
    }
}

fn stream_record(path: &PathInfo, entry: &CameraEntry) -> StreamRecord {
    StreamRecord {
        name: path.name.clone(),
        source: entry.source.clone(),
        command: entry.run_on_ready.clone(),
        rtmp_url: entry
            .run_on_ready
            .as_deref()
            .and_then(crate::ffmpeg_cmd::extract_rtmp_target),
        restart: entry.run_on_ready_restart,
    }
}

fn ffmpeg_process(entry: &CameraEntry, ready: bool) -> FfmpegProcess {
    FfmpegProcess {
        status: if ready && entry.run_on_ready.is_some() {
            "running"
        } else {
            "stopped"
        },
        restart_policy: if entry.run_on_ready_restart {
            "enabled"
        } else {
            "disabled"
        },
        command: entry.run_on_ready.clone(),
    }
}

/// Pick measured figures when internal RTMP sessions exist; estimate from
/// the input side otherwise. `None` when the command has no RTMP target.
fn output_metrics(
    rtmp_sessions: &[SessionInfo],
    command: Option<&CommandLine>,
    ready: bool,
    input_bitrate: u64,
    last_activity: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<OutputMetrics> {
    if !rtmp_sessions.is_empty() {
        return Some(OutputMetrics::Measured {
            bytes_sent: rtmp_sessions.iter().map(|s| s.bytes_sent).sum(),
            bitrate: rtmp_sessions.iter().map(|s| s.bitrate).sum(),
        });
    }

    let command = command?;
    command.rtmp_target()?;

    let bitrate = command
        .output_bitrate_kbps()
        .unwrap_or_else(|| (input_bitrate as f64 * ESTIMATED_PASSTHROUGH) as u64);
    let bytes_sent = match last_activity {
        Some(since) if ready => {
            let secs = (now - since).num_seconds().max(0) as u64;
            bitrate * 1000 / 8 * secs
        }
        _ => 0,
    };
    Some(OutputMetrics::Estimated { bytes_sent, bitrate })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay_api::stub;
    use chrono::TimeZone;

    fn session(path: &str, bytes_sent: u64, bitrate: u64) -> SessionInfo {
        SessionInfo {
            path: Some(path.to_string()),
            bytes_sent,
            bitrate,
            ..Default::default()
        }
    }

    #[test]
    fn measured_wins_over_estimation() {
        let cmd = CommandLine::parse("-i x -an -f flv rtmp://out/live");
        let metrics = output_metrics(
            &[session("cam1", 4096, 450)],
            Some(&cmd),
            true,
            1000,
            None,
            Utc::now(),
        );
        assert_eq!(
            metrics,
            Some(OutputMetrics::Measured {
                bytes_sent: 4096,
                bitrate: 450
            })
        );
    }

    #[test]
    fn estimation_uses_passthrough_ratio_and_elapsed_time() {
        let cmd = CommandLine::parse("-i x -an -f flv rtmp://out/live");
        let since = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 10).unwrap();
        let metrics = output_metrics(&[], Some(&cmd), true, 1000, Some(since), now);
        // 80% of 1000 kbps over 10 seconds
        assert_eq!(
            metrics,
            Some(OutputMetrics::Estimated {
                bitrate: 800,
                bytes_sent: 800 * 1000 / 8 * 10,
            })
        );
    }

    #[test]
    fn estimation_prefers_explicit_output_bitrate() {
        let cmd = CommandLine::parse("-i x -b:v 600k -an -f flv rtmp://out/live");
        let metrics = output_metrics(&[], Some(&cmd), true, 1000, None, Utc::now());
        assert_eq!(
            metrics,
            Some(OutputMetrics::Estimated {
                bitrate: 600,
                bytes_sent: 0
            })
        );
    }

    #[test]
    fn no_rtmp_target_means_no_output_metrics() {
        let cmd = CommandLine::parse("-i x -an -f null -");
        assert_eq!(output_metrics(&[], Some(&cmd), true, 1000, None, Utc::now()), None);
        assert_eq!(output_metrics(&[], None, true, 1000, None, Utc::now()), None);
    }

    #[tokio::test]
    async fn snapshot_degrades_on_rtmp_session_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("mediamtx.yml");
        std::fs::write(
            &config_path,
            "paths:\n  cam1:\n    source: rtsp://cam1.local/stream\n    runOnReady: /usr/bin/ffmpeg -i rtsp://cam1.local/stream -an -f flv rtmp://out/live1\n    runOnReadyRestart: true\n",
        )
        .unwrap();
        let store = Arc::new(ConfigStore::new(config_path));

        let base_url = stub::spawn(|path, _| match path {
            "/v3/paths/list" => (
                200,
                r#"{"items":[{"name":"cam1","ready":true,"bytesReceived":1000,"bytesSent":10,"tracks":["H264"]}]}"#
                    .to_string(),
            ),
            "/v3/rtspsessions/list" => (
                200,
                r#"{"items":[{"id":"s1","path":"cam1","bytesReceived":500}]}"#.to_string(),
            ),
            // exhausts all retries
            "/v3/rtmpsessions/list" => (500, "{}".to_string()),
            _ => (404, "{}".to_string()),
        })
        .await;

        let relay = Arc::new(RelayClient::new(base_url, store.clone()).with_retry(
            crate::relay_api::RetryPolicy {
                max_attempts: 3,
                base_delay: std::time::Duration::from_millis(10),
            },
        ));
        let aggregator = StatusAggregator::new(relay, store);
        let snapshot = aggregator.snapshot().await.unwrap();

        assert_eq!(snapshot.paths.len(), 1);
        assert_eq!(snapshot.rtsp_sessions.len(), 1);
        assert!(snapshot.rtmp_sessions.is_empty());
        assert_eq!(snapshot.warnings.len(), 1);
        assert!(snapshot.warnings[0].contains("RTMP"));

        assert_eq!(snapshot.streams.len(), 1);
        assert_eq!(snapshot.streams[0].name, "cam1");
        assert_eq!(snapshot.streams[0].rtmp_url.as_deref(), Some("rtmp://out/live1"));
        assert_eq!(snapshot.totals.active_paths, 1);
    }
}
