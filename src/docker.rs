//! Docker CLI wrapper
//!
//! The relay exposes no reliable in-process reload, so the container
//! runtime is the control surface: `docker restart` applies configuration,
//! `docker ps` answers liveness, `docker logs` feeds the log endpoint.

use crate::error::{Error, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::process::Command;

/// Containers whose logs may be fetched through the API
const KNOWN_CONTAINERS: [&str; 3] = ["mediamtx", "mtx-api", "mtx-ui"];

/// One parsed log line
#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    /// Retrieval time; docker's own timestamps are not parsed
    pub timestamp: String,
    pub message: String,
    pub level: &'static str,
}

/// Log fetch result for one container
#[derive(Debug, Clone, Serialize)]
pub struct ContainerLogs {
    pub container: String,
    pub logs: Vec<LogLine>,
}

/// Docker CLI handle
#[derive(Debug, Clone, Default)]
pub struct DockerControl;

impl DockerControl {
    /// Whether a container name is on the log-retrieval allow-list
    pub fn is_known_container(name: &str) -> bool {
        KNOWN_CONTAINERS.contains(&name)
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("docker").args(args).output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Docker(format!(
                "docker {} failed: {}",
                args.first().copied().unwrap_or(""),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Restart a container, returning its stdout (the container name)
    pub async fn restart(&self, container: &str) -> Result<String> {
        tracing::info!(container = container, "restarting container");
        self.run(&["restart", container]).await
    }

    /// Status line of a running container, `None` when it is not up
    pub async fn status(&self, container: &str) -> Result<Option<String>> {
        let filter = format!("name={}", container);
        let stdout = self
            .run(&["ps", "--filter", &filter, "--format", "{{.Status}}"])
            .await?;
        let status = stdout.trim();
        if status.is_empty() {
            Ok(None)
        } else {
            Ok(Some(status.to_string()))
        }
    }

    /// Tail of a container's logs, classified per line
    pub async fn logs(&self, container: &str, lines: u32) -> Result<ContainerLogs> {
        if !Self::is_known_container(container) {
            return Err(Error::Validation(format!(
                "unknown container: {}",
                container
            )));
        }
        let tail = lines.to_string();
        let stdout = self.run(&["logs", "--tail", &tail, container]).await?;
        let now = Utc::now().to_rfc3339();
        let logs = stdout
            .lines()
            .map(|line| LogLine {
                timestamp: now.clone(),
                message: line.to_string(),
                level: classify_level(line),
            })
            .collect();
        Ok(ContainerLogs {
            container: container.to_string(),
            logs,
        })
    }
}

fn classify_level(line: &str) -> &'static str {
    let lower = line.to_lowercase();
    if lower.contains("error") {
        "error"
    } else if lower.contains("warn") {
        "warning"
    } else if lower.contains("debug") {
        "debug"
    } else {
        "info"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list() {
        assert!(DockerControl::is_known_container("mediamtx"));
        assert!(!DockerControl::is_known_container("postgres"));
        assert!(!DockerControl::is_known_container("mediamtx; rm -rf /"));
    }

    #[test]
    fn level_classification() {
        assert_eq!(classify_level("2024/01/01 ERROR boom"), "error");
        assert_eq!(classify_level("WARN something odd"), "warning");
        assert_eq!(classify_level("debug: details"), "debug");
        assert_eq!(classify_level("listener opened"), "info");
    }
}
