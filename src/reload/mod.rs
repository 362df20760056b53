//! ReloadOrchestrator - applying configuration to the relay
//!
//! ## Responsibilities
//!
//! - Restart the relay container after a configuration mutation
//! - Wait for it to settle, then verify liveness once
//! - Report the outcome separately from the mutation's durability
//!
//! A restart failure is typically a configuration-syntax problem, not a
//! transient fault, so there is no retry at this level. Verification
//! failure downgrades the outcome to a warning: the configuration is
//! already durable and the operator can restart the relay manually.

use crate::docker::DockerControl;
use serde::Serialize;
use std::time::Duration;

/// How long the relay gets to come back up before the liveness check
const SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Result of one reload attempt; ephemeral, never persisted
#[derive(Debug, Clone, Serialize)]
pub struct ReloadOutcome {
    /// The restart command itself succeeded
    pub succeeded: bool,
    /// The relay reported running after the settling delay
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReloadOutcome {
    /// Operator-facing warning, present unless the reload fully succeeded
    pub fn warning(&self) -> Option<String> {
        if !self.succeeded {
            Some(format!(
                "configuration saved, but the relay restart failed ({}); restart it manually to apply changes",
                self.error.as_deref().unwrap_or("unknown error")
            ))
        } else if !self.verified {
            Some(format!(
                "relay restarted, but liveness was not confirmed ({})",
                self.error.as_deref().unwrap_or("no status reported")
            ))
        } else {
            None
        }
    }
}

/// ReloadOrchestrator instance
pub struct ReloadOrchestrator {
    docker: DockerControl,
    container: String,
    settle_delay: Duration,
}

impl ReloadOrchestrator {
    /// Orchestrator for the given relay container
    pub fn new(docker: DockerControl, container: impl Into<String>) -> Self {
        Self {
            docker,
            container: container.into(),
            settle_delay: SETTLE_DELAY,
        }
    }

    #[cfg(test)]
    fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Restart the relay and verify it came back.
    ///
    /// Blocks the caller for the restart plus the settling delay; must not
    /// run while a ConfigStore mutation is open.
    pub async fn reload(&self) -> ReloadOutcome {
        tracing::info!(container = %self.container, "reloading relay configuration");

        if let Err(e) = self.docker.restart(&self.container).await {
            tracing::error!(container = %self.container, error = %e, "relay restart failed");
            return ReloadOutcome {
                succeeded: false,
                verified: false,
                error: Some(e.to_string()),
            };
        }

        tracing::info!(
            container = %self.container,
            delay_secs = self.settle_delay.as_secs(),
            "restart issued, waiting for the relay to settle"
        );
        tokio::time::sleep(self.settle_delay).await;

        match self.docker.status(&self.container).await {
            Ok(Some(status)) => {
                tracing::info!(container = %self.container, status = %status, "relay running after reload");
                ReloadOutcome {
                    succeeded: true,
                    verified: true,
                    error: None,
                }
            }
            Ok(None) => {
                tracing::warn!(container = %self.container, "relay not reported running after reload");
                ReloadOutcome {
                    succeeded: true,
                    verified: false,
                    error: Some("container not reported running after restart".to_string()),
                }
            }
            Err(e) => {
                tracing::warn!(container = %self.container, error = %e, "relay liveness check failed");
                ReloadOutcome {
                    succeeded: true,
                    verified: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
