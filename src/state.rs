//! Application state
//!
//! Holds the environment-derived configuration and the shared components.

use crate::config_store::ConfigStore;
use crate::docker::DockerControl;
use crate::lifecycle::StreamLifecycle;
use crate::relay_api::RelayClient;
use crate::reload::ReloadOrchestrator;
use crate::status_aggregator::StatusAggregator;
use std::path::PathBuf;
use std::sync::Arc;

/// Application configuration, read once at process start
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen port
    pub port: u16,
    /// Listen host
    pub host: String,
    /// Allowed CORS origins
    pub cors_origins: Vec<String>,
    /// Relay YAML configuration file
    pub config_file: PathBuf,
    /// Relay query API base URL
    pub relay_api_url: String,
    /// Relay container name for restart/liveness
    pub relay_container: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            cors_origins: std::env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            config_file: std::env::var("CONFIG_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("mediamtx.yml")),
            relay_api_url: std::env::var("MEDIAMTX_API_URL")
                .unwrap_or_else(|_| "http://mediamtx:9997".to_string()),
            relay_container: std::env::var("RELAY_CONTAINER")
                .unwrap_or_else(|_| "mediamtx".to_string()),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<ConfigStore>,
    pub lifecycle: Arc<StreamLifecycle>,
    pub relay: Arc<RelayClient>,
    pub reload: Arc<ReloadOrchestrator>,
    pub status: Arc<StatusAggregator>,
    pub docker: DockerControl,
}

impl AppState {
    /// Wire up all components from the configuration
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(ConfigStore::new(config.config_file.clone()));
        let lifecycle = Arc::new(StreamLifecycle::new(store.clone()));
        let relay = Arc::new(RelayClient::new(config.relay_api_url.clone(), store.clone()));
        let docker = DockerControl;
        let reload = Arc::new(ReloadOrchestrator::new(
            docker.clone(),
            config.relay_container.clone(),
        ));
        let status = Arc::new(StatusAggregator::new(relay.clone(), store.clone()));

        Self {
            config,
            store,
            lifecycle,
            relay,
            reload,
            status,
            docker,
        }
    }
}
