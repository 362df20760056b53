//! mtx-camserver
//!
//! Camera configuration and reload control service for a MediaMTX relay.
//!
//! ## Architecture
//!
//! 1. ConfigStore - relay YAML document access, single-writer mutations
//! 2. ffmpeg_cmd - token-level editing of `runOnReady` invocations
//! 3. StreamLifecycle - pause/resume state machine over camera entries
//! 4. ReloadOrchestrator - relay restart + post-restart verification
//! 5. RelayClient - retrying reads from the relay's query API
//! 6. StatusAggregator - merged live/config status views
//! 7. DockerControl - container restart/status/log primitives
//! 8. WebAPI - REST endpoints
//!
//! ## Design Principles
//!
//! - The YAML file is the single source of truth; no in-memory cache
//! - Mutation durability and relay reload are reported separately
//! - Estimated metrics are tagged as such, never passed off as measured

pub mod config_store;
pub mod docker;
pub mod error;
pub mod ffmpeg_cmd;
pub mod lifecycle;
pub mod models;
pub mod relay_api;
pub mod reload;
pub mod state;
pub mod status_aggregator;
pub mod web_api;

pub use error::{Error, Result};
pub use state::{AppConfig, AppState};
