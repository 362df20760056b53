//! RelayClient - relay query API adapter
//!
//! ## Responsibilities
//!
//! - Authenticated reads from the relay's HTTP query API (paths, RTSP
//!   sessions, RTMP sessions, global config)
//! - Bounded retry with exponential backoff for transient failures
//! - Startup connectivity probe
//!
//! Credentials come from the configuration document on every call, so a
//! credential edit takes effect without restarting this service.

use crate::config_store::ConfigStore;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Attempts for the startup connectivity probe
const PROBE_ATTEMPTS: u32 = 10;
/// Fixed wait between probe attempts
const PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Retry parameters for query API calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based):
    /// `base_delay * 2^(attempt-1)`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// One relay path as reported by `/v3/paths/list` / `/v3/paths/get`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PathInfo {
    pub name: String,
    pub ready: bool,
    pub ready_time: Option<String>,
    pub tracks: Vec<String>,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub source: Option<serde_json::Value>,
    pub last_activity: Option<DateTime<Utc>>,
}

/// One RTSP or RTMP session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionInfo {
    pub id: Option<String>,
    pub path: Option<String>,
    pub state: Option<String>,
    pub remote_addr: Option<String>,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub bitrate: u64,
}

/// Paged list wrapper used by the relay's list endpoints
#[derive(Debug, Clone, Default, Deserialize)]
struct ItemList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// RelayClient instance
pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
    store: Arc<ConfigStore>,
    retry: RetryPolicy,
}

impl RelayClient {
    /// Client for the query API at `base_url`
    pub fn new(base_url: impl Into<String>, store: Arc<ConfigStore>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            store,
            retry: RetryPolicy::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Authenticated GET with bounded retry.
    ///
    /// 5xx responses and connection-level failures (refused, DNS, timeout)
    /// are retried with exponential backoff; 4xx and everything else
    /// propagates immediately.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let (user, pass) = self.store.auth_credentials().await?;
        let url = format!("{}{}", self.base_url, path);

        let mut attempt = 1u32;
        loop {
            tracing::debug!(url = %url, attempt, max = self.retry.max_attempts, "relay API call");
            match self
                .client
                .get(&url)
                .basic_auth(&user, Some(&pass))
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp.json().await?);
                    }
                    if status.is_server_error() && attempt < self.retry.max_attempts {
                        let delay = self.retry.backoff(attempt);
                        tracing::warn!(
                            url = %url,
                            status = status.as_u16(),
                            delay_ms = delay.as_millis() as u64,
                            "relay server error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(Error::upstream(
                        Some(status.as_u16()),
                        format!("relay returned HTTP {} for {}", status.as_u16(), path),
                    ));
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        url = %url,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "relay connection error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    return Err(Error::upstream(
                        None,
                        format!("relay unreachable after {} attempts: {}", attempt, e),
                    ));
                }
                Err(e) => return Err(Error::Http(e)),
            }
        }
    }

    /// All configured paths known to the relay
    pub async fn list_paths(&self) -> Result<Vec<PathInfo>> {
        Ok(self.get::<ItemList<PathInfo>>("/v3/paths/list").await?.items)
    }

    /// Runtime detail for one path
    pub async fn get_path(&self, name: &str) -> Result<PathInfo> {
        self.get(&format!("/v3/paths/get/{}", name)).await
    }

    pub async fn list_rtsp_sessions(&self) -> Result<Vec<SessionInfo>> {
        Ok(self
            .get::<ItemList<SessionInfo>>("/v3/rtspsessions/list")
            .await?
            .items)
    }

    pub async fn list_rtmp_sessions(&self) -> Result<Vec<SessionInfo>> {
        Ok(self
            .get::<ItemList<SessionInfo>>("/v3/rtmpsessions/list")
            .await?
            .items)
    }

    /// Relay global configuration, passed through verbatim
    pub async fn global_config(&self) -> Result<serde_json::Value> {
        self.get("/v3/config/global/get").await
    }

    /// Single unretried reachability check, used by the health endpoint
    pub async fn ping(&self) -> bool {
        let (user, pass) = match self.store.auth_credentials().await {
            Ok(creds) => creds,
            Err(_) => return false,
        };
        let url = format!("{}/v3/config/global/get", self.base_url);
        match self.client.get(&url).basic_auth(&user, Some(&pass)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Startup connectivity probe: up to ten attempts at a fixed interval.
    /// Never fatal; the service starts either way and API calls surface
    /// their own errors later.
    pub async fn probe(&self) -> bool {
        for attempt in 1..=PROBE_ATTEMPTS {
            tracing::info!(attempt, max = PROBE_ATTEMPTS, "testing relay connectivity");
            if self.ping().await {
                tracing::info!("relay connection successful");
                return true;
            }
            if attempt < PROBE_ATTEMPTS {
                tokio::time::sleep(PROBE_INTERVAL).await;
            }
        }
        tracing::warn!(
            "relay unreachable after {} attempts; starting anyway, API calls may fail",
            PROBE_ATTEMPTS
        );
        false
    }
}

/// Minimal scripted HTTP server for exercising the retry path in tests
#[cfg(test)]
pub(crate) mod stub {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Serve canned (status, body) responses chosen per request path and
    /// 1-based hit count. Returns the base URL.
    pub(crate) async fn spawn<F>(handler: F) -> String
    where
        F: Fn(&str, u32) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits: Mutex<HashMap<String, u32>> = Mutex::new(HashMap::new());

        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = vec![0u8; 8192];
                let n = sock.read(&mut buf).await.unwrap_or(0);
                if n == 0 {
                    continue;
                }
                let head = String::from_utf8_lossy(&buf[..n]).into_owned();
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                let hit = {
                    let mut map = hits.lock().unwrap();
                    let count = map.entry(path.clone()).or_insert(0);
                    *count += 1;
                    *count
                };
                let (status, body) = handler(&path, hit);
                let reason = match status {
                    200 => "OK",
                    404 => "Not Found",
                    500 => "Internal Server Error",
                    503 => "Service Unavailable",
                    _ => "Error",
                };
                let resp = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                let _ = sock.write_all(resp.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });

        format!("http://{}", addr)
    }
}
