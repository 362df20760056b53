//! Configuration document types
//!
//! The shape mirrors the relay's own YAML schema: field names and the
//! `paths.<name>.runOnReady` convention are fixed, because the relay parses
//! the same file. Keys this service does not understand are captured in
//! flattened `extra` maps so a read-modify-write cycle never drops them.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Root configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Internal user list; the first entry supplies Basic-auth credentials
    /// for the relay's query API
    #[serde(
        rename = "authInternalUsers",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub auth_internal_users: Option<Vec<AuthUser>>,

    /// Camera name -> entry. Names are unique by construction of the map.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub paths: BTreeMap<String, CameraEntry>,

    /// All other relay settings, preserved verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One internal user record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One configured camera path
///
/// Shape invariant: while `paused` is set, `runOnReady` is cleared and the
/// `original*` fields hold the pre-pause invocation; when not paused the
/// `original*` fields are absent. `lifecycle::StreamState` is the typed view
/// of these combinations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraEntry {
    /// RTSP source URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Full transcode invocation executed by the relay when the path is ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_on_ready: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub run_on_ready_restart: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,

    /// Pre-pause invocation, populated only while paused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_run_on_ready: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_run_on_ready_restart: Option<bool>,

    /// Relay path options this service does not manage, preserved verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CameraEntry {
    /// Entry for a freshly added camera: RTSP source plus the canonical
    /// transcode command targeting the given RTMP URL
    pub fn new(rtsp_url: &str, rtmp_url: &str) -> Self {
        Self {
            source: Some(rtsp_url.to_string()),
            run_on_ready: Some(crate::ffmpeg_cmd::default_command(rtsp_url, rtmp_url)),
            run_on_ready_restart: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_survive_round_trip() {
        let yaml = r#"
logLevel: info
rtspAddress: :8554
authInternalUsers:
  - user: admin
    pass: secret
    permissions:
      - action: publish
paths:
  cam1:
    source: rtsp://cam.local/stream
    runOnReady: /usr/bin/ffmpeg -i x -an -f flv rtmp://out/live
    runOnReadyRestart: true
    sourceOnDemand: true
    record: false
"#;
        let doc: ConfigDocument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(doc.extra.get("logLevel").unwrap(), &Value::from("info"));
        let cam = doc.paths.get("cam1").unwrap();
        assert_eq!(cam.extra.get("sourceOnDemand").unwrap(), &Value::from(true));
        assert!(doc.auth_internal_users.as_ref().unwrap()[0]
            .extra
            .contains_key("permissions"));

        let rendered = serde_yaml::to_string(&doc).unwrap();
        let reparsed: ConfigDocument = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn explicit_null_run_on_ready_round_trips_as_absent() {
        let yaml = "paths:\n  cam1:\n    runOnReady: null\n    paused: true\n";
        let doc: ConfigDocument = serde_yaml::from_str(yaml).unwrap();
        assert!(doc.paths["cam1"].run_on_ready.is_none());

        let rendered = serde_yaml::to_string(&doc).unwrap();
        let reparsed: ConfigDocument = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(reparsed, doc);
    }
}
