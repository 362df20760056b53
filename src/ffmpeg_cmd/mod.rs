//! ffmpeg command line editing for `runOnReady` entries
//!
//! The relay stores each camera's transcode invocation as one flat string.
//! This module models it as an ordered token list with a small table of
//! recognized flags, so settings edits overwrite or insert flag/value pairs
//! instead of doing ad hoc string surgery.
//!
//! ## Layout invariants
//!
//! - A recognized flag is always followed by exactly one value token.
//! - Unknown tokens are preserved verbatim and never reordered.
//! - New flag/value pairs are inserted immediately before the no-audio
//!   anchor (`-an`); everything after the anchor (output format, RTMP URL,
//!   reconnect options) keeps its position.

use serde::{Deserialize, Serialize};

/// Video filter flag; its value carries the `scale=W:H` expression
const FLAG_SCALE: &str = "-vf";
/// Peak bitrate flag, value in `{n}k` form
const FLAG_MAXRATE: &str = "-maxrate";
/// Rate-control buffer flag, always kept at twice the maxrate
const FLAG_BUFSIZE: &str = "-bufsize";
/// Output framerate flag
const FLAG_FRAMERATE: &str = "-r";
/// Constant rate factor flag (lower = higher quality)
const FLAG_CRF: &str = "-crf";
/// Encoder speed/quality preset flag
const FLAG_PRESET: &str = "-preset";

/// Insertion anchor: positional flags after it must remain last
const ANCHOR: &str = "-an";

/// Flattened view of the tunable encoder parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSettings {
    /// `W:H` as used by the scale filter
    pub resolution: String,
    /// kbps, no unit suffix
    pub bitrate: String,
    pub framerate: String,
    /// CRF value
    pub quality: String,
    pub preset: String,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            resolution: "640:360".to_string(),
            bitrate: "400".to_string(),
            framerate: "15".to_string(),
            quality: "32".to_string(),
            preset: "veryfast".to_string(),
        }
    }
}

/// Requested parameter changes; any subset may be present
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub resolution: Option<String>,
    pub bitrate: Option<String>,
    pub framerate: Option<String>,
    pub quality: Option<String>,
    pub preset: Option<String>,
}

impl SettingsPatch {
    /// Validate field formats before any token surgery happens
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(res) = &self.resolution {
            let re = regex::Regex::new(r"^\d+:\d+$").unwrap();
            if !re.is_match(res) {
                return Err(crate::Error::Validation(format!(
                    "resolution must be in W:H format, got '{}'",
                    res
                )));
            }
        }
        for (field, value) in [
            ("bitrate", &self.bitrate),
            ("framerate", &self.framerate),
            ("quality", &self.quality),
        ] {
            if let Some(v) = value {
                if v.parse::<u32>().is_err() {
                    return Err(crate::Error::Validation(format!(
                        "{} must be a positive integer, got '{}'",
                        field, v
                    )));
                }
            }
        }
        if let Some(p) = &self.preset {
            if p.trim().is_empty() {
                return Err(crate::Error::Validation(
                    "preset must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Ordered token sequence of one ffmpeg invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    tokens: Vec<String>,
}

impl CommandLine {
    /// Split a command string on whitespace into tokens
    pub fn parse(command: &str) -> Self {
        Self {
            tokens: command.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// Serialize back to the flat string the relay executes
    pub fn render(&self) -> String {
        self.tokens.join(" ")
    }

    fn position(&self, flag: &str) -> Option<usize> {
        self.tokens.iter().position(|t| t == flag)
    }

    fn flag_value(&self, flag: &str) -> Option<&str> {
        let idx = self.position(flag)?;
        self.tokens.get(idx + 1).map(String::as_str)
    }

    /// Overwrite a flag's value in place, or insert the flag/value pair
    /// immediately before the anchor when the flag is absent.
    ///
    /// Returns false when neither the flag nor the anchor exists; the
    /// requested change is skipped in that case.
    fn set_flag(&mut self, flag: &str, value: String) -> bool {
        if let Some(idx) = self.position(flag) {
            if idx + 1 < self.tokens.len() {
                self.tokens[idx + 1] = value;
            } else {
                // flag dangling at the end of the line; give it a value slot
                self.tokens.push(value);
            }
            return true;
        }
        match self.position(ANCHOR) {
            Some(anchor) => {
                self.tokens.insert(anchor, flag.to_string());
                self.tokens.insert(anchor + 1, value);
                true
            }
            None => {
                tracing::warn!(flag = flag, "anchor token missing, skipping flag insertion");
                false
            }
        }
    }

    /// Read the current settings, falling back to the documented default
    /// for each flag independently
    pub fn settings(&self) -> StreamSettings {
        let mut settings = StreamSettings::default();

        if let Some(value) = self.flag_value(FLAG_SCALE) {
            let re = regex::Regex::new(r"scale=(\d+:\d+)").unwrap();
            if let Some(caps) = re.captures(value) {
                settings.resolution = caps[1].to_string();
            }
        }
        if let Some(value) = self.flag_value(FLAG_MAXRATE) {
            settings.bitrate = value.trim_end_matches('k').to_string();
        }
        if let Some(value) = self.flag_value(FLAG_FRAMERATE) {
            settings.framerate = value.to_string();
        }
        if let Some(value) = self.flag_value(FLAG_CRF) {
            settings.quality = value.to_string();
        }
        if let Some(value) = self.flag_value(FLAG_PRESET) {
            settings.preset = value.to_string();
        }

        settings
    }

    /// Apply the requested parameter changes.
    ///
    /// A bitrate change always recomputes `-bufsize` as twice the bitrate
    /// in the same operation; the two are not independent parameters.
    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(resolution) = &patch.resolution {
            self.set_flag(FLAG_SCALE, format!("scale={}", resolution));
        }
        if let Some(bitrate) = &patch.bitrate {
            self.set_flag(FLAG_MAXRATE, format!("{}k", bitrate));
            match bitrate.parse::<u64>() {
                Ok(b) => {
                    self.set_flag(FLAG_BUFSIZE, format!("{}k", b * 2));
                }
                Err(_) => {
                    tracing::warn!(bitrate = %bitrate, "non-numeric bitrate, bufsize left unchanged");
                }
            }
        }
        if let Some(framerate) = &patch.framerate {
            self.set_flag(FLAG_FRAMERATE, framerate.clone());
        }
        if let Some(quality) = &patch.quality {
            self.set_flag(FLAG_CRF, quality.clone());
        }
        if let Some(preset) = &patch.preset {
            self.set_flag(FLAG_PRESET, preset.clone());
        }
    }

    /// Extract the embedded RTMP output target, if any
    pub fn rtmp_target(&self) -> Option<String> {
        extract_rtmp_target(&self.render())
    }

    /// Explicit output video bitrate (`-b:v {n}k`), when present
    pub fn output_bitrate_kbps(&self) -> Option<u64> {
        self.flag_value("-b:v")
            .and_then(|v| v.trim_end_matches('k').parse().ok())
    }
}

/// First `rtmp://...` URL found in a command string
pub fn extract_rtmp_target(command: &str) -> Option<String> {
    let re = regex::Regex::new(r#"rtmp://[^\s"']+"#).unwrap();
    re.find(command).map(|m| m.as_str().to_string())
}

/// Canonical transcode invocation used when a camera is added or its
/// source/target URLs are rewritten. The trailing reconnect/timeout options
/// must stay after the output URL.
pub fn default_command(rtsp_url: &str, rtmp_url: &str) -> String {
    format!(
        "/usr/bin/ffmpeg -rtsp_transport tcp -i {rtsp_url} -c:v libx264 -preset veryfast \
         -crf 32 -maxrate 400k -bufsize 800k -g 30 -keyint_min 15 -vf scale=640:360 -r 15 \
         -an -f flv {rtmp_url} -y -reconnect 1 -reconnect_at_eof 1 -reconnect_streamed 1 \
         -reconnect_delay_max 2 -timeout 5000000"
    )
}
