//! Media metadata probing via the external `ffprobe` tool.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::Result;

/// Dimensions and duration attached to a re-uploaded video.
///
/// Every field defaults to 0 when the underlying file does not report it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaMetadata {
    /// Playback duration in whole seconds.
    pub duration_secs: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

impl MediaMetadata {
    /// The frame offset used for the thumbnail: 10 seconds into the file
    /// when it is longer than 10 seconds, else 1 second.
    #[must_use]
    pub const fn screenshot_offset_secs(&self) -> u32 {
        if self.duration_secs > 10 { 10 } else { 1 }
    }
}

/// Raw stream facts as reported by the extraction tool; `None` when absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawMediaInfo {
    /// Container or stream duration in seconds.
    pub duration_secs: Option<f64>,
    /// Width of the first video stream.
    pub width: Option<u32>,
    /// Height of the first video stream.
    pub height: Option<u32>,
}

/// Reads raw stream facts from a local media file.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Extracts duration and dimensions from the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the extraction tool cannot be invoked or its
    /// output cannot be parsed.
    async fn extract(&self, path: &Path) -> Result<RawMediaInfo>;
}

/// `ffprobe`-backed metadata extraction.
#[derive(Debug, Clone)]
pub struct FfprobeExtractor {
    ffprobe_path: String,
}

impl FfprobeExtractor {
    /// Creates an extractor invoking the given `ffprobe` executable.
    #[must_use]
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    fn build_args(path: &Path) -> Vec<String> {
        vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            path.display().to_string(),
        ]
    }
}

#[async_trait]
impl MetadataExtractor for FfprobeExtractor {
    async fn extract(&self, path: &Path) -> Result<RawMediaInfo> {
        let output = Command::new(&self.ffprobe_path)
            .args(Self::build_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            log::debug!(
                "ffprobe exited with {} for {}: {}",
                output.status,
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(RawMediaInfo::default());
        }

        let value: Value = serde_json::from_slice(&output.stdout)?;
        Ok(parse_probe_output(&value))
    }
}

/// Pulls duration and first-video-stream dimensions out of ffprobe's JSON.
fn parse_probe_output(value: &Value) -> RawMediaInfo {
    let video_stream = value["streams"]
        .as_array()
        .and_then(|streams| streams.iter().find(|s| s["codec_type"] == "video"));

    // ffprobe reports durations as decimal strings.
    let duration_secs = value["format"]["duration"]
        .as_str()
        .or_else(|| video_stream.and_then(|s| s["duration"].as_str()))
        .and_then(|raw| raw.parse::<f64>().ok());

    let dimension = |key: &str| {
        video_stream
            .and_then(|s| s[key].as_u64())
            .and_then(|raw| u32::try_from(raw).ok())
    };

    RawMediaInfo {
        duration_secs,
        width: dimension("width"),
        height: dimension("height"),
    }
}

/// Best-effort metadata probe.
///
/// Extraction failures and missing fields degrade to zeroed metadata; a
/// probe never fails the session.
pub struct MetadataProbe {
    extractor: Arc<dyn MetadataExtractor>,
}

impl MetadataProbe {
    /// Creates a probe over the given extractor.
    #[must_use]
    pub fn new(extractor: Arc<dyn MetadataExtractor>) -> Self {
        Self { extractor }
    }

    /// Probes `path`, defaulting unavailable fields to 0.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub async fn probe(&self, path: &Path) -> MediaMetadata {
        let raw = match self.extractor.extract(path).await {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("metadata probe failed for {}: {e}", path.display());
                RawMediaInfo::default()
            }
        };

        MediaMetadata {
            duration_secs: raw.duration_secs.map_or(0, |secs| secs as u32),
            width: raw.width.unwrap_or(0),
            height: raw.height.unwrap_or(0),
        }
    }
}
