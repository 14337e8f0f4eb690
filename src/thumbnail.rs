//! Thumbnail generation for downloaded video files.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use crate::Result;

/// Extensions the frame extractor is known to handle.
const FRAME_CAPABLE_EXTENSIONS: [&str; 3] = ["mkv", "mp4", "webm"];

/// Width in pixels every thumbnail is resized to.
const THUMBNAIL_WIDTH: u32 = 90;

/// Pulls a single frame out of a local video file.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Writes the frame at `offset_secs` into `out`.
    ///
    /// Callers judge success by output-file existence; a clean return here
    /// does not guarantee a frame was produced.
    ///
    /// # Errors
    ///
    /// Returns an error if the extraction process cannot be started.
    async fn extract_frame(&self, video: &Path, offset_secs: u32, out: &Path) -> Result<()>;
}

/// Resizes and re-encodes a thumbnail image in place.
#[async_trait]
pub trait ImageResizer: Send + Sync {
    /// Resizes the image at `path` to exactly `width` x `height`.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be decoded or re-encoded.
    async fn resize(&self, path: &Path, width: u32, height: u32) -> Result<()>;
}

/// `ffmpeg`-backed frame extraction.
#[derive(Debug, Clone)]
pub struct FfmpegFrameExtractor {
    ffmpeg_path: String,
}

impl FfmpegFrameExtractor {
    /// Creates an extractor invoking the given `ffmpeg` executable.
    #[must_use]
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    fn build_args(video: &Path, offset_secs: u32, out: &Path) -> Vec<String> {
        vec![
            "-ss".to_string(),
            offset_secs.to_string(),
            "-i".to_string(),
            video.display().to_string(),
            "-vframes".to_string(),
            "1".to_string(),
            out.display().to_string(),
        ]
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_frame(&self, video: &Path, offset_secs: u32, out: &Path) -> Result<()> {
        let output = Command::new(&self.ffmpeg_path)
            .args(Self::build_args(video, offset_secs, out))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        // ffmpeg writes diagnostics to stderr even on success, and may exit
        // non-zero while still having produced a usable frame.
        if !output.status.success() {
            log::debug!(
                "ffmpeg exited with {} for {}: {}",
                output.status,
                video.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

/// image-crate-backed resizing; always re-encodes as JPEG.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegResizer;

#[async_trait]
impl ImageResizer for JpegResizer {
    async fn resize(&self, path: &Path, width: u32, height: u32) -> Result<()> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let image = image::open(&path)?;
            let resized = image.resize_exact(width, height, image::imageops::FilterType::Triangle);
            resized.save_with_format(&path, image::ImageFormat::Jpeg)?;
            Ok(())
        })
        .await??;
        Ok(())
    }
}

/// Generates a preview thumbnail for a downloaded video.
///
/// Only file types the frame extractor is known to handle are attempted;
/// anything else returns `None` without touching the extractor. The resize
/// step targets a fixed width of 90 with the probed height, matching the
/// display size expected by the messaging service.
pub struct ThumbnailGenerator {
    frames: Arc<dyn FrameExtractor>,
    resizer: Arc<dyn ImageResizer>,
}

impl ThumbnailGenerator {
    /// Creates a generator over the given collaborators.
    #[must_use]
    pub fn new(frames: Arc<dyn FrameExtractor>, resizer: Arc<dyn ImageResizer>) -> Self {
        Self { frames, resizer }
    }

    /// Extracts a frame at `offset_secs` into a JPEG inside `output_dir`,
    /// named after the source file plus a timestamp, then resizes it to
    /// width 90 x `probed_height`.
    ///
    /// Returns `None` when the video's extension is not frame-capable or no
    /// output file materialized. Resize failures keep the unresized frame.
    pub async fn generate(
        &self,
        video: &Path,
        output_dir: &Path,
        offset_secs: u32,
        probed_height: u32,
    ) -> Option<PathBuf> {
        if !is_frame_capable(video) {
            return None;
        }

        let out = output_dir.join(frame_file_name(video));
        if let Err(e) = self.frames.extract_frame(video, offset_secs, &out).await {
            log::warn!("frame extraction failed for {}: {e}", video.display());
        }

        // The output file is the only reliable success signal.
        let produced = tokio::fs::try_exists(&out).await.unwrap_or(false);
        if !produced {
            log::debug!("no thumbnail frame produced for {}", video.display());
            return None;
        }

        if probed_height > 0
            && let Err(e) = self
                .resizer
                .resize(&out, THUMBNAIL_WIDTH, probed_height)
                .await
        {
            log::warn!("thumbnail resize failed for {}: {e}", out.display());
        }

        Some(out)
    }
}

/// Frame file name: the source's stem plus a fresh timestamp. Downloaded
/// sources already carry a user-and-timestamp prefix, so frames from
/// concurrent sessions never collide in the shared directory.
fn frame_file_name(video: &Path) -> String {
    let stem = video
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("frame");
    format!("{stem}-{}.jpg", chrono::Utc::now().timestamp_millis())
}

/// Whether the frame extractor is known to handle this file type.
fn is_frame_capable(video: &Path) -> bool {
    video
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            FRAME_CAPABLE_EXTENSIONS.iter().any(|known| *known == ext)
        })
}
