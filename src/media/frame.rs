//! Still-frame extraction for video thumbnails.
//!
//! [`FfmpegFrameExtractor`] shells out to `ffmpeg` and reads a single PNG
//! frame from its stdout. Tests and embedders can supply their own
//! [`FrameExtractor`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use tokio::process::Command;

/// Produces a decoded frame from a video file.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Decode the frame at `at`. Fails if the video is shorter than `at`
    /// or cannot be read.
    async fn extract_frame(&self, video: &Path, at: Duration) -> Result<DynamicImage>;
}

/// Frame extractor backed by the `ffmpeg` binary.
pub struct FfmpegFrameExtractor {
    binary: PathBuf,
}

impl FfmpegFrameExtractor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegFrameExtractor {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_frame(&self, video: &Path, at: Duration) -> Result<DynamicImage> {
        let output = Command::new(&self.binary)
            .arg("-v")
            .arg("error")
            .arg("-ss")
            .arg(format!("{:.3}", at.as_secs_f64()))
            .arg("-i")
            .arg(video)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.binary.display()))?;

        if !output.status.success() {
            bail!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        // ffmpeg succeeds with no output when seeking past the end
        if output.stdout.is_empty() {
            bail!(
                "no frame at {:.3}s in {}",
                at.as_secs_f64(),
                video.display()
            );
        }

        let bytes = output.stdout;
        tokio::task::spawn_blocking(move || {
            image::load_from_memory_with_format(&bytes, image::ImageFormat::Png)
                .context("decode extracted frame")
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_fails() {
        let extractor = FfmpegFrameExtractor::new("/nonexistent/ffmpeg-binary");
        let err = extractor
            .extract_frame(Path::new("clip.mov"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to run"));
    }
}
