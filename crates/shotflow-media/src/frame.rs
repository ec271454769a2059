//! Single-frame extraction from video assets.

use async_trait::async_trait;
use image::RgbImage;
use tracing::debug;

use crate::command::{probe_duration, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Extracts single frames from a video asset.
///
/// Implementations surface a distinguishable tool-unavailable error
/// ([`MediaError::is_tool_unavailable`]) when the extraction binary is
/// missing, so callers that can proceed without a frame may degrade.
#[async_trait]
pub trait FrameGrabber: Send + Sync {
    /// Extract the frame at `timestamp_seconds` as an encoded image buffer.
    async fn extract_frame_at(
        &self,
        video_url: &str,
        timestamp_seconds: f64,
    ) -> MediaResult<Vec<u8>>;

    /// Duration of the asset in seconds.
    async fn duration(&self, video_url: &str) -> MediaResult<f64>;
}

/// FFmpeg-backed frame grabber.
#[derive(Debug, Default)]
pub struct FfmpegFrameGrabber {
    runner: FfmpegRunner,
}

impl FfmpegFrameGrabber {
    pub fn new() -> Self {
        Self {
            runner: FfmpegRunner::new(),
        }
    }
}

#[async_trait]
impl FrameGrabber for FfmpegFrameGrabber {
    async fn extract_frame_at(
        &self,
        video_url: &str,
        timestamp_seconds: f64,
    ) -> MediaResult<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("frame.png");

        let cmd = FfmpegCommand::new(video_url, &out)
            .seek(timestamp_seconds.max(0.0))
            .single_frame();
        self.runner.run(&cmd).await?;

        if !out.exists() {
            return Err(MediaError::FileNotFound(out));
        }
        let bytes = tokio::fs::read(&out).await?;
        debug!(
            video_url,
            timestamp_seconds,
            bytes = bytes.len(),
            "Extracted frame"
        );
        Ok(bytes)
    }

    async fn duration(&self, video_url: &str) -> MediaResult<f64> {
        probe_duration(video_url).await
    }
}

/// Decode an encoded image buffer into RGB pixels.
pub fn decode_rgb(buffer: &[u8]) -> MediaResult<RgbImage> {
    let img = image::load_from_memory(buffer)
        .map_err(|e| MediaError::image_decode(e.to_string()))?;
    Ok(img.to_rgb8())
}

/// Encode RGB pixels as PNG.
pub fn encode_png(img: &RgbImage) -> MediaResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut out);
    img.write_to(&mut cursor, image::ImageOutputFormat::Png)
        .map_err(|e| MediaError::ImageEncode(e.to_string()))?;
    Ok(out)
}
