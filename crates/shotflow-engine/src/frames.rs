//! Frame extraction: bridge frames and best-of-N representative frames.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use shotflow_media::{analysis, frame::decode_rgb, FrameGrabber};
use shotflow_models::{FrameBridge, ShotId};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::providers::ObjectStorage;

/// Extracts single frames from generated videos and uploads them for use
/// as continuity anchors.
pub struct FrameExtraction {
    grabber: Arc<dyn FrameGrabber>,
    storage: Arc<dyn ObjectStorage>,
    candidates: u32,
    tail_offset_secs: f64,
}

impl FrameExtraction {
    pub fn new(
        grabber: Arc<dyn FrameGrabber>,
        storage: Arc<dyn ObjectStorage>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            grabber,
            storage,
            candidates: config.frame_candidates.max(1),
            tail_offset_secs: config.bridge_tail_offset_secs,
        }
    }

    /// Extract a frame near the end of a video and upload it as the next
    /// shot's bridge frame.
    pub async fn extract_bridge_frame(
        &self,
        user_id: &str,
        video_url: &str,
        source_shot_id: Option<&ShotId>,
    ) -> EngineResult<FrameBridge> {
        let duration = self.grabber.duration(video_url).await?;
        let timestamp = (duration - self.tail_offset_secs).max(0.0);
        let bytes = self.grabber.extract_frame_at(video_url, timestamp).await?;

        let mut metadata = HashMap::new();
        metadata.insert("timestamp".to_string(), format!("{timestamp:.3}"));
        if let Some(id) = source_shot_id {
            metadata.insert("source_shot_id".to_string(), id.to_string());
        }
        let stored = self
            .storage
            .save_from_buffer(user_id, &bytes, "bridge-frame", "image/png", &metadata)
            .await?;

        debug!(video_url, timestamp, "Extracted bridge frame");
        Ok(FrameBridge {
            frame_url: stored.view_url,
            source_shot_id: source_shot_id.cloned(),
            extracted_at: Utc::now(),
        })
    }

    /// Sample N evenly spaced frames and return the sharpest, with its
    /// timestamp. Candidates that fail to extract or decode are skipped;
    /// only if every candidate fails does this error.
    pub async fn extract_best_frame(&self, video_url: &str) -> EngineResult<(Vec<u8>, f64)> {
        let duration = self.grabber.duration(video_url).await?;
        let n = self.candidates;

        let mut best: Option<(Vec<u8>, f64, f32)> = None;
        for i in 0..n {
            let timestamp = duration * (i + 1) as f64 / (n + 1) as f64;
            let bytes = match self.grabber.extract_frame_at(video_url, timestamp).await {
                Ok(b) => b,
                Err(e) if e.is_tool_unavailable() => return Err(e.into()),
                Err(e) => {
                    warn!(video_url, timestamp, "Candidate frame extraction failed: {e}");
                    continue;
                }
            };
            let score = match decode_rgb(&bytes) {
                Ok(img) => analysis::sharpness(&img),
                Err(e) => {
                    warn!(video_url, timestamp, "Candidate frame decode failed: {e}");
                    continue;
                }
            };
            if best.as_ref().map(|(_, _, s)| score > *s).unwrap_or(true) {
                best = Some((bytes, timestamp, score));
            }
        }

        match best {
            Some((bytes, timestamp, score)) => {
                debug!(video_url, timestamp, score, "Selected representative frame");
                Ok((bytes, timestamp))
            }
            None => Err(EngineError::collaborator(format!(
                "no usable frame among {n} candidates of {video_url}"
            ))),
        }
    }
}
