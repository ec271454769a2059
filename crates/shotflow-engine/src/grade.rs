//! Post-hoc grading of generated output toward the style anchor.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use shotflow_media::{decode_rgb, encode_png, match_palette, FrameGrabber};

use crate::error::EngineResult;
use crate::providers::ObjectStorage;

/// Result of grading a generated video against its style reference.
#[derive(Debug, Clone)]
pub struct GradedOutput {
    /// URL of the graded comparison frame, when grading succeeded.
    pub graded_frame_url: Option<String>,
    /// True when the grading step failed and the shot should carry a
    /// degradation marker.
    pub degraded: bool,
}

/// Applies color/style matching to generated output.
///
/// Grading never fails a shot: any error yields a degraded result that the
/// generator records on the shot and moves past.
pub struct GradingService {
    grabber: Arc<dyn FrameGrabber>,
    storage: Arc<dyn ObjectStorage>,
}

impl GradingService {
    pub fn new(grabber: Arc<dyn FrameGrabber>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { grabber, storage }
    }

    /// Extract the generated video's midpoint frame, palette-match it to
    /// the style reference, and upload the graded frame.
    pub async fn grade_output(
        &self,
        user_id: &str,
        generated_video_url: &str,
        reference_image_url: &str,
    ) -> GradedOutput {
        match self
            .try_grade(user_id, generated_video_url, reference_image_url)
            .await
        {
            Ok(url) => GradedOutput {
                graded_frame_url: Some(url),
                degraded: false,
            },
            Err(e) => {
                warn!("Grading failed, continuing with ungraded output: {e}");
                GradedOutput {
                    graded_frame_url: None,
                    degraded: true,
                }
            }
        }
    }

    async fn try_grade(
        &self,
        user_id: &str,
        generated_video_url: &str,
        reference_image_url: &str,
    ) -> EngineResult<String> {
        let duration = self.grabber.duration(generated_video_url).await?;
        let midpoint = duration / 2.0;
        let frame_bytes = self
            .grabber
            .extract_frame_at(generated_video_url, midpoint)
            .await?;
        let reference_bytes = self
            .grabber
            .extract_frame_at(reference_image_url, 0.0)
            .await?;

        let frame = decode_rgb(&frame_bytes)?;
        let reference = decode_rgb(&reference_bytes)?;
        let graded = match_palette(&frame, &reference);
        let graded_bytes = encode_png(&graded)?;

        let stored = self
            .storage
            .save_from_buffer(
                user_id,
                &graded_bytes,
                "graded-frame",
                "image/png",
                &HashMap::new(),
            )
            .await?;
        Ok(stored.view_url)
    }
}
