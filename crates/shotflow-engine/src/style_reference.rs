//! Style reference construction and ip-adapter keyframe synthesis.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use shotflow_media::{decode_rgb, encode_png, match_palette, FrameGrabber};
use shotflow_models::{Resolution, StyleReference};

use crate::error::{EngineError, EngineResult};
use crate::providers::{KeyframeSynthesizer, ObjectStorage};

/// Outcome of a style keyframe synthesis.
#[derive(Debug, Clone)]
pub struct SynthesizedKeyframe {
    pub url: String,
    /// True when the palette-matching step was skipped or failed; the
    /// keyframe is usable but style fidelity is degraded.
    pub palette_degraded: bool,
}

/// Builds style-reference records and synthesizes style-transfer keyframes
/// when no native continuity mechanism exists.
pub struct StyleReferenceService {
    storage: Arc<dyn ObjectStorage>,
    grabber: Arc<dyn FrameGrabber>,
    synthesizer: Option<Arc<dyn KeyframeSynthesizer>>,
}

impl StyleReferenceService {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        grabber: Arc<dyn FrameGrabber>,
        synthesizer: Option<Arc<dyn KeyframeSynthesizer>>,
    ) -> Self {
        Self {
            storage,
            grabber,
            synthesizer,
        }
    }

    pub fn can_synthesize(&self) -> bool {
        self.synthesizer.is_some()
    }

    /// Build an immutable style reference from an extracted frame. The
    /// frame is uploaded and its resolution recorded; a new record is
    /// created every time, never mutated in place.
    pub async fn build_from_frame(
        &self,
        user_id: &str,
        frame_bytes: &[u8],
        source_video_id: Option<&str>,
        frame_timestamp: f64,
    ) -> EngineResult<StyleReference> {
        let img = decode_rgb(frame_bytes)?;
        let resolution = Resolution {
            width: img.width(),
            height: img.height(),
        };

        let mut metadata = HashMap::new();
        metadata.insert("timestamp".to_string(), format!("{frame_timestamp:.3}"));
        let stored = self
            .storage
            .save_from_buffer(user_id, frame_bytes, "style-reference", "image/png", &metadata)
            .await?;

        let mut reference = StyleReference::new(stored.view_url, resolution);
        if let Some(video_id) = source_video_id {
            reference = reference.with_source_video(video_id, frame_timestamp);
        }
        debug!(reference_id = %reference.id, "Built style reference");
        Ok(reference)
    }

    /// Synthesize an AI keyframe conditioned on the style reference
    /// (ip-adapter route), then palette-match it back to the reference.
    ///
    /// Palette matching is best-effort: any failure in that step degrades
    /// (`palette_degraded = true`) instead of failing the synthesis.
    pub async fn synthesize_style_keyframe(
        &self,
        user_id: &str,
        prompt: &str,
        reference: &StyleReference,
        style_strength: f32,
    ) -> EngineResult<SynthesizedKeyframe> {
        let synthesizer = self.synthesizer.as_ref().ok_or_else(|| {
            EngineError::collaborator("no keyframe synthesizer configured for style transfer")
        })?;

        let url = synthesizer
            .synthesize_style_keyframe(prompt, &reference.frame_url, style_strength)
            .await?;

        match self.palette_match(user_id, &url, reference).await {
            Ok(graded_url) => Ok(SynthesizedKeyframe {
                url: graded_url,
                palette_degraded: false,
            }),
            Err(e) => {
                warn!("Palette matching failed, using ungraded keyframe: {e}");
                Ok(SynthesizedKeyframe {
                    url,
                    palette_degraded: true,
                })
            }
        }
    }

    /// Color-match a synthesized keyframe to the style reference and
    /// upload the graded result.
    async fn palette_match(
        &self,
        user_id: &str,
        keyframe_url: &str,
        reference: &StyleReference,
    ) -> EngineResult<String> {
        let keyframe_bytes = self.grabber.extract_frame_at(keyframe_url, 0.0).await?;
        let reference_bytes = self
            .grabber
            .extract_frame_at(&reference.frame_url, 0.0)
            .await?;

        let keyframe = decode_rgb(&keyframe_bytes)?;
        let reference_img = decode_rgb(&reference_bytes)?;
        let graded = match_palette(&keyframe, &reference_img);
        let graded_bytes = encode_png(&graded)?;

        let stored = self
            .storage
            .save_from_buffer(
                user_id,
                &graded_bytes,
                "graded-keyframe",
                "image/png",
                &HashMap::new(),
            )
            .await?;
        Ok(stored.view_url)
    }
}
