//! The quality gate: style and identity scoring of generated output.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use shotflow_media::{analysis, decode_rgb, FrameGrabber};

use crate::error::EngineResult;
use crate::providers::{Cache, EmbeddingModel, FaceEmbedder, ObjectStorage};

/// Default minimum style similarity.
pub const DEFAULT_STYLE_THRESHOLD: f32 = 0.75;
/// Default minimum identity similarity.
pub const DEFAULT_IDENTITY_THRESHOLD: f32 = 0.6;

/// Inputs to a quality-gate evaluation.
#[derive(Debug, Clone)]
pub struct QualityGateRequest {
    pub reference_image_url: String,
    pub generated_video_url: String,
    pub character_reference_url: Option<String>,
    pub style_threshold: f32,
    pub identity_threshold: f32,
}

impl QualityGateRequest {
    pub fn new(
        reference_image_url: impl Into<String>,
        generated_video_url: impl Into<String>,
    ) -> Self {
        Self {
            reference_image_url: reference_image_url.into(),
            generated_video_url: generated_video_url.into(),
            character_reference_url: None,
            style_threshold: DEFAULT_STYLE_THRESHOLD,
            identity_threshold: DEFAULT_IDENTITY_THRESHOLD,
        }
    }
}

/// Scores and pass/fail decision for one generated output.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityGateResult {
    pub style_score: Option<f32>,
    pub identity_score: Option<f32>,
    pub passed: bool,
}

/// Scores generated output against the anchor and decides pass/fail.
///
/// Style similarity uses a perceptual embedding when the model is
/// configured, degrading to RGB histogram correlation otherwise. Identity
/// similarity is skipped (treated as passing) when no face facility exists.
pub struct QualityGate {
    grabber: Arc<dyn FrameGrabber>,
    storage: Arc<dyn ObjectStorage>,
    embedder: Option<Arc<dyn EmbeddingModel>>,
    face: Option<Arc<dyn FaceEmbedder>>,
    cache: Arc<dyn Cache>,
}

impl QualityGate {
    pub fn new(
        grabber: Arc<dyn FrameGrabber>,
        storage: Arc<dyn ObjectStorage>,
        embedder: Option<Arc<dyn EmbeddingModel>>,
        face: Option<Arc<dyn FaceEmbedder>>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        Self {
            grabber,
            storage,
            embedder,
            face,
            cache,
        }
    }

    /// Evaluate a generated video against its style (and optionally
    /// character) anchors.
    pub async fn evaluate(&self, request: &QualityGateRequest) -> EngineResult<QualityGateResult> {
        // Midpoint frame of the generated output.
        let duration = self.grabber.duration(&request.generated_video_url).await?;
        let frame_bytes = self
            .grabber
            .extract_frame_at(&request.generated_video_url, duration / 2.0)
            .await?;
        let reference_bytes = self
            .grabber
            .extract_frame_at(&request.reference_image_url, 0.0)
            .await?;

        let style_score = self
            .style_score(&request.reference_image_url, &reference_bytes, &frame_bytes)
            .await;

        let identity_score = match &request.character_reference_url {
            Some(char_url) => self.identity_score(char_url, &frame_bytes).await,
            None => None,
        };

        let passed = style_score.map_or(true, |s| s >= request.style_threshold)
            && identity_score.map_or(true, |s| s >= request.identity_threshold);

        debug!(
            ?style_score,
            ?identity_score,
            passed,
            "Quality gate evaluated"
        );
        Ok(QualityGateResult {
            style_score,
            identity_score,
            passed,
        })
    }

    /// Style similarity in [0, 1]. Embedding cosine when available, else
    /// histogram correlation. Never errors, only degrades precision.
    async fn style_score(
        &self,
        reference_url: &str,
        reference_bytes: &[u8],
        frame_bytes: &[u8],
    ) -> Option<f32> {
        if let Some(embedder) = &self.embedder {
            let reference_embedding = self
                .cached_embedding(embedder, reference_url, reference_bytes)
                .await;
            let frame_embedding = match embedder.embed(frame_bytes).await {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Frame embedding failed, falling back to histogram: {e}");
                    None
                }
            };
            if let (Some(a), Some(b)) = (reference_embedding, frame_embedding) {
                if let Some(score) = analysis::cosine_similarity(&a, &b) {
                    return Some(score);
                }
            }
        }

        // Histogram fallback: degrade, never throw.
        match (decode_rgb(reference_bytes), decode_rgb(frame_bytes)) {
            (Ok(a), Ok(b)) => Some(analysis::histogram_correlation(&a, &b)),
            _ => {
                warn!("Histogram fallback could not decode frames; skipping style check");
                None
            }
        }
    }

    /// Embed with a per-URL cache so the session anchor is embedded once.
    async fn cached_embedding(
        &self,
        embedder: &Arc<dyn EmbeddingModel>,
        url: &str,
        bytes: &[u8],
    ) -> Option<Vec<f32>> {
        let key = format!("embedding:{url}");
        if let Some(cached) = self.cache.get(&key).await {
            if let Ok(v) = serde_json::from_slice::<Vec<f32>>(&cached) {
                return Some(v);
            }
        }
        match embedder.embed(bytes).await {
            Ok(v) => {
                if let Ok(encoded) = serde_json::to_vec(&v) {
                    self.cache.put(&key, encoded).await;
                }
                Some(v)
            }
            Err(e) => {
                warn!("Reference embedding failed: {e}");
                None
            }
        }
    }

    /// Identity similarity in [0, 1], or `None` (skipped, treated as
    /// passing) when the face facility is unavailable or fails.
    async fn identity_score(&self, character_url: &str, frame_bytes: &[u8]) -> Option<f32> {
        let face = self.face.as_ref()?;

        // The face embedder works on URLs; host the midpoint frame first.
        let frame_url = match self
            .storage
            .save_from_buffer(
                "quality-gate",
                frame_bytes,
                "gate-frame",
                "image/png",
                &HashMap::new(),
            )
            .await
        {
            Ok(stored) => stored.view_url,
            Err(e) => {
                warn!("Could not host gate frame, skipping identity check: {e}");
                return None;
            }
        };

        let char_embedding = match face.extract_embedding(character_url).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Character embedding failed, skipping identity check: {e}");
                return None;
            }
        };
        let frame_embedding = match face.extract_embedding(&frame_url).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Frame face embedding failed, skipping identity check: {e}");
                return None;
            }
        };

        Some(
            face.compute_similarity(&char_embedding, &frame_embedding)
                .clamp(0.0, 1.0),
        )
    }
}
