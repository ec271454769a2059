//! Collaborator contracts consumed by the engine.
//!
//! Concrete backends live outside this crate; tests substitute hand-written
//! fakes. Every trait is object-safe and held as `Arc<dyn ...>`; optional
//! facilities are `Option<Arc<dyn ...>>` and their absence degrades rather
//! than fails wherever the design allows it.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use shotflow_media::DepthMap;
use shotflow_models::ShotId;

use crate::error::EngineResult;

/// Options for a single video-generation call.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// Model identifier
    pub model_id: String,
    /// Start frame, when a mechanism produced one
    pub start_image_url: Option<String>,
    /// Native style-reference conditioning image
    pub style_reference_url: Option<String>,
    /// Style conditioning strength in [0, 1]
    pub style_strength: f32,
    /// Native character reference, when the backend supports it
    pub character_asset_id: Option<String>,
    /// Deterministic seed carried from a previous shot
    pub seed: Option<u64>,
}

/// Result of a video-generation call.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Backend asset identifier
    pub asset_id: String,
    /// Playback/download URL
    pub video_url: String,
    /// Seed the backend actually used, when it reports one
    pub seed: Option<u64>,
}

/// Video generation backend.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn generate_video(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> EngineResult<GenerationResult>;

    /// Resolve an asset ID to a playable URL, if the asset still exists.
    async fn get_video_url(&self, asset_id: &str) -> EngineResult<Option<String>>;
}

/// Perceptual image embedding model. Optional; absence degrades the quality
/// gate to histogram correlation.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, image: &[u8]) -> EngineResult<Vec<f32>>;
}

/// Face embedding facility for identity scoring.
#[async_trait]
pub trait FaceEmbedder: Send + Sync {
    async fn extract_embedding(&self, image_url: &str) -> EngineResult<Vec<f32>>;

    /// Similarity of two face embeddings in [0, 1].
    fn compute_similarity(&self, a: &[f32], b: &[f32]) -> f32;
}

/// A stored object's public handle.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub view_url: String,
}

/// Object storage for frames, keyframes and depth maps.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn save_from_buffer(
        &self,
        user_id: &str,
        buffer: &[u8],
        object_type: &str,
        mime: &str,
        metadata: &HashMap<String, String>,
    ) -> EngineResult<StoredObject>;
}

/// A character asset resolved for generation.
#[derive(Debug, Clone)]
pub struct CharacterAsset {
    pub primary_image_url: String,
    pub face_embedding: Option<Vec<f32>>,
}

/// Character asset lookup.
#[async_trait]
pub trait CharacterAssets: Send + Sync {
    async fn get_asset_for_generation(
        &self,
        user_id: &str,
        asset_id: &str,
    ) -> EngineResult<CharacterAsset>;
}

/// Image-conditioned keyframe synthesis (ip-adapter style transfer and
/// pulid identity preservation). Returns the URL of the synthesized frame.
#[async_trait]
pub trait KeyframeSynthesizer: Send + Sync {
    async fn synthesize_style_keyframe(
        &self,
        prompt: &str,
        style_image_url: &str,
        style_strength: f32,
    ) -> EngineResult<String>;

    async fn synthesize_character_keyframe(
        &self,
        prompt: &str,
        face_image_url: &str,
        face_strength: f32,
        style_image_url: Option<&str>,
    ) -> EngineResult<String>;
}

/// External depth estimation. Optional; absence falls back to the local
/// luminance heuristic.
#[async_trait]
pub trait DepthEstimator: Send + Sync {
    async fn estimate_depth(&self, image: &[u8]) -> EngineResult<DepthMap>;
}

/// Byte cache for embeddings and other derived artifacts. Constructed once
/// at process start and passed by reference to consumers; there is no
/// ambient global.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn put(&self, key: &str, value: Vec<u8>);
}

/// In-memory cache implementation.
#[derive(Default)]
pub struct MemoryCache {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().await.get(key).cloned()
    }

    async fn put(&self, key: &str, value: Vec<u8>) {
        self.inner.lock().await.insert(key.to_string(), value);
    }
}

/// Stages of a single generation attempt, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    Resolve,
    Generate,
    Grade,
    Gate,
    Adjust,
    Persist,
    Completed,
    Failed,
}

/// Progress callback for shot generation. The default implementation does
/// nothing.
pub trait ShotGenerationObserver: Send + Sync {
    fn on_stage(&self, shot_id: &ShotId, stage: GenerationStage, attempt: u32);
}

/// Observer that ignores all progress events.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl ShotGenerationObserver for NoopObserver {
    fn on_stage(&self, _shot_id: &ShotId, _stage: GenerationStage, _attempt: u32) {}
}
