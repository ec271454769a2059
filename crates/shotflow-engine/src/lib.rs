//! Continuity orchestration for multi-shot video generation.
//!
//! The engine negotiates provider capabilities, resolves a continuity
//! mechanism per shot, drives the generate -> grade -> gate -> retry loop
//! and persists results with optimistic concurrency. Video generation,
//! embeddings, object storage and character assets are collaborators
//! injected through the traits in [`providers`].

pub mod anchor;
pub mod capability;
pub mod character;
pub mod config;
pub mod error;
pub mod frames;
pub mod generator;
pub mod grade;
pub mod mechanism;
pub mod providers;
pub mod quality;
pub mod retry;
pub mod scene_proxy;
pub mod seed;
pub mod session_service;
pub mod style_reference;

pub use anchor::AnchorService;
pub use capability::{resolve_continuity_mode, ProviderCapabilityAdapter};
pub use character::CharacterKeyframeService;
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use frames::FrameExtraction;
pub use generator::{ShotGenerator, ShotGeneratorBuilder};
pub use grade::GradingService;
pub use mechanism::{MechanismContext, MechanismHandler, ResolvedMechanism};
pub use providers::{
    Cache, CharacterAsset, CharacterAssets, DepthEstimator, EmbeddingModel, FaceEmbedder,
    GenerationOptions, GenerationResult, GenerationStage, KeyframeSynthesizer, MemoryCache,
    NoopObserver, ObjectStorage, ShotGenerationObserver, StoredObject, VideoGenerator,
};
pub use quality::{QualityGate, QualityGateRequest, QualityGateResult};
pub use retry::{adjust_for_quality_gate, GateAdjustment, RetryPolicy};
pub use scene_proxy::SceneProxyService;
pub use seed::SeedPersistence;
pub use session_service::{CreateSessionRequest, SessionService, StyleSource, UpdateShotRequest};
pub use style_reference::StyleReferenceService;
