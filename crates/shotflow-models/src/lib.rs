//! Shared data models for the Shotflow continuity engine.
//!
//! This crate provides Serde-serializable types for:
//! - Sessions and their versioned persistence envelope
//! - Shots and the continuity state machine
//! - Style references and scene proxies
//! - Session settings and quality thresholds
//! - Provider capability flags

pub mod capability;
pub mod ids;
pub mod scene_proxy;
pub mod session;
pub mod settings;
pub mod shot;
pub mod style_reference;

// Re-export common types
pub use capability::{Backend, ProviderCapabilities};
pub use ids::{SceneProxyId, SessionId, ShotId, StyleReferenceId};
pub use scene_proxy::{SceneProxy, SceneProxyStatus, SceneProxyType};
pub use session::{Session, SessionStatus};
pub use settings::{QualityThresholds, SessionSettings};
pub use shot::{
    CameraPose, ContinuityMechanism, ContinuityMode, FrameBridge, GenerationMode, NewShotRequest,
    SeedInfo, Shot, ShotStatus,
};
pub use style_reference::{Resolution, StyleReference};
