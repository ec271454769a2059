//! Engine error types.

use thiserror::Error;

use shotflow_models::{Backend, ContinuityMode};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while orchestrating shot generation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(
        "Backend '{backend}' supports neither a start image nor a native style reference; \
         switch the shot to a backend with continuity support or set continuity mode to 'none'"
    )]
    UnsupportedContinuity { backend: Backend },

    #[error("No visual anchor could be resolved for continuity strategy '{strategy}'")]
    MissingVisualAnchor { strategy: ContinuityMode },

    #[error(
        "Character consistency was requested but no character keyframe facility is configured; \
         configure a keyframe synthesizer and character asset source, or disable \
         use_character_consistency"
    )]
    CharacterUnavailable,

    #[error("Video generation failed: {0}")]
    Generation(String),

    #[error("Collaborator call failed: {0}")]
    Collaborator(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Store error: {0}")]
    Store(#[from] shotflow_store::StoreError),

    #[error("Media error: {0}")]
    Media(#[from] shotflow_media::MediaError),
}

impl EngineError {
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::Collaborator(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }
}
