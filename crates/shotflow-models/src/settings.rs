//! Session settings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::shot::{ContinuityMode, GenerationMode};

/// Quality-gate pass thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QualityThresholds {
    /// Minimum style similarity in [0, 1]
    #[serde(default = "default_style_threshold")]
    pub style: f32,
    /// Minimum identity similarity in [0, 1]
    #[serde(default = "default_identity_threshold")]
    pub identity: f32,
}

fn default_style_threshold() -> f32 {
    0.75
}

fn default_identity_threshold() -> f32 {
    0.6
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            style: default_style_threshold(),
            identity: default_identity_threshold(),
        }
    }
}

/// Per-session generation defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SessionSettings {
    /// Default generation mode for new shots
    pub generation_mode: GenerationMode,

    /// Default continuity mode for new shots
    pub default_continuity_mode: ContinuityMode,

    /// Default style conditioning strength in [0, 1]
    pub default_style_strength: f32,

    /// Default model identifier
    pub default_model: String,

    /// Extract a bridge frame from each completed shot automatically
    pub auto_extract_frame_bridge: bool,

    /// Route keyframe synthesis through the character-consistency model
    pub use_character_consistency: bool,

    /// Allow scene-proxy renders when the session has a ready proxy
    pub use_scene_proxy: bool,

    /// Retry generation when the quality gate fails
    pub auto_retry_on_failure: bool,

    /// Maximum retries after the first attempt
    pub max_retries: u32,

    /// Quality-gate thresholds
    pub quality_thresholds: QualityThresholds,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            generation_mode: GenerationMode::Continuity,
            default_continuity_mode: ContinuityMode::StyleMatch,
            default_style_strength: 0.65,
            default_model: "veo-3".to_string(),
            auto_extract_frame_bridge: true,
            use_character_consistency: false,
            use_scene_proxy: false,
            auto_retry_on_failure: true,
            max_retries: 2,
            quality_thresholds: QualityThresholds::default(),
        }
    }
}

impl SessionSettings {
    /// Clamp strength-like fields into their valid ranges.
    pub fn normalized(mut self) -> Self {
        self.default_style_strength = self.default_style_strength.clamp(0.0, 1.0);
        self.quality_thresholds.style = self.quality_thresholds.style.clamp(0.0, 1.0);
        self.quality_thresholds.identity = self.quality_thresholds.identity.clamp(0.0, 1.0);
        self
    }
}
