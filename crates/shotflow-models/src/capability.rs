//! Provider backends and their continuity capability flags.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A video-generation backend family.
///
/// Model identifiers map onto one of these; the capability table below is
/// keyed by backend, not by individual model version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Kling family: start image, deterministic seed, extend.
    Kling,
    /// Veo family: native style reference and start image.
    Veo,
    /// Runway family: native style + character references, start image.
    Runway,
    /// Luma family: start image and deterministic seed.
    Luma,
    /// Hailuo family: text-to-video only.
    Hailuo,
    /// Unknown model id; assume no continuity support.
    Unknown,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Kling => "kling",
            Backend::Veo => "veo",
            Backend::Runway => "runway",
            Backend::Luma => "luma",
            Backend::Hailuo => "hailuo",
            Backend::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Continuity-relevant capability flags for a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct ProviderCapabilities {
    /// Accepts a reference image as style conditioning.
    pub supports_native_style_reference: bool,
    /// Accepts a character/identity reference natively.
    pub supports_native_character_reference: bool,
    /// Accepts a start frame.
    pub supports_start_image: bool,
    /// Honors a deterministic seed across requests.
    pub supports_seed_persistence: bool,
    /// Can extend an existing video asset.
    pub supports_extend_video: bool,
}

impl ProviderCapabilities {
    /// True when no continuity-preserving mechanism exists at all.
    pub fn has_no_visual_anchor(&self) -> bool {
        !self.supports_start_image && !self.supports_native_style_reference
    }
}
