//! Scene proxy records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::SceneProxyId;

/// Proxy construction technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SceneProxyType {
    /// Single-frame depth map re-projected with per-bucket parallax.
    #[default]
    DepthParallax,
}

/// Scene proxy build status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SceneProxyStatus {
    /// Depth map is being computed
    #[default]
    Building,
    /// Proxy is usable for renders
    Ready,
    /// Depth estimation produced unusable output
    Failed,
}

impl SceneProxyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneProxyStatus::Building => "building",
            SceneProxyStatus::Ready => "ready",
            SceneProxyStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SceneProxyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A depth-augmented single-frame 3D approximation of a location,
/// re-renderable from nearby virtual camera poses without a new video
/// generation call.
///
/// Created once per session (or replaced); consumed read-only by renders.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SceneProxy {
    /// Unique proxy ID
    pub id: SceneProxyId,

    /// Video asset the reference frame was extracted from
    pub source_video_id: String,

    /// Construction technique
    #[serde(default)]
    pub proxy_type: SceneProxyType,

    /// URL of the reference frame
    pub reference_frame_url: String,

    /// URL of the grayscale depth map
    pub depth_map_url: String,

    /// Build status
    #[serde(default)]
    pub status: SceneProxyStatus,

    /// Failure reason, when status is failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl SceneProxy {
    pub fn is_ready(&self) -> bool {
        self.status == SceneProxyStatus::Ready
    }
}
