//! Shot models and the continuity state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{SessionId, ShotId};
use crate::style_reference::StyleReference;

/// How a shot is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationMode {
    /// Preserve visual continuity with prior shots
    #[default]
    Continuity,
    /// Independent generation, no continuity guarantees
    Standard,
}

/// The intended mechanism class for carrying visual identity from one shot
/// to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ContinuityMode {
    /// Use the previous shot's tail frame as the start image
    FrameBridge,
    /// Condition on a style reference image
    #[default]
    StyleMatch,
    /// Use the backend's native style-reference input
    Native,
    /// No continuity requested or achievable
    None,
}

impl ContinuityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContinuityMode::FrameBridge => "frame-bridge",
            ContinuityMode::StyleMatch => "style-match",
            ContinuityMode::Native => "native",
            ContinuityMode::None => "none",
        }
    }
}

impl fmt::Display for ContinuityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The concrete continuity mechanism a generation attempt actually used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ContinuityMechanism {
    /// Backend-native style reference input
    NativeStyleRef,
    /// Previous shot's tail frame as the start image
    FrameBridge,
    /// Identity-preserving synthesized keyframe
    PulidKeyframe,
    /// Style-transfer synthesized keyframe
    IpAdapter,
    /// Re-rendered depth-proxy frame as the start image
    SceneProxy,
    /// Deterministic seed carried from the previous shot
    SeedOnly,
    /// No mechanism applied
    #[default]
    None,
}

impl ContinuityMechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContinuityMechanism::NativeStyleRef => "native-style-ref",
            ContinuityMechanism::FrameBridge => "frame-bridge",
            ContinuityMechanism::PulidKeyframe => "pulid-keyframe",
            ContinuityMechanism::IpAdapter => "ip-adapter",
            ContinuityMechanism::SceneProxy => "scene-proxy",
            ContinuityMechanism::SeedOnly => "seed-only",
            ContinuityMechanism::None => "none",
        }
    }
}

impl fmt::Display for ContinuityMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shot generation status.
///
/// Transitions are monotonic along
/// `draft -> generating-keyframe -> generating-video -> {completed, failed}`;
/// a shot never reverts to draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ShotStatus {
    #[default]
    Draft,
    GeneratingKeyframe,
    GeneratingVideo,
    Completed,
    Failed,
}

impl ShotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShotStatus::Draft => "draft",
            ShotStatus::GeneratingKeyframe => "generating-keyframe",
            ShotStatus::GeneratingVideo => "generating-video",
            ShotStatus::Completed => "completed",
            ShotStatus::Failed => "failed",
        }
    }

    /// True if this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ShotStatus::Completed | ShotStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            ShotStatus::Draft => 0,
            ShotStatus::GeneratingKeyframe => 1,
            ShotStatus::GeneratingVideo => 2,
            ShotStatus::Completed | ShotStatus::Failed => 3,
        }
    }

    /// Whether moving to `next` respects the monotonic state machine.
    pub fn can_transition_to(&self, next: ShotStatus) -> bool {
        if *self == next {
            return true;
        }
        // Terminal states only move between themselves never backwards.
        next.rank() > self.rank() || (self.is_terminal() && next.is_terminal())
    }
}

impl fmt::Display for ShotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A frame extracted from the end of one shot's video, used as the
/// start-image anchor for the next shot.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FrameBridge {
    /// URL of the extracted tail frame
    pub frame_url: String,

    /// Shot the frame came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_shot_id: Option<ShotId>,

    /// Extraction timestamp
    pub extracted_at: DateTime<Utc>,
}

/// Virtual camera adjustment for scene-proxy renders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CameraPose {
    /// Horizontal rotation in radians (positive = right)
    pub yaw: f32,
    /// Vertical rotation in radians (positive = down)
    pub pitch: f32,
    /// Roll in radians
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll: Option<f32>,
    /// Forward translation, normalized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dolly: Option<f32>,
}

impl CameraPose {
    pub fn identity() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            roll: None,
            dolly: None,
        }
    }
}

/// Deterministic seed recorded from a generation result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SeedInfo {
    /// The seed the backend reported
    pub seed: u64,
    /// Model that produced it
    pub model_id: String,
    /// When it was recorded
    pub recorded_at: DateTime<Utc>,
}

/// A single shot within a session.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Shot {
    /// Unique shot ID
    pub id: ShotId,

    /// Owning session
    pub session_id: SessionId,

    /// Position within the session; strictly increasing, no duplicates
    pub sequence_index: u32,

    /// The user's prompt for this shot
    pub user_prompt: String,

    /// Generation mode
    #[serde(default)]
    pub generation_mode: GenerationMode,

    /// Requested continuity mode (may be degraded at generation time)
    #[serde(default)]
    pub continuity_mode: ContinuityMode,

    /// Style conditioning strength in [0, 1]
    #[serde(default = "default_style_strength")]
    pub style_strength: f32,

    /// Prior shot whose style reference to reuse; null means "use the
    /// session primary"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_reference_id: Option<ShotId>,

    /// Shot-specific style reference override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_reference: Option<StyleReference>,

    /// Bridge frame carried from the previous shot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_bridge: Option<FrameBridge>,

    /// Character asset for identity preservation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_asset_id: Option<String>,

    /// Face conditioning strength in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_strength: Option<f32>,

    /// Virtual camera adjustment for scene-proxy renders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraPose>,

    /// Model identifier to generate with
    pub model_id: String,

    /// Seed recorded from this shot's generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_info: Option<SeedInfo>,

    /// Seed inherited from the previous shot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_seed: Option<u64>,

    /// Generated video asset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_asset_id: Option<String>,

    /// Synthesized keyframe, when one was produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_keyframe_url: Option<String>,

    /// Palette-matched comparison frame from post-hoc grading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graded_frame_url: Option<String>,

    /// Mechanism the last attempt actually used
    #[serde(default)]
    pub continuity_mechanism_used: ContinuityMechanism,

    /// Style similarity score from the quality gate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_score: Option<f32>,

    /// Identity similarity score from the quality gate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_score: Option<f32>,

    /// Combined quality score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f32>,

    /// True when style conditioning was weakened to protect identity
    #[serde(default)]
    pub style_degraded: bool,

    /// Reason code for the degradation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_degraded_reason: Option<String>,

    /// True when post-hoc palette matching was applied
    #[serde(default)]
    pub style_transfer_applied: bool,

    /// Number of retry attempts consumed
    #[serde(default)]
    pub retry_count: u32,

    /// Generation status
    #[serde(default)]
    pub status: ShotStatus,

    /// Failure reason, when status is failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Generation completion timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

fn default_style_strength() -> f32 {
    0.65
}

impl Shot {
    /// Create a draft shot with default generation state.
    pub fn draft(
        session_id: SessionId,
        sequence_index: u32,
        user_prompt: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            id: ShotId::new(),
            session_id,
            sequence_index,
            user_prompt: user_prompt.into(),
            generation_mode: GenerationMode::default(),
            continuity_mode: ContinuityMode::default(),
            style_strength: default_style_strength(),
            style_reference_id: None,
            style_reference: None,
            frame_bridge: None,
            character_asset_id: None,
            face_strength: None,
            camera: None,
            model_id: model_id.into(),
            seed_info: None,
            inherited_seed: None,
            video_asset_id: None,
            generated_keyframe_url: None,
            graded_frame_url: None,
            continuity_mechanism_used: ContinuityMechanism::None,
            style_score: None,
            identity_score: None,
            quality_score: None,
            style_degraded: false,
            style_degraded_reason: None,
            style_transfer_applied: false,
            retry_count: 0,
            status: ShotStatus::Draft,
            error: None,
            created_at: Utc::now(),
            generated_at: None,
        }
    }

    /// Reset per-attempt flags so stale values never leak across retries.
    pub fn reset_attempt_state(&mut self) {
        self.style_degraded = false;
        self.style_degraded_reason = None;
        self.style_transfer_applied = false;
        self.graded_frame_url = None;
        self.style_score = None;
        self.identity_score = None;
        self.quality_score = None;
        self.continuity_mechanism_used = ContinuityMechanism::None;
    }

    /// Move to `next` if the state machine allows it.
    pub fn transition(&mut self, next: ShotStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }
}

/// Caller-supplied fields for appending a shot to a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NewShotRequest {
    pub user_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_mode: Option<GenerationMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuity_mode: Option<ContinuityMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_strength: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_reference_id: Option<ShotId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_strength: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraPose>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}
