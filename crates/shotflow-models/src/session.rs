//! Session models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{SessionId, ShotId};
use crate::scene_proxy::SceneProxy;
use crate::settings::SessionSettings;
use crate::shot::Shot;
use crate::style_reference::StyleReference;

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
    Archived,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A multi-shot generation session.
///
/// `version` increases by exactly 1 per successful persisted mutation; shots
/// are ordered by `sequence_index`, strictly increasing, no duplicates.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Session {
    /// Unique session ID
    pub id: SessionId,

    /// Owning user
    pub user_id: String,

    /// Display name
    pub name: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The session-wide style anchor
    pub primary_style_reference: StyleReference,

    /// Depth proxy of the session's location, when built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_proxy: Option<SceneProxy>,

    /// Shots ordered by sequence index
    #[serde(default)]
    pub shots: Vec<Shot>,

    /// Generation defaults
    #[serde(default)]
    pub default_settings: SessionSettings,

    /// Lifecycle status
    #[serde(default)]
    pub status: SessionStatus,

    /// Optimistic-concurrency version; starts at 1 on creation
    pub version: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new active session at version 1.
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        primary_style_reference: StyleReference,
        settings: SessionSettings,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            user_id: user_id.into(),
            name: name.into(),
            description: None,
            primary_style_reference,
            scene_proxy: None,
            shots: Vec::new(),
            default_settings: settings.normalized(),
            status: SessionStatus::Active,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Find a shot by ID.
    pub fn shot(&self, shot_id: &ShotId) -> Option<&Shot> {
        self.shots.iter().find(|s| &s.id == shot_id)
    }

    /// Find a shot by ID, mutably.
    pub fn shot_mut(&mut self, shot_id: &ShotId) -> Option<&mut Shot> {
        self.shots.iter_mut().find(|s| &s.id == shot_id)
    }

    /// The shot immediately preceding `shot_id` in sequence order.
    pub fn previous_shot(&self, shot_id: &ShotId) -> Option<&Shot> {
        let current = self.shot(shot_id)?;
        self.shots
            .iter()
            .filter(|s| s.sequence_index < current.sequence_index)
            .max_by_key(|s| s.sequence_index)
    }

    /// Next free sequence index for an appended shot.
    pub fn next_sequence_index(&self) -> u32 {
        self.shots
            .iter()
            .map(|s| s.sequence_index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Replace the shot with the same ID, or append it. Ordering by
    /// `sequence_index` is restored after the merge.
    pub fn upsert_shot(&mut self, shot: Shot) {
        match self.shots.iter_mut().find(|s| s.id == shot.id) {
            Some(existing) => *existing = shot,
            None => self.shots.push(shot),
        }
        self.shots.sort_by_key(|s| s.sequence_index);
    }

    /// Check the sequence-index invariant: strictly increasing, no duplicates.
    pub fn sequence_is_valid(&self) -> bool {
        self.shots
            .windows(2)
            .all(|w| w[0].sequence_index < w[1].sequence_index)
    }

    /// Touch the update timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
