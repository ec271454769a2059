//! Adaptive retry adjustments after a failed quality gate.

use tracing::info;

use shotflow_models::{QualityThresholds, Shot};

use crate::quality::QualityGateResult;

const STYLE_STEP: f32 = 0.1;
const FACE_STEP: f32 = 0.05;
const STYLE_FLOOR: f32 = 0.35;
const STRENGTH_CEILING: f32 = 0.95;
const DEFAULT_FACE_STRENGTH: f32 = 0.5;

/// Bounds on the generate/gate/retry loop.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub auto_retry: bool,
}

impl RetryPolicy {
    pub fn from_settings(settings: &shotflow_models::SessionSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            auto_retry: settings.auto_retry_on_failure,
        }
    }

    /// Total attempts: the first attempt plus the retries.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Conditioning changes to apply before the next attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct GateAdjustment {
    pub style_strength: f32,
    pub face_strength: Option<f32>,
    /// Set when style conditioning was weakened to protect identity.
    pub degraded_reason: Option<String>,
}

/// Decide how to re-condition a shot after a failed quality gate.
///
/// Identity failures dominate: style conditioning is weakened (it fights
/// face likeness) and face conditioning strengthened. A pure style failure
/// strengthens style conditioning instead. Returns `None` when no knob can
/// move further, which ends the retry loop early.
pub fn adjust_for_quality_gate(
    shot: &Shot,
    gate: &QualityGateResult,
    thresholds: &QualityThresholds,
) -> Option<GateAdjustment> {
    let identity_missed = gate
        .identity_score
        .map(|s| s < thresholds.identity)
        .unwrap_or(false);
    let style_missed = gate
        .style_score
        .map(|s| s < thresholds.style)
        .unwrap_or(false);

    if identity_missed {
        let style_strength = (shot.style_strength - STYLE_STEP).max(STYLE_FLOOR);
        let face_strength =
            (shot.face_strength.unwrap_or(DEFAULT_FACE_STRENGTH) + FACE_STEP).min(STRENGTH_CEILING);
        let changed = (style_strength - shot.style_strength).abs() > f32::EPSILON
            || shot
                .face_strength
                .map(|f| (face_strength - f).abs() > f32::EPSILON)
                .unwrap_or(true);
        if !changed {
            return None;
        }
        info!(
            shot_id = %shot.id,
            style_strength,
            face_strength,
            "Weakening style conditioning to recover identity"
        );
        return Some(GateAdjustment {
            style_strength,
            face_strength: Some(face_strength),
            degraded_reason: Some("identity-threshold".to_string()),
        });
    }

    if style_missed {
        let style_strength = (shot.style_strength + STYLE_STEP).min(STRENGTH_CEILING);
        if (style_strength - shot.style_strength).abs() <= f32::EPSILON {
            return None;
        }
        info!(shot_id = %shot.id, style_strength, "Strengthening style conditioning");
        return Some(GateAdjustment {
            style_strength,
            face_strength: None,
            degraded_reason: None,
        });
    }

    None
}
