//! The generate -> grade -> gate -> retry loop for a single shot.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use shotflow_models::{
    ContinuityMechanism, ContinuityMode, GenerationMode, SessionId, Shot, ShotId, ShotStatus,
};
use shotflow_store::{SessionStore, VersionedStore};

use crate::capability::{resolve_continuity_mode, ProviderCapabilityAdapter};
use crate::character::CharacterKeyframeService;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::frames::FrameExtraction;
use crate::grade::GradingService;
use crate::mechanism::{MechanismContext, MechanismHandler};
use crate::providers::{
    GenerationOptions, GenerationStage, NoopObserver, ShotGenerationObserver, VideoGenerator,
};
use crate::quality::{QualityGate, QualityGateRequest, QualityGateResult};
use crate::retry::{adjust_for_quality_gate, RetryPolicy};
use crate::seed::SeedPersistence;
use crate::anchor::AnchorService;

/// Drives one shot through mechanism resolution, generation, grading, the
/// quality gate and adaptive retries, and persists the outcome.
///
/// Fatal conditions (unsupported continuity, missing anchors, unconfigured
/// character facility, exhausted generation failures) mark the shot failed
/// and return it; they are not surfaced as `Err`. `Err` is reserved for
/// infrastructure faults such as unresolvable persistence conflicts.
pub struct ShotGenerator<S> {
    store: Arc<SessionStore<S>>,
    video: Arc<dyn VideoGenerator>,
    mechanism: Arc<MechanismHandler>,
    quality: Arc<QualityGate>,
    grading: Arc<GradingService>,
    frames: Arc<FrameExtraction>,
    character: Arc<CharacterKeyframeService>,
    observer: Arc<dyn ShotGenerationObserver>,
    config: EngineConfig,
}

/// Builder for [`ShotGenerator`]; the observer and config are optional.
pub struct ShotGeneratorBuilder<S> {
    store: Option<Arc<SessionStore<S>>>,
    video: Option<Arc<dyn VideoGenerator>>,
    mechanism: Option<Arc<MechanismHandler>>,
    quality: Option<Arc<QualityGate>>,
    grading: Option<Arc<GradingService>>,
    frames: Option<Arc<FrameExtraction>>,
    character: Option<Arc<CharacterKeyframeService>>,
    observer: Arc<dyn ShotGenerationObserver>,
    config: EngineConfig,
}

impl<S> Default for ShotGeneratorBuilder<S> {
    fn default() -> Self {
        Self {
            store: None,
            video: None,
            mechanism: None,
            quality: None,
            grading: None,
            frames: None,
            character: None,
            observer: Arc::new(NoopObserver),
            config: EngineConfig::default(),
        }
    }
}

impl<S: VersionedStore> ShotGeneratorBuilder<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(mut self, store: Arc<SessionStore<S>>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn video(mut self, video: Arc<dyn VideoGenerator>) -> Self {
        self.video = Some(video);
        self
    }

    pub fn mechanism(mut self, mechanism: Arc<MechanismHandler>) -> Self {
        self.mechanism = Some(mechanism);
        self
    }

    pub fn quality(mut self, quality: Arc<QualityGate>) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn grading(mut self, grading: Arc<GradingService>) -> Self {
        self.grading = Some(grading);
        self
    }

    pub fn frames(mut self, frames: Arc<FrameExtraction>) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn character(mut self, character: Arc<CharacterKeyframeService>) -> Self {
        self.character = Some(character);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ShotGenerationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> EngineResult<ShotGenerator<S>> {
        let missing = |name: &str| EngineError::invalid_request(format!("{name} is required"));
        Ok(ShotGenerator {
            store: self.store.ok_or_else(|| missing("store"))?,
            video: self.video.ok_or_else(|| missing("video generator"))?,
            mechanism: self.mechanism.ok_or_else(|| missing("mechanism handler"))?,
            quality: self.quality.ok_or_else(|| missing("quality gate"))?,
            grading: self.grading.ok_or_else(|| missing("grading service"))?,
            frames: self.frames.ok_or_else(|| missing("frame extraction"))?,
            character: self.character.ok_or_else(|| missing("character service"))?,
            observer: self.observer,
            config: self.config,
        })
    }
}

impl<S: VersionedStore> ShotGenerator<S> {
    pub fn builder() -> ShotGeneratorBuilder<S> {
        ShotGeneratorBuilder::new()
    }

    /// Generate one shot end to end and persist the result.
    pub async fn generate_shot(
        &self,
        user_id: &str,
        session_id: &SessionId,
        shot_id: &ShotId,
    ) -> EngineResult<Shot> {
        let session = self.store.get_required(session_id).await?;
        if session.user_id != user_id {
            return Err(EngineError::invalid_request(format!(
                "session {session_id} does not belong to this user"
            )));
        }
        let mut shot = session
            .shot(shot_id)
            .cloned()
            .ok_or_else(|| EngineError::invalid_request(format!("unknown shot {shot_id}")))?;
        if shot.status.is_terminal() {
            return Err(EngineError::invalid_request(format!(
                "shot {shot_id} already finished as {}",
                shot.status
            )));
        }

        let (backend, caps) = ProviderCapabilityAdapter::for_model(&shot.model_id);
        if let Err(e) =
            AnchorService::validate(backend, &caps, shot.generation_mode, shot.continuity_mode)
        {
            return self.fail_shot(shot, e.to_string()).await;
        }

        let policy = RetryPolicy::from_settings(&session.default_settings);
        let thresholds = session.default_settings.quality_thresholds;
        let inherited_seed =
            SeedPersistence::inherit(session.previous_shot(shot_id), &shot.model_id, &caps);
        shot.inherited_seed = inherited_seed;

        // Degradation decided by a gate adjustment applies to the NEXT
        // attempt, so it has to survive that attempt's state reset.
        let mut pending_degraded: Option<String> = None;
        let mut attempt: u32 = 1;

        loop {
            self.observer
                .on_stage(&shot.id, GenerationStage::Resolve, attempt);
            shot.reset_attempt_state();
            if let Some(reason) = &pending_degraded {
                shot.style_degraded = true;
                shot.style_degraded_reason = Some(reason.clone());
            }

            let resolved_mode = if shot.generation_mode == GenerationMode::Continuity {
                resolve_continuity_mode(shot.continuity_mode, &caps, shot.frame_bridge.is_some())
            } else {
                ContinuityMode::None
            };

            let ctx = MechanismContext {
                user_id,
                session: &session,
                shot: &shot,
                resolved_mode,
                caps: &caps,
                inherited_seed,
            };
            let mech = match self.mechanism.resolve(&ctx).await {
                Ok(m) => m,
                Err(e) => return self.fail_shot(shot, e.to_string()).await,
            };
            shot.continuity_mechanism_used = mech.mechanism;
            shot.generated_keyframe_url = mech.generated_keyframe_url.clone();
            shot.style_transfer_applied = mech.style_transfer_applied;
            if mech.style_degraded {
                mark_style_degraded(&mut shot);
            }

            if mech.generated_keyframe_url.is_some() {
                shot.transition(ShotStatus::GeneratingKeyframe);
            }
            shot.transition(ShotStatus::GeneratingVideo);

            self.observer
                .on_stage(&shot.id, GenerationStage::Generate, attempt);
            let options = GenerationOptions {
                model_id: shot.model_id.clone(),
                start_image_url: mech.start_image_url.clone(),
                style_reference_url: mech.style_reference_url.clone(),
                style_strength: shot.style_strength,
                character_asset_id: if caps.supports_native_character_reference {
                    shot.character_asset_id.clone()
                } else {
                    None
                },
                seed: inherited_seed,
            };
            // Thrown errors are never retried; only quality-gate misses are.
            let result = match self.video.generate_video(&shot.user_prompt, &options).await {
                Ok(r) => r,
                Err(e) => {
                    return self.fail_shot(shot, format!("video generation failed: {e}")).await;
                }
            };
            SeedPersistence::record(&mut shot, &result, &caps);
            shot.video_asset_id = Some(result.asset_id.clone());

            let gated = shot.generation_mode == GenerationMode::Continuity
                && !matches!(
                    mech.mechanism,
                    ContinuityMechanism::None | ContinuityMechanism::SeedOnly
                );
            if !gated {
                return self.complete_shot(user_id, &session, shot, &result.video_url).await;
            }

            let reference_url =
                MechanismHandler::effective_style_reference(&session, &shot).frame_url.clone();

            self.observer
                .on_stage(&shot.id, GenerationStage::Grade, attempt);
            let graded = self
                .grading
                .grade_output(user_id, &result.video_url, &reference_url)
                .await;
            if graded.graded_frame_url.is_some() {
                shot.style_transfer_applied = true;
            }
            shot.graded_frame_url = graded.graded_frame_url.clone();
            if graded.degraded {
                mark_style_degraded(&mut shot);
            }

            self.observer
                .on_stage(&shot.id, GenerationStage::Gate, attempt);
            let gate = self
                .run_gate(user_id, &shot, &mech.mechanism, &caps, &reference_url, &result.video_url, &thresholds)
                .await;
            shot.style_score = gate.style_score;
            shot.identity_score = gate.identity_score;
            shot.quality_score = combined_score(&gate);

            if gate.passed {
                return self.complete_shot(user_id, &session, shot, &result.video_url).await;
            }

            self.observer
                .on_stage(&shot.id, GenerationStage::Adjust, attempt);
            if policy.auto_retry && attempt < policy.max_attempts() {
                if let Some(adjustment) = adjust_for_quality_gate(&shot, &gate, &thresholds) {
                    shot.style_strength = adjustment.style_strength;
                    if let Some(face) = adjustment.face_strength {
                        shot.face_strength = Some(face);
                    }
                    if adjustment.degraded_reason.is_some() {
                        pending_degraded = adjustment.degraded_reason;
                    }
                    shot.retry_count += 1;
                    attempt += 1;
                    continue;
                }
                info!(shot_id = %shot.id, "No further adjustment possible, accepting output");
            }

            // Retries exhausted or no knob left: keep the best-effort
            // output with its scores on record.
            return self.complete_shot(user_id, &session, shot, &result.video_url).await;
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_gate(
        &self,
        user_id: &str,
        shot: &Shot,
        mechanism: &ContinuityMechanism,
        caps: &shotflow_models::ProviderCapabilities,
        reference_url: &str,
        video_url: &str,
        thresholds: &shotflow_models::QualityThresholds,
    ) -> QualityGateResult {
        let mut request = QualityGateRequest::new(reference_url, video_url);
        request.style_threshold = thresholds.style;
        request.identity_threshold = thresholds.identity;

        let identity_gated = matches!(mechanism, ContinuityMechanism::PulidKeyframe)
            || caps.supports_native_character_reference;
        if identity_gated {
            if let Some(asset_id) = &shot.character_asset_id {
                match self.character.resolve_asset(user_id, asset_id).await {
                    Ok(asset) => request.character_reference_url = Some(asset.primary_image_url),
                    Err(e) => {
                        warn!("Could not resolve character asset for gating, skipping: {e}")
                    }
                }
            }
        }

        match self.quality.evaluate(&request).await {
            Ok(gate) => gate,
            Err(e) => {
                // A broken gate never blocks output; it just stops scoring.
                warn!(shot_id = %shot.id, "Quality gate unavailable, accepting output: {e}");
                QualityGateResult {
                    style_score: None,
                    identity_score: None,
                    passed: true,
                }
            }
        }
    }

    async fn complete_shot(
        &self,
        user_id: &str,
        session: &shotflow_models::Session,
        mut shot: Shot,
        video_url: &str,
    ) -> EngineResult<Shot> {
        shot.transition(ShotStatus::Completed);
        shot.generated_at = Some(Utc::now());
        shot.error = None;

        self.observer
            .on_stage(&shot.id, GenerationStage::Persist, shot.retry_count + 1);
        self.persist_shot(&shot).await?;
        self.observer
            .on_stage(&shot.id, GenerationStage::Completed, shot.retry_count + 1);
        info!(shot_id = %shot.id, retries = shot.retry_count, "Shot completed");

        if session.default_settings.auto_extract_frame_bridge {
            if let Err(e) = self
                .attach_bridge_to_next(user_id, &shot, video_url)
                .await
            {
                warn!(shot_id = %shot.id, "Bridge frame extraction failed: {e}");
            }
        }
        Ok(shot)
    }

    async fn fail_shot(&self, mut shot: Shot, reason: String) -> EngineResult<Shot> {
        warn!(shot_id = %shot.id, "Shot failed: {reason}");
        shot.transition(ShotStatus::Failed);
        shot.error = Some(reason);

        self.observer
            .on_stage(&shot.id, GenerationStage::Persist, shot.retry_count + 1);
        self.persist_shot(&shot).await?;
        self.observer
            .on_stage(&shot.id, GenerationStage::Failed, shot.retry_count + 1);
        Ok(shot)
    }

    /// Merge the shot into a freshly fetched session under CAS, retrying a
    /// bounded number of times on version conflicts.
    async fn persist_shot(&self, shot: &Shot) -> EngineResult<()> {
        let attempts = self.config.persist_attempts.max(1);
        let mut attempt = 1;
        loop {
            let mut session = self.store.get_required(&shot.session_id).await?;
            session.upsert_shot(shot.clone());
            let expected = session.version;
            match self.store.save_with_version(&mut session, expected).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_version_mismatch() && attempt < attempts => {
                    warn!(shot_id = %shot.id, attempt, "Version conflict persisting shot, refetching");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Extract a tail frame from the finished shot and attach it to the
    /// next draft shot in sequence.
    async fn attach_bridge_to_next(
        &self,
        user_id: &str,
        shot: &Shot,
        video_url: &str,
    ) -> EngineResult<()> {
        let bridge = self
            .frames
            .extract_bridge_frame(user_id, video_url, Some(&shot.id))
            .await?;
        let sequence_index = shot.sequence_index;
        self.store
            .update(&shot.session_id, self.config.persist_attempts, move |session| {
                let next = session
                    .shots
                    .iter_mut()
                    .filter(|s| s.sequence_index > sequence_index)
                    .min_by_key(|s| s.sequence_index);
                if let Some(next) = next {
                    if next.status == ShotStatus::Draft {
                        next.frame_bridge = Some(bridge.clone());
                    }
                }
            })
            .await?;
        Ok(())
    }
}

/// Mark a shot's style as degraded without clobbering a reason already set
/// for this attempt (e.g. by a gate adjustment).
fn mark_style_degraded(shot: &mut Shot) {
    shot.style_degraded = true;
    if shot.style_degraded_reason.is_none() {
        shot.style_degraded_reason = Some("style-transfer-unavailable".to_string());
    }
}

/// Combined quality score: the weakest of the available dimensions.
fn combined_score(gate: &QualityGateResult) -> Option<f32> {
    match (gate.style_score, gate.identity_score) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}
