//! Resolution of a continuity mode into the concrete mechanism and anchor
//! images a generation attempt will use.

use std::sync::Arc;

use tracing::{debug, warn};

use shotflow_models::{
    ContinuityMechanism, ContinuityMode, GenerationMode, ProviderCapabilities, Session, Shot,
    StyleReference,
};

use crate::anchor::AnchorService;
use crate::character::CharacterKeyframeService;
use crate::error::{EngineError, EngineResult};
use crate::scene_proxy::SceneProxyService;
use crate::style_reference::StyleReferenceService;

const DEFAULT_FACE_STRENGTH: f32 = 0.5;

/// Everything the resolver needs about the attempt being prepared.
pub struct MechanismContext<'a> {
    pub user_id: &'a str,
    pub session: &'a Session,
    pub shot: &'a Shot,
    /// Continuity mode after capability degradation
    pub resolved_mode: ContinuityMode,
    pub caps: &'a ProviderCapabilities,
    /// Seed inherited from the previous shot, if any
    pub inherited_seed: Option<u64>,
}

/// The concrete mechanism chosen for one attempt, with its anchor images.
#[derive(Debug, Clone, Default)]
pub struct ResolvedMechanism {
    pub mechanism: ContinuityMechanism,
    /// Start image passed to the backend, when the mechanism produces one
    pub start_image_url: Option<String>,
    /// Native style-reference conditioning image
    pub style_reference_url: Option<String>,
    /// Synthesized keyframe recorded on the shot
    pub generated_keyframe_url: Option<String>,
    /// True when post-hoc palette matching was applied to the keyframe
    pub style_transfer_applied: bool,
    /// True when the palette-matching step failed and the shot should carry
    /// a degradation marker
    pub style_degraded: bool,
}

/// Turns a resolved continuity mode into start/reference images.
///
/// Priority: a ready scene proxy with a camera adjustment beats every other
/// mechanism; otherwise the resolved mode picks the route, with the
/// character-consistency model taking over keyframe synthesis when the
/// session opted in and the shot names a character.
pub struct MechanismHandler {
    style_refs: Arc<StyleReferenceService>,
    character: Arc<CharacterKeyframeService>,
    scene_proxy: Arc<SceneProxyService>,
}

impl MechanismHandler {
    pub fn new(
        style_refs: Arc<StyleReferenceService>,
        character: Arc<CharacterKeyframeService>,
        scene_proxy: Arc<SceneProxyService>,
    ) -> Self {
        Self {
            style_refs,
            character,
            scene_proxy,
        }
    }

    /// The style reference in effect for a shot: the shot's own override,
    /// then the reference of the shot named by `style_reference_id`, then
    /// the session primary.
    pub fn effective_style_reference<'a>(session: &'a Session, shot: &'a Shot) -> &'a StyleReference {
        if let Some(reference) = &shot.style_reference {
            return reference;
        }
        if let Some(ref_shot_id) = &shot.style_reference_id {
            if let Some(reference) = session
                .shot(ref_shot_id)
                .and_then(|s| s.style_reference.as_ref())
            {
                return reference;
            }
        }
        &session.primary_style_reference
    }

    pub async fn resolve(&self, ctx: &MechanismContext<'_>) -> EngineResult<ResolvedMechanism> {
        if ctx.shot.generation_mode == GenerationMode::Standard {
            return Ok(self.resolve_standard(ctx));
        }
        if ctx.resolved_mode == ContinuityMode::None {
            return Ok(self.resolve_no_anchor(ctx));
        }

        // A ready scene proxy with a camera adjustment overrides the mode.
        if AnchorService::scene_proxy_eligible(ctx.session, ctx.shot) {
            match self.resolve_scene_proxy(ctx).await {
                Ok(resolved) => return Ok(resolved),
                Err(e) => {
                    warn!("Scene proxy render failed, falling back to continuity mode: {e}");
                }
            }
        }

        match ctx.resolved_mode {
            ContinuityMode::Native => Ok(self.resolve_native(ctx)),
            ContinuityMode::FrameBridge => self.resolve_frame_bridge(ctx),
            ContinuityMode::StyleMatch => self.resolve_style_match(ctx).await,
            ContinuityMode::None => unreachable!("handled above"),
        }
    }

    /// Standard mode still anchors on a bridge frame when one exists; after
    /// that, only the seed carries over.
    fn resolve_standard(&self, ctx: &MechanismContext<'_>) -> ResolvedMechanism {
        if let Some(bridge) = &ctx.shot.frame_bridge {
            if ctx.caps.supports_start_image {
                return ResolvedMechanism {
                    mechanism: ContinuityMechanism::FrameBridge,
                    start_image_url: Some(bridge.frame_url.clone()),
                    ..Default::default()
                };
            }
        }
        self.resolve_no_anchor(ctx)
    }

    fn resolve_no_anchor(&self, ctx: &MechanismContext<'_>) -> ResolvedMechanism {
        let mechanism = if ctx.inherited_seed.is_some() && ctx.caps.supports_seed_persistence {
            ContinuityMechanism::SeedOnly
        } else {
            ContinuityMechanism::None
        };
        ResolvedMechanism {
            mechanism,
            ..Default::default()
        }
    }

    async fn resolve_scene_proxy(
        &self,
        ctx: &MechanismContext<'_>,
    ) -> EngineResult<ResolvedMechanism> {
        // Eligibility guarantees both the proxy and the pose exist.
        let proxy = ctx
            .session
            .scene_proxy
            .as_ref()
            .ok_or_else(|| EngineError::invalid_request("scene proxy vanished"))?;
        let pose = ctx
            .shot
            .camera
            .as_ref()
            .ok_or_else(|| EngineError::invalid_request("camera pose vanished"))?;

        let url = self
            .scene_proxy
            .render_from_proxy(ctx.user_id, proxy, pose)
            .await?;
        debug!(shot_id = %ctx.shot.id, "Anchoring on scene-proxy render");
        Ok(ResolvedMechanism {
            mechanism: ContinuityMechanism::SceneProxy,
            start_image_url: Some(url),
            ..Default::default()
        })
    }

    fn resolve_native(&self, ctx: &MechanismContext<'_>) -> ResolvedMechanism {
        let reference = Self::effective_style_reference(ctx.session, ctx.shot);
        ResolvedMechanism {
            mechanism: ContinuityMechanism::NativeStyleRef,
            style_reference_url: Some(reference.frame_url.clone()),
            ..Default::default()
        }
    }

    fn resolve_frame_bridge(&self, ctx: &MechanismContext<'_>) -> EngineResult<ResolvedMechanism> {
        let bridge = ctx
            .shot
            .frame_bridge
            .as_ref()
            .ok_or(EngineError::MissingVisualAnchor {
                strategy: ContinuityMode::FrameBridge,
            })?;
        Ok(ResolvedMechanism {
            mechanism: ContinuityMechanism::FrameBridge,
            start_image_url: Some(bridge.frame_url.clone()),
            ..Default::default()
        })
    }

    /// Style-match route: synthesize a keyframe conditioned on the style
    /// reference, through the character-consistency model when the session
    /// opted in and the shot names a character asset.
    async fn resolve_style_match(
        &self,
        ctx: &MechanismContext<'_>,
    ) -> EngineResult<ResolvedMechanism> {
        let reference = Self::effective_style_reference(ctx.session, ctx.shot);

        let wants_character = ctx.session.default_settings.use_character_consistency
            && ctx.shot.character_asset_id.is_some();
        if wants_character {
            let asset_id = ctx.shot.character_asset_id.as_deref().unwrap_or_default();
            let face_strength = ctx.shot.face_strength.unwrap_or(DEFAULT_FACE_STRENGTH);
            let url = self
                .character
                .synthesize(
                    ctx.user_id,
                    &ctx.shot.user_prompt,
                    asset_id,
                    face_strength,
                    Some(&reference.frame_url),
                )
                .await?;
            return Ok(ResolvedMechanism {
                mechanism: ContinuityMechanism::PulidKeyframe,
                start_image_url: Some(url.clone()),
                generated_keyframe_url: Some(url),
                ..Default::default()
            });
        }

        if !self.style_refs.can_synthesize() {
            return Err(EngineError::MissingVisualAnchor {
                strategy: ContinuityMode::StyleMatch,
            });
        }
        let keyframe = self
            .style_refs
            .synthesize_style_keyframe(
                ctx.user_id,
                &ctx.shot.user_prompt,
                reference,
                ctx.shot.style_strength,
            )
            .await?;
        Ok(ResolvedMechanism {
            mechanism: ContinuityMechanism::IpAdapter,
            start_image_url: Some(keyframe.url.clone()),
            generated_keyframe_url: Some(keyframe.url),
            style_transfer_applied: !keyframe.palette_degraded,
            style_degraded: keyframe.palette_degraded,
            ..Default::default()
        })
    }
}
