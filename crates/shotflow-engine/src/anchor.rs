//! Visual-anchor validation ahead of generation.

use shotflow_models::{Backend, ContinuityMode, GenerationMode, ProviderCapabilities, Session, Shot};

use crate::error::{EngineError, EngineResult};

/// Pre-flight checks that a shot's continuity request can be anchored on
/// something the backend accepts.
pub struct AnchorService;

impl AnchorService {
    /// Reject continuity requests against backends with no visual anchor at
    /// all. Shots in standard mode, or with continuity mode `none`, always
    /// pass.
    pub fn validate(
        backend: Backend,
        caps: &ProviderCapabilities,
        mode: GenerationMode,
        requested: ContinuityMode,
    ) -> EngineResult<()> {
        if mode == GenerationMode::Standard || requested == ContinuityMode::None {
            return Ok(());
        }
        if caps.has_no_visual_anchor() {
            return Err(EngineError::UnsupportedContinuity { backend });
        }
        Ok(())
    }

    /// Whether this shot may use the session's scene proxy as its start
    /// anchor: the session opted in, the proxy is built, and the shot
    /// carries a camera adjustment.
    pub fn scene_proxy_eligible(session: &Session, shot: &Shot) -> bool {
        session.default_settings.use_scene_proxy
            && session
                .scene_proxy
                .as_ref()
                .map(|p| p.is_ready())
                .unwrap_or(false)
            && shot.camera.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shotflow_models::{
        CameraPose, Resolution, SceneProxy, SceneProxyId, SceneProxyStatus, SceneProxyType,
        SessionSettings, StyleReference,
    };

    fn session_with_proxy(use_scene_proxy: bool, status: SceneProxyStatus) -> Session {
        let mut session = Session::new(
            "u1",
            "s",
            StyleReference::new(
                "https://cdn/ref.png",
                Resolution {
                    width: 1280,
                    height: 720,
                },
            ),
            SessionSettings {
                use_scene_proxy,
                ..Default::default()
            },
        );
        session.scene_proxy = Some(SceneProxy {
            id: SceneProxyId::new(),
            source_video_id: "v1".into(),
            proxy_type: SceneProxyType::DepthParallax,
            reference_frame_url: "https://cdn/proxy-ref.png".into(),
            depth_map_url: "https://cdn/proxy-depth.png".into(),
            status,
            error: None,
            created_at: chrono::Utc::now(),
        });
        session
    }

    #[test]
    fn test_continuity_against_anchorless_backend_fails() {
        let caps = ProviderCapabilities::default();
        let err = AnchorService::validate(
            Backend::Hailuo,
            &caps,
            GenerationMode::Continuity,
            ContinuityMode::StyleMatch,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedContinuity { .. }));
    }

    #[test]
    fn test_standard_mode_always_passes() {
        let caps = ProviderCapabilities::default();
        assert!(AnchorService::validate(
            Backend::Hailuo,
            &caps,
            GenerationMode::Standard,
            ContinuityMode::StyleMatch,
        )
        .is_ok());
    }

    #[test]
    fn test_proxy_eligibility_requires_all_three_conditions() {
        let session = session_with_proxy(true, SceneProxyStatus::Ready);
        let mut shot = Shot::draft(session.id.clone(), 0, "p", "veo-3");
        assert!(!AnchorService::scene_proxy_eligible(&session, &shot));

        shot.camera = Some(CameraPose::identity());
        assert!(AnchorService::scene_proxy_eligible(&session, &shot));

        let opted_out = session_with_proxy(false, SceneProxyStatus::Ready);
        assert!(!AnchorService::scene_proxy_eligible(&opted_out, &shot));

        let not_ready = session_with_proxy(true, SceneProxyStatus::Failed);
        assert!(!AnchorService::scene_proxy_eligible(&not_ready, &shot));
    }
}
