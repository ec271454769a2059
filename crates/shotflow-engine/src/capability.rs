//! Provider capability negotiation and continuity-mode degradation.

use tracing::debug;

use shotflow_models::{Backend, ContinuityMode, ProviderCapabilities};

/// Maps model identifiers to backends and their capability flags.
pub struct ProviderCapabilityAdapter;

impl ProviderCapabilityAdapter {
    /// Resolve a model identifier to its backend family by prefix. Unknown
    /// identifiers resolve to [`Backend::Unknown`], which advertises no
    /// capabilities so continuity degrades instead of erroring later.
    pub fn backend_for_model(model_id: &str) -> Backend {
        let id = model_id.to_ascii_lowercase();
        if id.starts_with("kling") {
            Backend::Kling
        } else if id.starts_with("veo") {
            Backend::Veo
        } else if id.starts_with("runway") || id.starts_with("gen4") {
            Backend::Runway
        } else if id.starts_with("luma") || id.starts_with("ray") {
            Backend::Luma
        } else if id.starts_with("hailuo") || id.starts_with("minimax") {
            Backend::Hailuo
        } else {
            Backend::Unknown
        }
    }

    /// Capability flags for a backend.
    pub fn capabilities(backend: Backend) -> ProviderCapabilities {
        match backend {
            Backend::Kling => ProviderCapabilities {
                supports_native_style_reference: false,
                supports_native_character_reference: false,
                supports_start_image: true,
                supports_seed_persistence: true,
                supports_extend_video: true,
            },
            Backend::Veo => ProviderCapabilities {
                supports_native_style_reference: true,
                supports_native_character_reference: false,
                supports_start_image: true,
                supports_seed_persistence: false,
                supports_extend_video: false,
            },
            Backend::Runway => ProviderCapabilities {
                supports_native_style_reference: true,
                supports_native_character_reference: true,
                supports_start_image: true,
                supports_seed_persistence: true,
                supports_extend_video: false,
            },
            Backend::Luma => ProviderCapabilities {
                supports_native_style_reference: false,
                supports_native_character_reference: false,
                supports_start_image: true,
                supports_seed_persistence: true,
                supports_extend_video: true,
            },
            Backend::Hailuo | Backend::Unknown => ProviderCapabilities::default(),
        }
    }

    /// Backend and capabilities for a model in one call.
    pub fn for_model(model_id: &str) -> (Backend, ProviderCapabilities) {
        let backend = Self::backend_for_model(model_id);
        (backend, Self::capabilities(backend))
    }
}

/// Degrade a requested continuity mode to one the backend can actually
/// deliver.
///
/// Pure function of (requested mode, capability flags, frame-bridge
/// availability): no hidden state, so it is independently unit-testable.
/// The returned mode never requires a capability absent from `caps`.
pub fn resolve_continuity_mode(
    requested: ContinuityMode,
    caps: &ProviderCapabilities,
    has_frame_bridge: bool,
) -> ContinuityMode {
    // Neither anchor mechanism exists: continuity is unachievable.
    if caps.has_no_visual_anchor() {
        return ContinuityMode::None;
    }

    let resolved = match requested {
        ContinuityMode::FrameBridge => {
            if has_frame_bridge && caps.supports_start_image {
                ContinuityMode::FrameBridge
            } else if caps.supports_native_style_reference {
                ContinuityMode::Native
            } else {
                // supports_start_image must hold here, so style-match is
                // deliverable.
                ContinuityMode::StyleMatch
            }
        }
        ContinuityMode::Native => {
            if caps.supports_native_style_reference {
                ContinuityMode::Native
            } else if caps.supports_start_image {
                ContinuityMode::StyleMatch
            } else {
                ContinuityMode::None
            }
        }
        ContinuityMode::StyleMatch => {
            if caps.supports_native_style_reference {
                // Upgrade: the native mechanism is strictly better.
                ContinuityMode::Native
            } else {
                ContinuityMode::StyleMatch
            }
        }
        ContinuityMode::None => ContinuityMode::None,
    };

    if resolved != requested {
        debug!(%requested, %resolved, "Degraded continuity mode");
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(native: bool, start: bool) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_native_style_reference: native,
            supports_start_image: start,
            ..Default::default()
        }
    }

    #[test]
    fn test_backend_prefix_mapping() {
        assert_eq!(
            ProviderCapabilityAdapter::backend_for_model("kling-2.1-pro"),
            Backend::Kling
        );
        assert_eq!(
            ProviderCapabilityAdapter::backend_for_model("veo-3"),
            Backend::Veo
        );
        assert_eq!(
            ProviderCapabilityAdapter::backend_for_model("Runway-Gen4"),
            Backend::Runway
        );
        assert_eq!(
            ProviderCapabilityAdapter::backend_for_model("mystery-model"),
            Backend::Unknown
        );
    }

    #[test]
    fn test_unknown_backend_has_no_capabilities() {
        let (_, caps) = ProviderCapabilityAdapter::for_model("mystery-model");
        assert!(caps.has_no_visual_anchor());
        assert!(!caps.supports_seed_persistence);
    }

    #[test]
    fn test_no_anchor_resolves_to_none() {
        for requested in [
            ContinuityMode::FrameBridge,
            ContinuityMode::StyleMatch,
            ContinuityMode::Native,
            ContinuityMode::None,
        ] {
            assert_eq!(
                resolve_continuity_mode(requested, &caps(false, false), true),
                ContinuityMode::None
            );
        }
    }

    #[test]
    fn test_frame_bridge_with_bridge_and_start_image() {
        assert_eq!(
            resolve_continuity_mode(ContinuityMode::FrameBridge, &caps(false, true), true),
            ContinuityMode::FrameBridge
        );
    }

    #[test]
    fn test_frame_bridge_without_bridge_prefers_native() {
        assert_eq!(
            resolve_continuity_mode(ContinuityMode::FrameBridge, &caps(true, true), false),
            ContinuityMode::Native
        );
    }

    #[test]
    fn test_frame_bridge_without_bridge_or_native_falls_to_style_match() {
        assert_eq!(
            resolve_continuity_mode(ContinuityMode::FrameBridge, &caps(false, true), false),
            ContinuityMode::StyleMatch
        );
    }

    #[test]
    fn test_native_without_native_support_falls_to_style_match() {
        assert_eq!(
            resolve_continuity_mode(ContinuityMode::Native, &caps(false, true), false),
            ContinuityMode::StyleMatch
        );
    }

    #[test]
    fn test_style_match_upgrades_to_native() {
        assert_eq!(
            resolve_continuity_mode(ContinuityMode::StyleMatch, &caps(true, true), false),
            ContinuityMode::Native
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let c = caps(true, true);
        for _ in 0..10 {
            assert_eq!(
                resolve_continuity_mode(ContinuityMode::FrameBridge, &c, false),
                ContinuityMode::Native
            );
        }
    }

    #[test]
    fn test_resolved_mode_never_exceeds_capabilities() {
        let all_caps = [
            caps(false, false),
            caps(false, true),
            caps(true, false),
            caps(true, true),
        ];
        let modes = [
            ContinuityMode::FrameBridge,
            ContinuityMode::StyleMatch,
            ContinuityMode::Native,
            ContinuityMode::None,
        ];
        for c in &all_caps {
            for m in modes {
                for bridge in [false, true] {
                    let resolved = resolve_continuity_mode(m, c, bridge);
                    match resolved {
                        ContinuityMode::FrameBridge => {
                            assert!(c.supports_start_image && bridge)
                        }
                        ContinuityMode::StyleMatch => assert!(c.supports_start_image),
                        ContinuityMode::Native => {
                            assert!(c.supports_native_style_reference)
                        }
                        ContinuityMode::None => {}
                    }
                }
            }
        }
    }
}
