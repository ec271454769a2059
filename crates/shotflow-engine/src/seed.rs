//! Deterministic seed threading between shots.

use chrono::Utc;
use tracing::debug;

use shotflow_models::{ProviderCapabilities, SeedInfo, Shot};

use crate::capability::ProviderCapabilityAdapter;
use crate::providers::GenerationResult;

/// Extracts seeds from generation results and threads them into subsequent
/// requests when the backend supports it.
pub struct SeedPersistence;

impl SeedPersistence {
    /// Record the seed a generation reported, if the backend honors seeds.
    pub fn record(shot: &mut Shot, result: &GenerationResult, caps: &ProviderCapabilities) {
        if !caps.supports_seed_persistence {
            return;
        }
        if let Some(seed) = result.seed {
            debug!(shot_id = %shot.id, seed, "Recorded generation seed");
            shot.seed_info = Some(SeedInfo {
                seed,
                model_id: shot.model_id.clone(),
                recorded_at: Utc::now(),
            });
        }
    }

    /// Seed to inherit from the previous shot, if any. Seeds only carry
    /// within the same backend family and only when that backend persists
    /// them.
    pub fn inherit(
        previous: Option<&Shot>,
        model_id: &str,
        caps: &ProviderCapabilities,
    ) -> Option<u64> {
        if !caps.supports_seed_persistence {
            return None;
        }
        let info = previous?.seed_info.as_ref()?;
        let prev_backend = ProviderCapabilityAdapter::backend_for_model(&info.model_id);
        let next_backend = ProviderCapabilityAdapter::backend_for_model(model_id);
        if prev_backend == next_backend {
            Some(info.seed)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shotflow_models::{Backend, ContinuityMode, GenerationMode, SessionId};

    fn shot(model_id: &str) -> Shot {
        let mut s = Shot::draft(SessionId::new(), 0, "p", model_id);
        s.generation_mode = GenerationMode::Standard;
        s.continuity_mode = ContinuityMode::None;
        s
    }

    fn result(seed: Option<u64>) -> GenerationResult {
        GenerationResult {
            asset_id: "asset-1".into(),
            video_url: "https://cdn/v.mp4".into(),
            seed,
        }
    }

    #[test]
    fn test_record_requires_capability() {
        let mut s = shot("kling-2.1");
        let caps = ProviderCapabilityAdapter::capabilities(
            ProviderCapabilityAdapter::backend_for_model("kling-2.1"),
        );
        SeedPersistence::record(&mut s, &result(Some(42)), &caps);
        assert_eq!(s.seed_info.as_ref().unwrap().seed, 42);

        let mut s2 = shot("veo-3");
        let veo_caps = ProviderCapabilityAdapter::capabilities(
            ProviderCapabilityAdapter::backend_for_model("veo-3"),
        );
        SeedPersistence::record(&mut s2, &result(Some(42)), &veo_caps);
        assert!(s2.seed_info.is_none());
    }

    #[test]
    fn test_inherit_same_backend_only() {
        let mut prev = shot("kling-2.1");
        prev.seed_info = Some(SeedInfo {
            seed: 7,
            model_id: "kling-2.1".into(),
            recorded_at: Utc::now(),
        });
        let kling_caps = ProviderCapabilityAdapter::capabilities(
            ProviderCapabilityAdapter::backend_for_model("kling-2.5"),
        );
        assert_eq!(
            SeedPersistence::inherit(Some(&prev), "kling-2.5", &kling_caps),
            Some(7)
        );
        let luma_caps = ProviderCapabilityAdapter::capabilities(
            ProviderCapabilityAdapter::backend_for_model("luma-ray2"),
        );
        assert_eq!(
            SeedPersistence::inherit(Some(&prev), "luma-ray2", &luma_caps),
            None
        );
    }

    #[test]
    fn test_inherit_without_previous_shot() {
        let caps = ProviderCapabilityAdapter::capabilities(Backend::Kling);
        assert_eq!(SeedPersistence::inherit(None, "kling-2.1", &caps), None);
    }
}
