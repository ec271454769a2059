//! Identity-preserving keyframe synthesis.

use std::sync::Arc;

use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::providers::{CharacterAsset, CharacterAssets, KeyframeSynthesizer};

/// Synthesizes identity-preserving keyframes through the face-consistency
/// (pulid) route.
pub struct CharacterKeyframeService {
    assets: Option<Arc<dyn CharacterAssets>>,
    synthesizer: Option<Arc<dyn KeyframeSynthesizer>>,
}

impl CharacterKeyframeService {
    pub fn new(
        assets: Option<Arc<dyn CharacterAssets>>,
        synthesizer: Option<Arc<dyn KeyframeSynthesizer>>,
    ) -> Self {
        Self {
            assets,
            synthesizer,
        }
    }

    /// Whether the identity mechanism is configured at all.
    pub fn is_available(&self) -> bool {
        self.assets.is_some() && self.synthesizer.is_some()
    }

    /// Look up the character asset used for generation and gating.
    pub async fn resolve_asset(
        &self,
        user_id: &str,
        asset_id: &str,
    ) -> EngineResult<CharacterAsset> {
        let assets = self
            .assets
            .as_ref()
            .ok_or(EngineError::CharacterUnavailable)?;
        assets.get_asset_for_generation(user_id, asset_id).await
    }

    /// Synthesize an identity-preserving keyframe. Requested but
    /// unconfigured identity support is a fatal
    /// [`EngineError::CharacterUnavailable`].
    pub async fn synthesize(
        &self,
        user_id: &str,
        prompt: &str,
        character_asset_id: &str,
        face_strength: f32,
        style_image_url: Option<&str>,
    ) -> EngineResult<String> {
        let synthesizer = self
            .synthesizer
            .as_ref()
            .ok_or(EngineError::CharacterUnavailable)?;
        let asset = self.resolve_asset(user_id, character_asset_id).await?;

        let url = synthesizer
            .synthesize_character_keyframe(
                prompt,
                &asset.primary_image_url,
                face_strength,
                style_image_url,
            )
            .await?;
        debug!(character_asset_id, "Synthesized character keyframe");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_facility_is_fatal() {
        let service = CharacterKeyframeService::new(None, None);
        assert!(!service.is_available());
        let err = service
            .synthesize("u1", "prompt", "char-1", 0.5, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CharacterUnavailable));
    }
}
