//! Scene proxy construction and re-rendering.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use shotflow_media::{
    decode_rgb, encode_png, render_parallax, DepthMap, FrameGrabber, ProxyFrames,
};
use shotflow_models::{CameraPose, SceneProxy, SceneProxyId, SceneProxyStatus, SceneProxyType};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::frames::FrameExtraction;
use crate::providers::{DepthEstimator, ObjectStorage};

/// Builds depth-parallax proxies from source videos and re-renders them
/// from adjusted camera poses.
pub struct SceneProxyService {
    frames: Arc<FrameExtraction>,
    grabber: Arc<dyn FrameGrabber>,
    storage: Arc<dyn ObjectStorage>,
    depth_estimator: Option<Arc<dyn DepthEstimator>>,
    min_depth_variance: f32,
}

impl SceneProxyService {
    pub fn new(
        frames: Arc<FrameExtraction>,
        grabber: Arc<dyn FrameGrabber>,
        storage: Arc<dyn ObjectStorage>,
        depth_estimator: Option<Arc<dyn DepthEstimator>>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            frames,
            grabber,
            storage,
            depth_estimator,
            min_depth_variance: config.min_depth_variance,
        }
    }

    /// Build a proxy from a source video: pick a representative frame,
    /// obtain a depth map, and gate on depth variance. A frame without
    /// enough depth structure yields a `failed` proxy record, not an error.
    pub async fn create_proxy_from_video(
        &self,
        user_id: &str,
        source_video_id: &str,
        video_url: &str,
    ) -> EngineResult<SceneProxy> {
        let (frame_bytes, _timestamp) = self.frames.extract_best_frame(video_url).await?;
        let frame = decode_rgb(&frame_bytes)?;

        let depth = match &self.depth_estimator {
            Some(estimator) => match estimator.estimate_depth(&frame_bytes).await {
                Ok(map) => map,
                Err(e) => {
                    warn!("Depth estimator failed, using luminance fallback: {e}");
                    DepthMap::from_luminance(&frame)
                }
            },
            None => DepthMap::from_luminance(&frame),
        };

        let reference_stored = self
            .storage
            .save_from_buffer(
                user_id,
                &frame_bytes,
                "proxy-reference",
                "image/png",
                &HashMap::new(),
            )
            .await?;

        let depth_png = {
            let gray = depth.to_gray_image();
            let mut out = Vec::new();
            let mut cursor = std::io::Cursor::new(&mut out);
            gray.write_to(&mut cursor, image::ImageOutputFormat::Png)
                .map_err(|e| shotflow_media::MediaError::ImageEncode(e.to_string()))?;
            out
        };
        let depth_stored = self
            .storage
            .save_from_buffer(user_id, &depth_png, "proxy-depth", "image/png", &HashMap::new())
            .await?;

        let variance = depth.variance();
        let (status, error) = if variance < self.min_depth_variance {
            (
                SceneProxyStatus::Failed,
                Some(format!(
                    "depth variance {variance:.6} below minimum {:.6}; frame lacks parallax information",
                    self.min_depth_variance
                )),
            )
        } else {
            (SceneProxyStatus::Ready, None)
        };

        let proxy = SceneProxy {
            id: SceneProxyId::new(),
            source_video_id: source_video_id.to_string(),
            proxy_type: SceneProxyType::DepthParallax,
            reference_frame_url: reference_stored.view_url,
            depth_map_url: depth_stored.view_url,
            status,
            error,
            created_at: Utc::now(),
        };
        info!(proxy_id = %proxy.id, status = %proxy.status, variance, "Built scene proxy");
        Ok(proxy)
    }

    /// Re-render a ready proxy from an adjusted camera pose and upload the
    /// result. Returns the rendered frame's URL.
    pub async fn render_from_proxy(
        &self,
        user_id: &str,
        proxy: &SceneProxy,
        pose: &CameraPose,
    ) -> EngineResult<String> {
        let reference_bytes = self
            .grabber
            .extract_frame_at(&proxy.reference_frame_url, 0.0)
            .await?;
        let depth_bytes = self
            .grabber
            .extract_frame_at(&proxy.depth_map_url, 0.0)
            .await?;

        let reference = decode_rgb(&reference_bytes)?;
        let depth_gray = image::load_from_memory(&depth_bytes)
            .map_err(|e| shotflow_media::MediaError::ImageDecode(e.to_string()))?
            .to_luma8();
        let depth = DepthMap::from_gray_image(&depth_gray);

        let frames = ProxyFrames::new(reference, depth)?;
        let rendered = render_parallax(&frames, pose)?;
        let rendered_bytes = encode_png(&rendered)?;

        let mut metadata = HashMap::new();
        metadata.insert("yaw".to_string(), format!("{:.4}", pose.yaw));
        metadata.insert("pitch".to_string(), format!("{:.4}", pose.pitch));
        let stored = self
            .storage
            .save_from_buffer(user_id, &rendered_bytes, "proxy-render", "image/png", &metadata)
            .await?;
        Ok(stored.view_url)
    }
}
