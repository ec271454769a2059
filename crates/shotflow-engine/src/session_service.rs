//! Session lifecycle: creation, shot management, scene proxies.

use std::sync::Arc;

use tracing::{info, warn};

use shotflow_media::FrameGrabber;
use shotflow_models::{
    FrameBridge, NewShotRequest, SceneProxy, Session, SessionId, SessionSettings, SessionStatus,
    Shot, ShotId, ShotStatus,
};
use shotflow_store::{SessionStore, VersionedStore};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::frames::FrameExtraction;
use crate::providers::VideoGenerator;
use crate::scene_proxy::SceneProxyService;
use crate::style_reference::StyleReferenceService;

/// Where the session's primary style reference comes from.
pub enum StyleSource {
    /// An already-extracted or uploaded frame
    Frame { bytes: Vec<u8> },
    /// A source video; a representative frame is picked automatically
    /// unless a timestamp is given
    Video {
        video_id: String,
        url: String,
        timestamp: Option<f64>,
    },
}

/// Inputs for creating a session.
pub struct CreateSessionRequest {
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub settings: Option<SessionSettings>,
    pub style_source: StyleSource,
}

/// Patch applied to a draft shot. Absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateShotRequest {
    pub user_prompt: Option<String>,
    pub generation_mode: Option<shotflow_models::GenerationMode>,
    pub continuity_mode: Option<shotflow_models::ContinuityMode>,
    pub style_strength: Option<f32>,
    pub style_reference_id: Option<ShotId>,
    pub character_asset_id: Option<String>,
    pub face_strength: Option<f32>,
    pub camera: Option<shotflow_models::CameraPose>,
    pub model_id: Option<String>,
}

/// CRUD and composition operations on sessions and their shots.
pub struct SessionService<S> {
    store: Arc<SessionStore<S>>,
    style_refs: Arc<StyleReferenceService>,
    frames: Arc<FrameExtraction>,
    grabber: Arc<dyn FrameGrabber>,
    scene_proxy: Arc<SceneProxyService>,
    video: Arc<dyn VideoGenerator>,
    config: EngineConfig,
}

impl<S: VersionedStore> SessionService<S> {
    pub fn new(
        store: Arc<SessionStore<S>>,
        style_refs: Arc<StyleReferenceService>,
        frames: Arc<FrameExtraction>,
        grabber: Arc<dyn FrameGrabber>,
        scene_proxy: Arc<SceneProxyService>,
        video: Arc<dyn VideoGenerator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            style_refs,
            frames,
            grabber,
            scene_proxy,
            video,
            config,
        }
    }

    /// Create a session anchored on a style reference built from the given
    /// source.
    pub async fn create_session(&self, request: CreateSessionRequest) -> EngineResult<Session> {
        if request.name.trim().is_empty() {
            return Err(EngineError::invalid_request("session name is empty"));
        }

        let reference = match request.style_source {
            StyleSource::Frame { bytes } => {
                self.style_refs
                    .build_from_frame(&request.user_id, &bytes, None, 0.0)
                    .await?
            }
            StyleSource::Video {
                video_id,
                url,
                timestamp,
            } => {
                let (bytes, ts) = match timestamp {
                    Some(t) => (self.grabber.extract_frame_at(&url, t).await?, t),
                    None => self.frames.extract_best_frame(&url).await?,
                };
                self.style_refs
                    .build_from_frame(&request.user_id, &bytes, Some(&video_id), ts)
                    .await?
            }
        };

        let mut session = Session::new(
            request.user_id,
            request.name,
            reference,
            request.settings.unwrap_or_default(),
        );
        session.description = request.description;
        self.store.create(&session).await?;
        info!(session_id = %session.id, "Created session");
        Ok(session)
    }

    pub async fn get_session(&self, user_id: &str, id: &SessionId) -> EngineResult<Session> {
        let session = self.store.get_required(id).await?;
        self.ensure_owner(user_id, &session)?;
        Ok(session)
    }

    pub async fn list_sessions(&self, user_id: &str) -> EngineResult<Vec<Session>> {
        Ok(self.store.list_for_user(user_id).await?)
    }

    pub async fn delete_session(&self, user_id: &str, id: &SessionId) -> EngineResult<()> {
        let session = self.store.get_required(id).await?;
        self.ensure_owner(user_id, &session)?;
        self.store.delete(id).await?;
        info!(session_id = %id, "Deleted session");
        Ok(())
    }

    pub async fn set_status(
        &self,
        user_id: &str,
        id: &SessionId,
        status: SessionStatus,
    ) -> EngineResult<Session> {
        let session = self.store.get_required(id).await?;
        self.ensure_owner(user_id, &session)?;
        Ok(self
            .store
            .update(id, self.config.persist_attempts, move |s| s.status = status)
            .await?)
    }

    /// Replace the session defaults. Only future shots pick up the new
    /// values; existing shots keep what they were created with.
    pub async fn update_settings(
        &self,
        user_id: &str,
        id: &SessionId,
        settings: SessionSettings,
    ) -> EngineResult<Session> {
        let session = self.store.get_required(id).await?;
        self.ensure_owner(user_id, &session)?;
        let normalized = settings.normalized();
        Ok(self
            .store
            .update(id, self.config.persist_attempts, move |s| {
                s.default_settings = normalized.clone();
            })
            .await?)
    }

    /// Append a draft shot, filling unspecified fields from the session
    /// defaults. When the last shot completed and automatic bridging is on,
    /// its tail frame is attached to the new shot.
    pub async fn add_shot(
        &self,
        user_id: &str,
        session_id: &SessionId,
        request: NewShotRequest,
    ) -> EngineResult<(Session, ShotId)> {
        if request.user_prompt.trim().is_empty() {
            return Err(EngineError::invalid_request("shot prompt is empty"));
        }
        let session = self.store.get_required(session_id).await?;
        self.ensure_owner(user_id, &session)?;
        let settings = session.default_settings.clone();

        let bridge = if settings.auto_extract_frame_bridge {
            self.bridge_from_last_shot(user_id, &session).await
        } else {
            None
        };

        let shot_id = ShotId::new();
        let new_id = shot_id.clone();
        let saved = self
            .store
            .update(session_id, self.config.persist_attempts, move |s| {
                let mut shot = Shot::draft(
                    s.id.clone(),
                    s.next_sequence_index(),
                    request.user_prompt.clone(),
                    request
                        .model_id
                        .clone()
                        .unwrap_or_else(|| settings.default_model.clone()),
                );
                shot.id = new_id.clone();
                shot.generation_mode = request.generation_mode.unwrap_or(settings.generation_mode);
                shot.continuity_mode = request
                    .continuity_mode
                    .unwrap_or(settings.default_continuity_mode);
                shot.style_strength = request
                    .style_strength
                    .unwrap_or(settings.default_style_strength)
                    .clamp(0.0, 1.0);
                shot.style_reference_id = request.style_reference_id.clone();
                shot.character_asset_id = request.character_asset_id.clone();
                shot.face_strength = request.face_strength.map(|f| f.clamp(0.0, 1.0));
                shot.camera = request.camera;
                shot.frame_bridge = bridge.clone();
                s.upsert_shot(shot);
            })
            .await?;
        Ok((saved, shot_id))
    }

    /// Patch a draft shot. Shots that started generating are immutable.
    pub async fn update_shot(
        &self,
        user_id: &str,
        session_id: &SessionId,
        shot_id: &ShotId,
        patch: UpdateShotRequest,
    ) -> EngineResult<Shot> {
        let attempts = self.config.persist_attempts.max(1);
        let mut attempt = 1;
        loop {
            let mut session = self.store.get_required(session_id).await?;
            self.ensure_owner(user_id, &session)?;
            let expected = session.version;
            let shot = session
                .shot_mut(shot_id)
                .ok_or_else(|| EngineError::invalid_request(format!("unknown shot {shot_id}")))?;
            if shot.status != ShotStatus::Draft {
                return Err(EngineError::invalid_request(format!(
                    "shot {shot_id} is {} and can no longer be edited",
                    shot.status
                )));
            }

            if let Some(prompt) = &patch.user_prompt {
                shot.user_prompt = prompt.clone();
            }
            if let Some(mode) = patch.generation_mode {
                shot.generation_mode = mode;
            }
            if let Some(mode) = patch.continuity_mode {
                shot.continuity_mode = mode;
            }
            if let Some(strength) = patch.style_strength {
                shot.style_strength = strength.clamp(0.0, 1.0);
            }
            if let Some(reference_id) = &patch.style_reference_id {
                shot.style_reference_id = Some(reference_id.clone());
            }
            if let Some(asset_id) = &patch.character_asset_id {
                shot.character_asset_id = Some(asset_id.clone());
            }
            if let Some(face) = patch.face_strength {
                shot.face_strength = Some(face.clamp(0.0, 1.0));
            }
            if let Some(camera) = patch.camera {
                shot.camera = Some(camera);
            }
            if let Some(model_id) = &patch.model_id {
                shot.model_id = model_id.clone();
            }
            let updated = shot.clone();

            match self.store.save_with_version(&mut session, expected).await {
                Ok(_) => return Ok(updated),
                Err(e) if e.is_version_mismatch() && attempt < attempts => {
                    warn!(session_id = %session_id, attempt, "Shot update lost a race, refetching");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Remove a shot. Later shots keep their sequence indices; gaps are
    /// allowed, only ordering matters.
    pub async fn remove_shot(
        &self,
        user_id: &str,
        session_id: &SessionId,
        shot_id: &ShotId,
    ) -> EngineResult<Session> {
        let session = self.store.get_required(session_id).await?;
        self.ensure_owner(user_id, &session)?;
        let target = shot_id.clone();
        Ok(self
            .store
            .update(session_id, self.config.persist_attempts, move |s| {
                s.shots.retain(|shot| shot.id != target);
            })
            .await?)
    }

    /// Build a depth proxy from a source video and attach it to the
    /// session. A proxy that failed the depth-variance check is still
    /// recorded, carrying its failure reason.
    pub async fn build_scene_proxy(
        &self,
        user_id: &str,
        session_id: &SessionId,
        source_video_id: &str,
        video_url: &str,
    ) -> EngineResult<SceneProxy> {
        let session = self.store.get_required(session_id).await?;
        self.ensure_owner(user_id, &session)?;

        let proxy = self
            .scene_proxy
            .create_proxy_from_video(user_id, source_video_id, video_url)
            .await?;
        let attached = proxy.clone();
        self.store
            .update(session_id, self.config.persist_attempts, move |s| {
                s.scene_proxy = Some(attached.clone());
            })
            .await?;
        Ok(proxy)
    }

    fn ensure_owner(&self, user_id: &str, session: &Session) -> EngineResult<()> {
        if session.user_id != user_id {
            return Err(EngineError::invalid_request(format!(
                "session {} does not belong to this user",
                session.id
            )));
        }
        Ok(())
    }

    async fn bridge_from_last_shot(
        &self,
        user_id: &str,
        session: &Session,
    ) -> Option<FrameBridge> {
        let last = session.shots.iter().max_by_key(|s| s.sequence_index)?;
        if last.status != ShotStatus::Completed {
            return None;
        }
        let asset_id = last.video_asset_id.as_ref()?;
        let url = match self.video.get_video_url(asset_id).await {
            Ok(Some(url)) => url,
            Ok(None) => return None,
            Err(e) => {
                warn!("Could not resolve previous shot's video: {e}");
                return None;
            }
        };
        match self
            .frames
            .extract_bridge_frame(user_id, &url, Some(&last.id))
            .await
        {
            Ok(bridge) => Some(bridge),
            Err(e) => {
                warn!("Bridge frame extraction failed, shot starts without one: {e}");
                None
            }
        }
    }
}
