//! End-to-end pipeline tests over the in-memory store with fake
//! collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{Rgb, RgbImage};

use shotflow_engine::{
    CharacterKeyframeService, CreateSessionRequest, EngineConfig, EngineResult, FrameExtraction,
    GenerationOptions, GenerationResult, GradingService, MechanismHandler, MemoryCache,
    QualityGate, SceneProxyService, SessionService, ShotGenerator, StyleReferenceService,
    StyleSource,
};
use shotflow_engine::providers::{
    CharacterAsset, CharacterAssets, FaceEmbedder, KeyframeSynthesizer, ObjectStorage,
    StoredObject, VideoGenerator,
};
use shotflow_media::{encode_png, FrameGrabber, MediaResult};
use shotflow_models::{
    CameraPose, ContinuityMechanism, ContinuityMode, NewShotRequest, SessionSettings, ShotStatus,
};
use shotflow_store::{MemoryStore, SessionStore};

fn gradient_png() -> Vec<u8> {
    let mut img = RgbImage::new(16, 16);
    for (x, _y, p) in img.enumerate_pixels_mut() {
        let v = (x * 16) as u8;
        *p = Rgb([v, v, v]);
    }
    encode_png(&img).unwrap()
}

/// Serves the same gradient frame for every URL and timestamp; URLs
/// containing `fail_matching` error instead.
#[derive(Default)]
struct FakeGrabber {
    fail_matching: Option<String>,
}

#[async_trait]
impl FrameGrabber for FakeGrabber {
    async fn extract_frame_at(&self, url: &str, _ts: f64) -> MediaResult<Vec<u8>> {
        if let Some(pattern) = &self.fail_matching {
            if url.contains(pattern.as_str()) {
                return Err(shotflow_media::MediaError::image_decode(format!(
                    "unreadable frame source: {url}"
                )));
            }
        }
        Ok(gradient_png())
    }

    async fn duration(&self, _url: &str) -> MediaResult<f64> {
        Ok(8.0)
    }
}

#[derive(Default)]
struct FakeStorage {
    counter: AtomicU32,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn save_from_buffer(
        &self,
        user_id: &str,
        _buffer: &[u8],
        object_type: &str,
        _mime: &str,
        _metadata: &HashMap<String, String>,
    ) -> EngineResult<StoredObject> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(StoredObject {
            view_url: format!("https://cdn/{user_id}/{object_type}-{n}.png"),
        })
    }
}

/// Records every generation call; fails the first `fail_times` calls.
#[derive(Default)]
struct FakeVideo {
    calls: Mutex<Vec<GenerationOptions>>,
    fail_times: AtomicU32,
}

impl FakeVideo {
    fn calls(&self) -> Vec<GenerationOptions> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoGenerator for FakeVideo {
    async fn generate_video(
        &self,
        _prompt: &str,
        options: &GenerationOptions,
    ) -> EngineResult<GenerationResult> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(options.clone());
            calls.len()
        };
        let remaining = self.fail_times.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_times.store(remaining - 1, Ordering::SeqCst);
            return Err(shotflow_engine::EngineError::generation("backend rejected"));
        }
        Ok(GenerationResult {
            asset_id: format!("asset-{n}"),
            video_url: format!("https://cdn/asset-{n}.mp4"),
            seed: Some(7),
        })
    }

    async fn get_video_url(&self, asset_id: &str) -> EngineResult<Option<String>> {
        Ok(Some(format!("https://cdn/{asset_id}.mp4")))
    }
}

struct FakeSynthesizer;

#[async_trait]
impl KeyframeSynthesizer for FakeSynthesizer {
    async fn synthesize_style_keyframe(
        &self,
        _prompt: &str,
        _style_image_url: &str,
        _style_strength: f32,
    ) -> EngineResult<String> {
        Ok("https://cdn/synth-style.png".to_string())
    }

    async fn synthesize_character_keyframe(
        &self,
        _prompt: &str,
        _face_image_url: &str,
        _face_strength: f32,
        _style_image_url: Option<&str>,
    ) -> EngineResult<String> {
        Ok("https://cdn/synth-char.png".to_string())
    }
}

struct FakeAssets;

#[async_trait]
impl CharacterAssets for FakeAssets {
    async fn get_asset_for_generation(
        &self,
        _user_id: &str,
        _asset_id: &str,
    ) -> EngineResult<CharacterAsset> {
        Ok(CharacterAsset {
            primary_image_url: "https://cdn/char.png".to_string(),
            face_embedding: None,
        })
    }
}

/// Pops one scripted similarity per gate evaluation; 0.9 once exhausted.
struct FakeFace {
    scores: Mutex<VecDeque<f32>>,
}

impl FakeFace {
    fn new(scores: Vec<f32>) -> Self {
        Self {
            scores: Mutex::new(scores.into()),
        }
    }
}

#[async_trait]
impl FaceEmbedder for FakeFace {
    async fn extract_embedding(&self, _image_url: &str) -> EngineResult<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }

    fn compute_similarity(&self, _a: &[f32], _b: &[f32]) -> f32 {
        self.scores.lock().unwrap().pop_front().unwrap_or(0.9)
    }
}

struct Harness {
    store: Arc<SessionStore<MemoryStore>>,
    video: Arc<FakeVideo>,
    generator: ShotGenerator<MemoryStore>,
    sessions: SessionService<MemoryStore>,
}

fn harness(face_scores: Vec<f32>) -> Harness {
    harness_with_grabber(face_scores, FakeGrabber::default())
}

fn harness_with_grabber(face_scores: Vec<f32>, grabber: FakeGrabber) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let store = Arc::new(SessionStore::new(MemoryStore::new()));
    let grabber: Arc<dyn FrameGrabber> = Arc::new(grabber);
    let storage: Arc<dyn ObjectStorage> = Arc::new(FakeStorage::default());
    let config = EngineConfig::default();

    let frames = Arc::new(FrameExtraction::new(grabber.clone(), storage.clone(), &config));
    let synthesizer: Arc<dyn KeyframeSynthesizer> = Arc::new(FakeSynthesizer);
    let style_refs = Arc::new(StyleReferenceService::new(
        storage.clone(),
        grabber.clone(),
        Some(synthesizer.clone()),
    ));
    let character = Arc::new(CharacterKeyframeService::new(
        Some(Arc::new(FakeAssets)),
        Some(synthesizer),
    ));
    let scene_proxy = Arc::new(SceneProxyService::new(
        frames.clone(),
        grabber.clone(),
        storage.clone(),
        None,
        &config,
    ));
    let mechanism = Arc::new(MechanismHandler::new(
        style_refs.clone(),
        character.clone(),
        scene_proxy.clone(),
    ));
    let face: Option<Arc<dyn FaceEmbedder>> = if face_scores.is_empty() {
        None
    } else {
        Some(Arc::new(FakeFace::new(face_scores)))
    };
    let quality = Arc::new(QualityGate::new(
        grabber.clone(),
        storage.clone(),
        None,
        face,
        Arc::new(MemoryCache::new()),
    ));
    let grading = Arc::new(GradingService::new(grabber.clone(), storage.clone()));
    let video = Arc::new(FakeVideo::default());

    let generator = ShotGenerator::builder()
        .store(store.clone())
        .video(video.clone())
        .mechanism(mechanism)
        .quality(quality)
        .grading(grading)
        .frames(frames.clone())
        .character(character)
        .build()
        .unwrap();
    let sessions = SessionService::new(
        store.clone(),
        style_refs,
        frames,
        grabber,
        scene_proxy,
        video.clone(),
        config,
    );

    Harness {
        store,
        video,
        generator,
        sessions,
    }
}

async fn create_session(h: &Harness, settings: SessionSettings) -> shotflow_models::Session {
    h.sessions
        .create_session(CreateSessionRequest {
            user_id: "u1".to_string(),
            name: "Test session".to_string(),
            description: None,
            settings: Some(settings),
            style_source: StyleSource::Frame {
                bytes: gradient_png(),
            },
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_native_backend_conditions_without_start_image() {
    let h = harness(vec![]);
    let session = create_session(&h, SessionSettings::default()).await;

    let (_, shot_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "a quiet street at dawn".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Default model is veo-3, which supports native style references, so
    // the default style-match request upgrades to the native mechanism.
    let shot = h
        .generator
        .generate_shot("u1", &session.id, &shot_id)
        .await
        .unwrap();
    assert_eq!(shot.status, ShotStatus::Completed);
    assert_eq!(
        shot.continuity_mechanism_used,
        ContinuityMechanism::NativeStyleRef
    );
    assert!(shot.video_asset_id.is_some());

    let calls = h.video.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].style_reference_url.is_some());
    assert!(calls[0].start_image_url.is_none());

    let stored = h.store.get_required(&session.id).await.unwrap();
    assert_eq!(stored.shot(&shot_id).unwrap().status, ShotStatus::Completed);
}

#[tokio::test]
async fn test_style_match_without_native_support_uses_ip_adapter() {
    let h = harness(vec![]);
    let session = create_session(&h, SessionSettings::default()).await;

    let (_, shot_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "the same street at noon".to_string(),
                model_id: Some("kling-2.1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let shot = h
        .generator
        .generate_shot("u1", &session.id, &shot_id)
        .await
        .unwrap();
    assert_eq!(shot.status, ShotStatus::Completed);
    assert_eq!(shot.continuity_mechanism_used, ContinuityMechanism::IpAdapter);
    assert!(shot.generated_keyframe_url.is_some());
    assert!(shot.style_transfer_applied);

    let calls = h.video.calls();
    // The synthesized keyframe was palette-matched before use.
    assert!(calls[0]
        .start_image_url
        .as_deref()
        .unwrap()
        .contains("graded-keyframe"));
}

#[tokio::test]
async fn test_failed_palette_match_marks_shot_degraded() {
    // The synthesized keyframe cannot be read back, so palette matching
    // fails and the ungraded keyframe is used.
    let h = harness_with_grabber(
        vec![],
        FakeGrabber {
            fail_matching: Some("synth-style".to_string()),
        },
    );
    let session = create_session(&h, SessionSettings::default()).await;

    let (_, shot_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "the street again".to_string(),
                model_id: Some("kling-2.1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let shot = h
        .generator
        .generate_shot("u1", &session.id, &shot_id)
        .await
        .unwrap();
    assert_eq!(shot.status, ShotStatus::Completed);
    assert_eq!(shot.continuity_mechanism_used, ContinuityMechanism::IpAdapter);
    assert!(shot.style_degraded);
    assert_eq!(
        shot.style_degraded_reason.as_deref(),
        Some("style-transfer-unavailable")
    );

    let calls = h.video.calls();
    assert!(calls[0]
        .start_image_url
        .as_deref()
        .unwrap()
        .contains("synth-style"));
    // Post-hoc grading of the generated video still went through.
    assert!(shot
        .graded_frame_url
        .as_deref()
        .unwrap()
        .contains("graded-frame"));
}

#[tokio::test]
async fn test_bridge_chains_from_completed_shot() {
    let h = harness(vec![]);
    let session = create_session(&h, SessionSettings::default()).await;

    let (_, first_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "establishing shot".to_string(),
                model_id: Some("kling-2.1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let (_, second_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "push in".to_string(),
                model_id: Some("kling-2.1".to_string()),
                continuity_mode: Some(ContinuityMode::FrameBridge),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    h.generator
        .generate_shot("u1", &session.id, &first_id)
        .await
        .unwrap();

    // Completing the first shot attached its tail frame to the draft.
    let stored = h.store.get_required(&session.id).await.unwrap();
    let second = stored.shot(&second_id).unwrap();
    let bridge = second.frame_bridge.as_ref().unwrap();
    assert!(bridge.frame_url.contains("bridge-frame"));
    assert_eq!(bridge.source_shot_id.as_ref(), Some(&first_id));

    let shot = h
        .generator
        .generate_shot("u1", &session.id, &second_id)
        .await
        .unwrap();
    assert_eq!(
        shot.continuity_mechanism_used,
        ContinuityMechanism::FrameBridge
    );
    let calls = h.video.calls();
    assert_eq!(
        calls[1].start_image_url.as_deref(),
        Some(bridge.frame_url.as_str())
    );
}

#[tokio::test]
async fn test_frame_bridge_request_degrades_without_bridge() {
    let h = harness(vec![]);
    let session = create_session(&h, SessionSettings::default()).await;

    let (_, shot_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "no previous shot exists".to_string(),
                model_id: Some("kling-2.1".to_string()),
                continuity_mode: Some(ContinuityMode::FrameBridge),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // No bridge and no native support: degrades to style-match instead of
    // erroring.
    let shot = h
        .generator
        .generate_shot("u1", &session.id, &shot_id)
        .await
        .unwrap();
    assert_eq!(shot.status, ShotStatus::Completed);
    assert_eq!(shot.continuity_mechanism_used, ContinuityMechanism::IpAdapter);
}

#[tokio::test]
async fn test_anchorless_backend_fails_shot_without_generating() {
    let h = harness(vec![]);
    let session = create_session(&h, SessionSettings::default()).await;

    let (_, shot_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "doomed".to_string(),
                model_id: Some("hailuo-02".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let shot = h
        .generator
        .generate_shot("u1", &session.id, &shot_id)
        .await
        .unwrap();
    assert_eq!(shot.status, ShotStatus::Failed);
    assert!(shot.error.as_deref().unwrap().contains("hailuo"));
    assert!(h.video.calls().is_empty());

    let stored = h.store.get_required(&session.id).await.unwrap();
    assert_eq!(stored.shot(&shot_id).unwrap().status, ShotStatus::Failed);
}

#[tokio::test]
async fn test_identity_gate_failure_weakens_style_and_retries() {
    // First gate evaluation scores identity 0.3, the retry scores 0.9.
    let h = harness(vec![0.3, 0.9]);
    let session = create_session(
        &h,
        SessionSettings {
            use_character_consistency: true,
            ..Default::default()
        },
    )
    .await;

    let (_, shot_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "the hero turns around".to_string(),
                model_id: Some("kling-2.1".to_string()),
                character_asset_id: Some("char-1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let shot = h
        .generator
        .generate_shot("u1", &session.id, &shot_id)
        .await
        .unwrap();
    assert_eq!(shot.status, ShotStatus::Completed);
    assert_eq!(
        shot.continuity_mechanism_used,
        ContinuityMechanism::PulidKeyframe
    );
    assert_eq!(shot.retry_count, 1);
    assert!(shot.style_degraded);
    assert_eq!(shot.style_degraded_reason.as_deref(), Some("identity-threshold"));
    assert!((shot.style_strength - 0.55).abs() < 1e-6);
    assert!((shot.face_strength.unwrap() - 0.55).abs() < 1e-6);
    assert_eq!(shot.identity_score, Some(0.9));

    let calls = h.video.calls();
    assert_eq!(calls.len(), 2);
    assert!((calls[1].style_strength - 0.55).abs() < 1e-6);
}

#[tokio::test]
async fn test_seed_threads_between_shots_of_the_same_backend() {
    let h = harness(vec![]);
    let session = create_session(&h, SessionSettings::default()).await;

    let (_, first_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "first".to_string(),
                model_id: Some("kling-2.1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let first = h
        .generator
        .generate_shot("u1", &session.id, &first_id)
        .await
        .unwrap();
    assert_eq!(first.seed_info.as_ref().unwrap().seed, 7);

    let (_, second_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "second".to_string(),
                model_id: Some("kling-2.1".to_string()),
                continuity_mode: Some(ContinuityMode::None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let second = h
        .generator
        .generate_shot("u1", &session.id, &second_id)
        .await
        .unwrap();

    assert_eq!(second.continuity_mechanism_used, ContinuityMechanism::SeedOnly);
    assert_eq!(second.inherited_seed, Some(7));
    let calls = h.video.calls();
    assert_eq!(calls[1].seed, Some(7));
    // Seed-only shots skip the quality gate entirely.
    assert!(second.style_score.is_none());
}

#[tokio::test]
async fn test_ready_scene_proxy_overrides_native_mechanism() {
    let h = harness(vec![]);
    let session = create_session(
        &h,
        SessionSettings {
            use_scene_proxy: true,
            ..Default::default()
        },
    )
    .await;

    let proxy = h
        .sessions
        .build_scene_proxy("u1", &session.id, "vid-1", "https://cdn/location.mp4")
        .await
        .unwrap();
    assert!(proxy.is_ready(), "gradient frame has depth variance");

    let (_, shot_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "same room, new angle".to_string(),
                camera: Some(CameraPose {
                    yaw: 0.2,
                    pitch: 0.0,
                    roll: None,
                    dolly: None,
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // veo-3 would pick the native mechanism, but the ready proxy with a
    // camera adjustment wins.
    let shot = h
        .generator
        .generate_shot("u1", &session.id, &shot_id)
        .await
        .unwrap();
    assert_eq!(shot.continuity_mechanism_used, ContinuityMechanism::SceneProxy);
    let calls = h.video.calls();
    assert!(calls[0]
        .start_image_url
        .as_deref()
        .unwrap()
        .contains("proxy-render"));
}

#[tokio::test]
async fn test_generation_error_fails_the_shot_without_retrying() {
    let h = harness(vec![]);
    h.video.fail_times.store(1, Ordering::SeqCst);
    let session = create_session(&h, SessionSettings::default()).await;

    let (_, shot_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "never works".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Only quality-gate misses retry; a thrown backend error is final.
    let shot = h
        .generator
        .generate_shot("u1", &session.id, &shot_id)
        .await
        .unwrap();
    assert_eq!(shot.status, ShotStatus::Failed);
    assert_eq!(shot.retry_count, 0);
    assert_eq!(h.video.calls().len(), 1);
    assert!(shot.error.as_deref().unwrap().contains("generation failed"));
}

#[tokio::test]
async fn test_standard_mode_uses_bridge_but_skips_the_gate() {
    let h = harness(vec![]);
    let session = create_session(&h, SessionSettings::default()).await;

    let (_, first_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "first".to_string(),
                model_id: Some("kling-2.1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    h.generator
        .generate_shot("u1", &session.id, &first_id)
        .await
        .unwrap();

    let (_, second_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "standalone insert".to_string(),
                model_id: Some("kling-2.1".to_string()),
                generation_mode: Some(shotflow_models::GenerationMode::Standard),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let shot = h
        .generator
        .generate_shot("u1", &session.id, &second_id)
        .await
        .unwrap();

    assert_eq!(
        shot.continuity_mechanism_used,
        ContinuityMechanism::FrameBridge
    );
    assert!(h.video.calls()[1].start_image_url.is_some());
    // Standard mode never grades or gates.
    assert!(shot.style_score.is_none());
    assert!(shot.quality_score.is_none());
}

#[tokio::test]
async fn test_concurrent_writer_is_not_overwritten_by_shot_persist() {
    let h = harness(vec![]);
    let session = create_session(&h, SessionSettings::default()).await;

    let (_, shot_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "racing".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // A writer renames the session while generation is in flight.
    h.store
        .update(&session.id, 3, |s| s.name = "Renamed".to_string())
        .await
        .unwrap();

    h.generator
        .generate_shot("u1", &session.id, &shot_id)
        .await
        .unwrap();

    let stored = h.store.get_required(&session.id).await.unwrap();
    assert_eq!(stored.name, "Renamed");
    assert_eq!(stored.shot(&shot_id).unwrap().status, ShotStatus::Completed);
    // create=1, add_shot=2, rename=3, persist=4.
    assert_eq!(stored.version, 4);
    assert!(stored.sequence_is_valid());
}

#[tokio::test]
async fn test_racing_generations_for_distinct_shots_both_land() {
    let h = harness(vec![]);
    let session = create_session(&h, SessionSettings::default()).await;

    let (_, first_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "left half".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let (_, second_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "right half".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Both persist paths race on the same session document; each must
    // refetch on conflict rather than overwrite the other's shot.
    let (first, second) = tokio::join!(
        h.generator.generate_shot("u1", &session.id, &first_id),
        h.generator.generate_shot("u1", &session.id, &second_id),
    );
    first.unwrap();
    second.unwrap();

    let stored = h.store.get_required(&session.id).await.unwrap();
    let first = stored.shot(&first_id).unwrap();
    let second = stored.shot(&second_id).unwrap();
    assert_eq!(first.status, ShotStatus::Completed);
    assert_eq!(second.status, ShotStatus::Completed);
    assert_ne!(first.video_asset_id, second.video_asset_id);
    assert!(stored.sequence_is_valid());
}

#[tokio::test]
async fn test_updated_settings_apply_to_later_shots() {
    let h = harness(vec![]);
    let session = create_session(&h, SessionSettings::default()).await;

    let updated = h
        .sessions
        .update_settings(
            "u1",
            &session.id,
            SessionSettings {
                default_model: "kling-2.1".to_string(),
                default_style_strength: 1.7,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    // Out-of-range strengths are clamped on write.
    assert!((updated.default_settings.default_style_strength - 1.0).abs() < 1e-6);
    assert_eq!(updated.version, session.version + 1);

    let (stored, shot_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "uses new defaults".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let shot = stored.shot(&shot_id).unwrap();
    assert_eq!(shot.model_id, "kling-2.1");
    assert!((shot.style_strength - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_shot_updates_are_rejected_after_generation() {
    let h = harness(vec![]);
    let session = create_session(&h, SessionSettings::default()).await;

    let (_, shot_id) = h
        .sessions
        .add_shot(
            "u1",
            &session.id,
            NewShotRequest {
                user_prompt: "lock me".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    h.generator
        .generate_shot("u1", &session.id, &shot_id)
        .await
        .unwrap();

    let err = h
        .sessions
        .update_shot(
            "u1",
            &session.id,
            &shot_id,
            shotflow_engine::UpdateShotRequest {
                user_prompt: Some("too late".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no longer be edited"));
}
