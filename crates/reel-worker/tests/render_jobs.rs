//! End-to-end render job tests over the in-memory media backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use reel_media::plan::{AudioBinding, RenderPlan};
use reel_media::testing::{FakeBackend, FakeVideo};
use reel_media::{AudioSource, MediaBackend, MediaResult, VideoSource};
use reel_models::{Caption, ClipSettings, JobPoll, MusicSource, RenderRequest};
use reel_storage::LocalStorage;
use reel_worker::{InlineExecutor, ReelConfig, ReelService, TaskExecutor, TokioExecutor, WorkerError};
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    config: ReelConfig,
    backend: Arc<FakeBackend>,
    service: ReelService,
}

impl Harness {
    fn new() -> Self {
        Self::with_executor(Arc::new(InlineExecutor))
    }

    fn with_executor(executor: Arc<dyn TaskExecutor>) -> Self {
        let dir = TempDir::new().unwrap();
        let config = ReelConfig::under(dir.path());
        config.ensure_dirs().unwrap();
        let backend = Arc::new(FakeBackend::new());
        let service = ReelService::new(config.clone(), backend.clone(), Arc::new(LocalStorage::new()), executor);
        Self {
            _dir: dir,
            config,
            backend,
            service,
        }
    }

    /// Create an upload on disk, registered with the backend unless `video` is None.
    fn upload(&self, session: &str, name: &str, video: Option<FakeVideo>) -> PathBuf {
        let dir = self.config.session_upload_dir(session);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, b"video").unwrap();
        if let Some(video) = video {
            self.backend.register_video(name, video);
        }
        path
    }

    fn artifact(&self, session: &str) -> PathBuf {
        self.config.artifact_path(&format!("{}.mp4", session))
    }

    fn last_plan(&self) -> RenderPlan {
        self.backend.rendered_plans().pop().unwrap()
    }
}

fn request(session: &str) -> RenderRequest {
    RenderRequest {
        session_id: session.to_string(),
        ..Default::default()
    }
}

fn setting(order: i64, filename: &str, trim_start: Option<f64>, trim_end: Option<f64>) -> ClipSettings {
    ClipSettings {
        order,
        trim_start,
        trim_end,
        filename: filename.to_string(),
    }
}

#[tokio::test]
async fn test_three_clips_complete_and_result_is_consumed() {
    let h = Harness::new();
    for name in ["a.mp4", "b.mp4", "c.mp4"] {
        h.upload("s1", name, Some(FakeVideo::new(5.0)));
    }

    let session = h.service.submit(request("s1")).await.unwrap();
    assert_eq!(session.as_str(), "s1");

    assert_eq!(
        h.service.poll("s1").await,
        JobPoll::Completed {
            download_url: "/download/s1".to_string()
        }
    );
    assert!(h.artifact("s1").exists());
    assert!((h.last_plan().duration() - 15.0).abs() < 1e-6);
    assert!(h.service.registry().is_empty());

    // Record consumed, the artifact on disk still answers
    assert_eq!(
        h.service.poll("s1").await,
        JobPoll::Completed {
            download_url: "/download/s1".to_string()
        }
    );

    std::fs::remove_file(h.artifact("s1")).unwrap();
    assert_eq!(h.service.poll("s1").await, JobPoll::NotFound);
}

#[tokio::test]
async fn test_corrupt_clip_is_skipped() {
    let h = Harness::new();
    h.upload("s2", "broken.mp4", None);
    h.upload("s2", "good.mp4", Some(FakeVideo::new(8.0)));
    let mut req = request("s2");
    req.video_settings = vec![
        setting(0, "broken.mp4", None, None),
        setting(1, "good.mp4", Some(1.0), Some(4.0)),
    ];

    h.service.submit(req).await.unwrap();

    assert!(h.service.poll("s2").await.is_terminal());
    let plan = h.last_plan();
    assert_eq!(plan.segments.len(), 1);
    assert!((plan.duration() - 3.0).abs() < 1e-6);
    assert!(plan.segments[0].source.ends_with("good.mp4"));
    assert_eq!(h.backend.open_handles(), 0);
}

#[tokio::test]
async fn test_clip_shorter_than_half_second_is_left_out() {
    let h = Harness::new();
    h.upload("short", "a.mp4", Some(FakeVideo::new(0.3)));
    h.upload("short", "b.mp4", Some(FakeVideo::new(5.0)));

    h.service.submit(request("short")).await.unwrap();

    assert!(matches!(h.service.poll("short").await, JobPoll::Completed { .. }));
    let plan = h.last_plan();
    assert_eq!(plan.segments.len(), 1);
    assert!(plan.segments[0].source.ends_with("b.mp4"));
    assert!((plan.duration() - 5.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_all_clips_too_short_fails() {
    let h = Harness::new();
    h.upload("tiny", "a.mp4", Some(FakeVideo::new(0.3)));
    h.upload("tiny", "b.mp4", Some(FakeVideo::new(0.4)));

    h.service.submit(request("tiny")).await.unwrap();

    match h.service.poll("tiny").await {
        JobPoll::Failed { error } => assert!(error.contains("No clips could be extracted"), "{}", error),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(!h.artifact("tiny").exists());
}

#[tokio::test]
async fn test_no_usable_clips_fails() {
    let h = Harness::new();
    h.upload("s3", "broken.mp4", None);

    h.service.submit(request("s3")).await.unwrap();

    match h.service.poll("s3").await {
        JobPoll::Failed { error } => assert!(error.contains("No clips could be extracted"), "{}", error),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(!h.artifact("s3").exists());
    assert_eq!(h.service.poll("s3").await, JobPoll::NotFound);
}

#[tokio::test]
async fn test_encode_failure_reports_failed_without_artifact() {
    let h = Harness::new();
    h.upload("s4", "a.mp4", Some(FakeVideo::new(5.0)));
    h.backend.fail_renders(true);

    h.service.submit(request("s4")).await.unwrap();

    assert!(matches!(h.service.poll("s4").await, JobPoll::Failed { .. }));
    assert!(!h.artifact("s4").exists());
    assert_eq!(std::fs::read_dir(&h.config.output_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_music_is_looped_over_timeline() {
    let h = Harness::new();
    h.upload("s5", "a.mp4", Some(FakeVideo::new(10.0)));
    std::fs::write(h.config.music_dir.join("song.mp3"), b"music").unwrap();
    h.backend.register_audio("song.mp3", 3.0);

    let mut req = request("s5");
    req.music_source = MusicSource::Local;
    req.music_path = Some("song.mp3".to_string());
    h.service.submit(req).await.unwrap();

    assert!(h.service.poll("s5").await.is_terminal());
    match h.last_plan().audio {
        AudioBinding::Music(bed) => {
            assert_eq!(bed.plays, 4);
            assert!((bed.duration - 10.0).abs() < 1e-9);
            assert_eq!(bed.volume, Some(0.3));
        }
        other => panic!("expected music, got {:?}", other),
    }
}

#[tokio::test]
async fn test_captions_are_kept_in_timeline() {
    let h = Harness::new();
    h.upload("s6", "a.mp4", Some(FakeVideo::new(4.0)));
    let mut req = request("s6");
    req.captions = vec![Caption::new("Good boy", 1.0, 30.0), Caption::new("   ", 0.0, 1.0)];

    h.service.submit(req).await.unwrap();

    h.service.poll("s6").await;
    let plan = h.last_plan();
    assert_eq!(plan.captions.len(), 1);
    assert!(plan.captions[0].window.end <= 4.0 + 1e-9);
    assert!(plan.features.captions.is_applied());
}

#[tokio::test]
async fn test_submission_validation() {
    let h = Harness::new();

    let err = h.service.submit(request("  ")).await.unwrap_err();
    assert!(matches!(err, WorkerError::InvalidInput(_)));

    let err = h.service.submit(request("../escape")).await.unwrap_err();
    assert!(err.is_input_error());

    let err = h.service.submit(request("missing")).await.unwrap_err();
    assert!(matches!(err, WorkerError::NotFound(_)));

    let notes = h.config.session_upload_dir("notes");
    std::fs::create_dir_all(&notes).unwrap();
    std::fs::write(notes.join("readme.txt"), b"hi").unwrap();
    let err = h.service.submit(request("notes")).await.unwrap_err();
    assert!(matches!(err, WorkerError::InvalidInput(_)));

    h.upload("nomusic", "a.mp4", Some(FakeVideo::new(5.0)));
    let mut req = request("nomusic");
    req.music_source = MusicSource::Local;
    req.music_path = Some("absent.mp3".to_string());
    let err = h.service.submit(req).await.unwrap_err();
    assert!(matches!(err, WorkerError::NotFound(_)));

    assert!(h.service.registry().is_empty());
    assert!(h.backend.rendered_plans().is_empty());
}

#[tokio::test]
async fn test_download_uses_fixed_name() {
    let h = Harness::new();
    h.upload("s7", "a.mp4", Some(FakeVideo::new(5.0)));
    h.service.submit(request("s7")).await.unwrap();

    let download = h.service.download("s7").await.unwrap();
    assert_eq!(download.file_name, "pet_reel.mp4");
    assert_eq!(download.bytes, std::fs::read(h.artifact("s7")).unwrap());

    let err = h.service.download("nobody").await.unwrap_err();
    assert!(matches!(err, WorkerError::NotFound(_)));
}

#[tokio::test]
async fn test_spawned_job_is_polled_to_completion() {
    let h = Harness::with_executor(Arc::new(TokioExecutor));
    h.upload("s8", "a.mp4", Some(FakeVideo::new(5.0)));

    h.service.submit(request("s8")).await.unwrap();

    let mut result = JobPoll::Processing;
    for _ in 0..200 {
        result = h.service.poll("s8").await;
        if result != JobPoll::Processing {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(
        result,
        JobPoll::Completed {
            download_url: "/download/s8".to_string()
        }
    );
}

/// Backend whose every clip blows up while opening.
struct PanickingBackend;

#[async_trait]
impl MediaBackend for PanickingBackend {
    async fn open_video(&self, _path: &Path) -> MediaResult<Box<dyn VideoSource>> {
        panic!("decoder crashed");
    }

    async fn open_audio(&self, _path: &Path) -> MediaResult<Box<dyn AudioSource>> {
        panic!("decoder crashed");
    }

    async fn render(&self, _plan: &RenderPlan, _output: &Path) -> MediaResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_panicking_job_is_recorded_as_failed() {
    let dir = TempDir::new().unwrap();
    let config = ReelConfig::under(dir.path());
    config.ensure_dirs().unwrap();
    let upload = config.session_upload_dir("s9");
    std::fs::create_dir_all(&upload).unwrap();
    std::fs::write(upload.join("a.mp4"), b"video").unwrap();

    let service = ReelService::new(
        config,
        Arc::new(PanickingBackend),
        Arc::new(LocalStorage::new()),
        Arc::new(InlineExecutor),
    );
    service.submit(request("s9")).await.unwrap();

    assert!(matches!(service.poll("s9").await, JobPoll::Failed { .. }));
}

/// Accepts jobs and never runs them, leaving them processing.
struct ParkedExecutor;

#[async_trait]
impl TaskExecutor for ParkedExecutor {
    async fn execute(&self, _task: BoxFuture<'static, ()>) {}
}

#[tokio::test]
async fn test_resubmission_while_rendering_is_busy() {
    let h = Harness::with_executor(Arc::new(ParkedExecutor));
    h.upload("s10", "a.mp4", Some(FakeVideo::new(5.0)));

    h.service.submit(request("s10")).await.unwrap();
    assert_eq!(h.service.poll("s10").await, JobPoll::Processing);

    let err = h.service.submit(request("s10")).await.unwrap_err();
    assert!(matches!(err, WorkerError::Busy(_)));
    assert!(err.is_input_error());
    assert_eq!(h.service.registry().active_count(), 1);
}
