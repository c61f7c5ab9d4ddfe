//! End-to-end reel assembly: transform, concatenate, caption, mix, encode.

use rand::rngs::StdRng;
use rand::SeedableRng;
use reel_models::{Caption, EncodingConfig, TextStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audio::{AudioMixer, MixOptions, DEFAULT_MUSIC_VOLUME};
use crate::compositor::{concatenate, Compositor};
use crate::encoder::Encoder;
use crate::error::MediaResult;
use crate::fonts::FontResolverChain;
use crate::plan::{FeatureReport, RenderPlan};
use crate::scope::ResourceScope;
use crate::source::MediaBackend;
use crate::transform::{SkippedClip, SourceInput, TransformOptions, TransformStage, DEFAULT_OUTPUT_HEIGHT};

/// Everything needed to render one reel.
#[derive(Debug, Clone)]
pub struct ReelJob {
    /// Sources in timeline order
    pub sources: Vec<SourceInput>,
    pub captions: Vec<Caption>,
    pub style: TextStyle,
    pub mute: bool,
    pub music: Option<PathBuf>,
    pub music_fade: f64,
    pub auto_moments: bool,
    /// Final artifact path
    pub output: PathBuf,
}

/// What a successful render produced.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub path: PathBuf,
    pub duration: f64,
    pub segment_count: usize,
    pub features: FeatureReport,
    pub skipped: Vec<SkippedClip>,
}

/// Process-wide render settings.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub output_height: u32,
    pub music_volume: f64,
    pub encoding: EncodingConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            output_height: DEFAULT_OUTPUT_HEIGHT,
            music_volume: DEFAULT_MUSIC_VOLUME,
            encoding: EncodingConfig::default(),
        }
    }
}

pub struct ReelPipeline {
    backend: Arc<dyn MediaBackend>,
    compositor: Compositor,
    settings: PipelineSettings,
}

impl ReelPipeline {
    pub fn new(backend: Arc<dyn MediaBackend>, fonts: FontResolverChain, settings: PipelineSettings) -> Self {
        Self {
            backend,
            compositor: Compositor::new(fonts),
            settings,
        }
    }

    /// Render `job`. Every media handle opened along the way is closed before
    /// this returns, whatever the outcome.
    pub async fn run(&self, job: &ReelJob) -> MediaResult<RenderOutcome> {
        let mut scope = ResourceScope::new();
        let result = self.assemble(job, &mut scope).await;
        let closed = scope.close_all();
        debug!("Released {} media handles", closed);
        result
    }

    async fn assemble(&self, job: &ReelJob, scope: &mut ResourceScope) -> MediaResult<RenderOutcome> {
        let backend = self.backend.as_ref();
        let mut rng = StdRng::from_os_rng();

        let transform = TransformStage::new(
            backend,
            TransformOptions {
                output_height: self.settings.output_height,
                mute: job.mute,
                auto_moments: job.auto_moments,
            },
        );
        let transformed = transform.run(&job.sources, scope, &mut rng).await?;
        let timeline = concatenate(transformed.segments)?;
        let duration = timeline.duration();

        let captions = self.compositor.caption_layer(&timeline, &job.captions, &job.style);

        let mixer = AudioMixer::new(
            backend,
            MixOptions {
                fade: job.music_fade,
                volume: self.settings.music_volume,
            },
        );
        let mix = mixer.mix(job.music.as_deref(), duration, scope).await;

        let features = FeatureReport {
            captions: captions.outcome,
            music: mix.music,
            fade: mix.fade,
            volume: mix.volume,
        };
        let plan = RenderPlan {
            segments: timeline.segments,
            canvas: timeline.canvas,
            captions: captions.overlays,
            audio: mix.binding,
            encoding: self.settings.encoding.clone(),
            features: features.clone(),
        };

        Encoder::new(backend).write(&plan, &job.output).await?;
        info!(
            output = %job.output.display(),
            "Reel rendered: {} segments, {:.2}s",
            plan.segments.len(),
            duration
        );

        Ok(RenderOutcome {
            path: job.output.clone(),
            duration,
            segment_count: plan.segments.len(),
            features,
            skipped: transformed.skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use crate::fs_utils::partial_path;
    use crate::plan::{AudioBinding, FeatureOutcome};
    use crate::testing::{FakeBackend, FakeVideo};
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        backend: Arc<FakeBackend>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                backend: Arc::new(FakeBackend::new()),
            }
        }

        fn video(&self, name: &str, video: Option<FakeVideo>) -> SourceInput {
            let path = self.dir.path().join(name);
            std::fs::write(&path, b"video").unwrap();
            if let Some(video) = video {
                self.backend.register_video(name, video);
            }
            SourceInput::new(path)
        }

        fn music(&self, name: &str, duration: f64) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, b"music").unwrap();
            self.backend.register_audio(name, duration);
            path
        }

        fn job(&self, sources: Vec<SourceInput>) -> ReelJob {
            ReelJob {
                sources,
                captions: Vec::new(),
                style: TextStyle::default(),
                mute: false,
                music: None,
                music_fade: 2.0,
                auto_moments: false,
                output: self.dir.path().join("session.mp4"),
            }
        }

        fn pipeline(&self) -> ReelPipeline {
            ReelPipeline::new(self.backend.clone(), FontResolverChain::new(), PipelineSettings::default())
        }
    }

    #[tokio::test]
    async fn test_three_clips_render_in_order() {
        let fx = Fixture::new();
        let sources = vec![
            fx.video("a.mp4", Some(FakeVideo::new(5.0))),
            fx.video("b.mp4", Some(FakeVideo::new(5.0).with_size(1080, 1920))),
            fx.video("c.mp4", Some(FakeVideo::new(5.0))),
        ];
        let job = fx.job(sources);

        let outcome = fx.pipeline().run(&job).await.unwrap();

        assert!((outcome.duration - 15.0).abs() < 1e-6);
        assert_eq!(outcome.segment_count, 3);
        assert!(job.output.exists());
        assert!(!partial_path(&job.output).exists());

        let plan = &fx.backend.rendered_plans()[0];
        let names: Vec<&str> = plan
            .segments
            .iter()
            .map(|s| s.source.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.mp4", "b.mp4", "c.mp4"]);
        assert_eq!(plan.canvas, (404, 720));
        assert_eq!(plan.audio, AudioBinding::Native);
        assert_eq!(fx.backend.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_bad_clips_are_skipped() {
        let fx = Fixture::new();
        let sources = vec![
            fx.video("corrupt.mp4", None),
            SourceInput::new(fx.dir.path().join("missing.mp4")),
            fx.video("good.mp4", Some(FakeVideo::new(6.0))),
        ];
        let job = fx.job(sources);

        let outcome = fx.pipeline().run(&job).await.unwrap();

        assert!((outcome.duration - 6.0).abs() < 1e-6);
        assert_eq!(outcome.skipped.len(), 2);
        assert_eq!(fx.backend.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_trim_is_applied_and_too_short_trim_skips() {
        let fx = Fixture::new();
        let sources = vec![
            fx.video("a.mp4", Some(FakeVideo::new(10.0))).with_trim(Some(2.0), Some(6.0)),
            fx.video("b.mp4", Some(FakeVideo::new(10.0))).with_trim(Some(12.0), None),
        ];
        let job = fx.job(sources);

        let outcome = fx.pipeline().run(&job).await.unwrap();

        assert!((outcome.duration - 4.0).abs() < 1e-6);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(fx.backend.close_count("b.mp4"), 1);
    }

    #[tokio::test]
    async fn test_untrimmed_clip_under_half_second_is_skipped() {
        let fx = Fixture::new();
        let sources = vec![
            fx.video("blink.mp4", Some(FakeVideo::new(0.3))),
            fx.video("good.mp4", Some(FakeVideo::new(4.0))),
        ];
        let job = fx.job(sources);

        let outcome = fx.pipeline().run(&job).await.unwrap();

        assert_eq!(outcome.segment_count, 1);
        assert!((outcome.duration - 4.0).abs() < 1e-6);
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].path.ends_with("blink.mp4"));
        assert_eq!(fx.backend.close_count("blink.mp4"), 1);
        assert_eq!(fx.backend.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_auto_moments_do_not_keep_sub_minimum_clip() {
        let fx = Fixture::new();
        let mut job = fx.job(vec![
            fx.video("blink.mp4", Some(FakeVideo::new(0.3))),
            fx.video("good.mp4", Some(FakeVideo::new(1.5))),
        ]);
        job.auto_moments = true;

        let outcome = fx.pipeline().run(&job).await.unwrap();

        let plan = &fx.backend.rendered_plans()[0];
        assert!(plan.segments.iter().all(|s| s.source.ends_with("good.mp4")));
        assert!(plan.segments.iter().all(|s| s.duration >= 0.5));
        assert_eq!(outcome.skipped.len(), 1);
    }

    #[tokio::test]
    async fn test_only_too_short_clips_fails() {
        let fx = Fixture::new();
        let job = fx.job(vec![
            fx.video("a.mp4", Some(FakeVideo::new(0.2))),
            fx.video("b.mp4", Some(FakeVideo::new(0.49))),
        ]);

        let err = fx.pipeline().run(&job).await.unwrap_err();

        assert!(matches!(err, MediaError::NoClips));
        assert!(!job.output.exists());
        assert_eq!(fx.backend.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_no_usable_clips_fails_without_artifact() {
        let fx = Fixture::new();
        let job = fx.job(vec![fx.video("corrupt.mp4", None)]);

        let err = fx.pipeline().run(&job).await.unwrap_err();

        assert!(matches!(err, MediaError::NoClips));
        assert!(!job.output.exists());
        assert!(fx.backend.rendered_plans().is_empty());
    }

    #[tokio::test]
    async fn test_music_loops_to_cover_timeline() {
        let fx = Fixture::new();
        let mut job = fx.job(vec![fx.video("a.mp4", Some(FakeVideo::new(10.0)))]);
        job.music = Some(fx.music("song.mp3", 3.0));

        let outcome = fx.pipeline().run(&job).await.unwrap();

        assert!(outcome.features.music.is_applied());
        assert!(outcome.features.fade.is_applied());
        let plan = &fx.backend.rendered_plans()[0];
        match &plan.audio {
            AudioBinding::Music(bed) => {
                assert_eq!(bed.plays, 4);
                assert_eq!(bed.duration, 10.0);
                assert_eq!(bed.fade, Some(2.0));
                assert_eq!(bed.volume, Some(0.3));
            }
            other => panic!("expected music, got {:?}", other),
        }
        assert_eq!(fx.backend.close_count("song.mp3"), 1);
        assert_eq!(fx.backend.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_bad_fade_keeps_music() {
        let fx = Fixture::new();
        let mut job = fx.job(vec![fx.video("a.mp4", Some(FakeVideo::new(3.0)))]);
        job.music = Some(fx.music("song.mp3", 30.0));
        job.music_fade = 5.0;

        let outcome = fx.pipeline().run(&job).await.unwrap();

        assert!(outcome.features.music.is_applied());
        assert!(outcome.features.fade.is_skipped());
    }

    #[tokio::test]
    async fn test_unreadable_music_keeps_clip_audio() {
        let fx = Fixture::new();
        let mut job = fx.job(vec![fx.video("a.mp4", Some(FakeVideo::new(3.0)))]);
        let bogus = fx.dir.path().join("bogus.mp3");
        std::fs::write(&bogus, b"noise").unwrap();
        job.music = Some(bogus);

        let outcome = fx.pipeline().run(&job).await.unwrap();

        assert!(outcome.features.music.is_skipped());
        assert_eq!(fx.backend.rendered_plans()[0].audio, AudioBinding::Native);
    }

    #[tokio::test]
    async fn test_bad_caption_color_drops_captions_only() {
        let fx = Fixture::new();
        let mut job = fx.job(vec![fx.video("a.mp4", Some(FakeVideo::new(5.0)))]);
        let mut bad = Caption::new("Hi", 0.0, 2.0);
        bad.color = Some("not-a-color".to_string());
        job.captions = vec![Caption::new("Hello", 0.0, 3.0), bad];

        let outcome = fx.pipeline().run(&job).await.unwrap();

        assert!(outcome.features.captions.is_skipped());
        assert!(fx.backend.rendered_plans()[0].captions.is_empty());
        assert!(job.output.exists());
    }

    #[tokio::test]
    async fn test_captions_clamped_to_timeline() {
        let fx = Fixture::new();
        let mut job = fx.job(vec![fx.video("a.mp4", Some(FakeVideo::new(5.0)))]);
        job.captions = vec![Caption::new("Late", 4.5, 9.0)];

        let outcome = fx.pipeline().run(&job).await.unwrap();

        assert_eq!(outcome.features.captions, FeatureOutcome::Applied);
        let overlay = &fx.backend.rendered_plans()[0].captions[0];
        assert!((overlay.window.start - 4.5).abs() < 1e-9);
        assert!((overlay.window.end - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_mute_drops_native_audio() {
        let fx = Fixture::new();
        let mut job = fx.job(vec![fx.video("a.mp4", Some(FakeVideo::new(5.0)))]);
        job.mute = true;

        fx.pipeline().run(&job).await.unwrap();

        assert!(!fx.backend.rendered_plans()[0].segments[0].keep_audio);
    }

    #[tokio::test]
    async fn test_auto_moments_split_untrimmed_clips() {
        let fx = Fixture::new();
        let mut job = fx.job(vec![fx.video("a.mp4", Some(FakeVideo::new(20.0)))]);
        job.auto_moments = true;

        let outcome = fx.pipeline().run(&job).await.unwrap();

        assert_eq!(outcome.segment_count, 2);
        assert!(outcome.duration <= 8.0 + 1e-6);
    }

    #[tokio::test]
    async fn test_encode_failure_leaves_no_files() {
        let fx = Fixture::new();
        fx.backend.fail_renders(true);
        let job = fx.job(vec![fx.video("a.mp4", Some(FakeVideo::new(5.0)))]);

        let err = fx.pipeline().run(&job).await.unwrap_err();

        assert!(matches!(err, MediaError::EncodeFailed(_)));
        assert!(!job.output.exists());
        assert!(!partial_path(Path::new(&job.output)).exists());
        assert_eq!(fx.backend.open_handles(), 0);
    }
}
