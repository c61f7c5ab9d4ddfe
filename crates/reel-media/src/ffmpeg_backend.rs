//! [`MediaBackend`] backed by the ffmpeg and ffprobe binaries.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegInput, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::build_render_graph;
use crate::plan::{AudioBinding, RenderPlan};
use crate::progress::ProgressSteps;
use crate::probe::{probe_audio, probe_video};
use crate::source::{AudioSource, Frame, MediaBackend, SourceInfo, VideoSource};

/// Raster size frames are decoded at for motion analysis.
pub const ANALYSIS_WIDTH: u32 = 160;
pub const ANALYSIS_HEIGHT: u32 = 90;

#[derive(Debug, Default, Clone)]
pub struct FfmpegBackend {
    runner: FfmpegRunner,
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the single encode command for `plan`.
    pub fn render_command(plan: &RenderPlan, caption_files: &[PathBuf], output: &Path) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(output);
        for segment in &plan.segments {
            cmd = cmd.input(
                FfmpegInput::file(&segment.source)
                    .seek(segment.start)
                    .duration(segment.duration),
            );
        }
        if let AudioBinding::Music(bed) = &plan.audio {
            cmd = cmd.input(FfmpegInput::file(&bed.path).stream_loop(bed.plays.saturating_sub(1)));
        }

        let files: Vec<&Path> = caption_files.iter().map(PathBuf::as_path).collect();
        let graph = build_render_graph(plan, &files);

        cmd.filter_complex(graph.filter)
            .map(format!("[{}]", graph.video_label))
            .map(format!("[{}]", graph.audio_label))
            .output_duration(plan.duration())
            .output_args(plan.encoding.output_args())
    }
}

#[async_trait]
impl MediaBackend for FfmpegBackend {
    async fn open_video(&self, path: &Path) -> MediaResult<Box<dyn VideoSource>> {
        let probed = probe_video(path).await?;
        debug!(
            path = %path.display(),
            "Opened {}x{} {} video, {:.2}s at {:.2}fps",
            probed.width, probed.height, probed.codec, probed.duration, probed.fps
        );
        Ok(Box::new(FfmpegVideo {
            info: SourceInfo {
                path: path.to_path_buf(),
                duration: probed.duration,
                width: probed.width,
                height: probed.height,
                has_audio: probed.has_audio,
            },
            runner: self.runner.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn open_audio(&self, path: &Path) -> MediaResult<Box<dyn AudioSource>> {
        let probed = probe_audio(path).await?;
        debug!(path = %path.display(), "Opened {} audio, {:.2}s", probed.codec, probed.duration);
        Ok(Box::new(FfmpegAudio {
            path: path.to_path_buf(),
            duration: probed.duration,
        }))
    }

    async fn render(&self, plan: &RenderPlan, output: &Path) -> MediaResult<()> {
        if plan.segments.is_empty() {
            return Err(MediaError::NoClips);
        }

        // drawtext reads captions from files so their text is never parsed as filter syntax
        let scratch = tempfile::TempDir::new()?;
        let mut caption_files = Vec::with_capacity(plan.captions.len());
        for (i, caption) in plan.captions.iter().enumerate() {
            let file = scratch.path().join(format!("caption_{}.txt", i));
            tokio::fs::write(&file, caption.text.as_bytes()).await?;
            caption_files.push(file);
        }

        let cmd = Self::render_command(plan, &caption_files, output);
        let timeline = plan.duration();
        info!(
            output = %output.display(),
            "Writing {} segments ({:.2}s) with {} captions",
            plan.segments.len(),
            plan.duration(),
            plan.captions.len()
        );

        let mut steps = ProgressSteps::new(10.0);
        self.runner
            .run_with_progress(&cmd, move |progress| {
                if let Some(percent) = steps.reached(progress.percent_of(timeline)) {
                    debug!(speed = progress.speed, "Encoded {:.0}% of the reel", percent);
                }
            })
            .await
    }
}

/// A probed video; frames are decoded on demand.
struct FfmpegVideo {
    info: SourceInfo,
    runner: FfmpegRunner,
    closed: AtomicBool,
}

#[async_trait]
impl VideoSource for FfmpegVideo {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    async fn frame_at(&self, t: f64) -> MediaResult<Frame> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MediaError::HandleClosed(self.info.path.display().to_string()));
        }

        let cmd = FfmpegCommand::to_stdout()
            .input(FfmpegInput::file(&self.info.path).seek(t.max(0.0)))
            .video_filter(format!("scale={}:{}", ANALYSIS_WIDTH, ANALYSIS_HEIGHT))
            .single_frame()
            .output_args(["-an", "-pix_fmt", "rgb24", "-f", "rawvideo"]);

        let data = self.runner.run_capture(&cmd).await?;
        if data.is_empty() {
            return Err(MediaError::frame_decode(format!(
                "no frame at {:.2}s in {}",
                t,
                self.info.path.display()
            )));
        }
        Frame::new(ANALYSIS_WIDTH, ANALYSIS_HEIGHT, data)
    }

    fn close(&mut self) -> MediaResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

struct FfmpegAudio {
    path: PathBuf,
    duration: f64,
}

impl AudioSource for FfmpegAudio {
    fn path(&self) -> &Path {
        &self.path
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn close(&mut self) -> MediaResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ClipSegment, FeatureReport, Geometry, MusicBed};
    use reel_models::EncodingConfig;

    fn plan(audio: AudioBinding) -> RenderPlan {
        let segment = |name: &str, start: f64| ClipSegment {
            source: PathBuf::from(name),
            start,
            duration: 5.0,
            geometry: Geometry {
                scaled_width: 404,
                scaled_height: 720,
                crop_width: None,
            },
            keep_audio: true,
        };
        RenderPlan {
            segments: vec![segment("a.mp4", 0.0), segment("b.mp4", 2.5)],
            canvas: (404, 720),
            captions: Vec::new(),
            audio,
            encoding: EncodingConfig::default(),
            features: FeatureReport::default(),
        }
    }

    #[test]
    fn test_render_command_inputs_and_maps() {
        let args = FfmpegBackend::render_command(&plan(AudioBinding::Native), &[], Path::new("out.partial.mp4"))
            .build_args();
        let joined = args.join(" ");

        assert!(joined.contains("-ss 0.000 -t 5.000 -i a.mp4"));
        assert!(joined.contains("-ss 2.500 -t 5.000 -i b.mp4"));
        assert!(joined.contains("-map [vout] -map [acat]"));
        assert!(joined.contains("-t 10.000"));
        assert!(joined.contains("-c:v libx264"));
        assert_eq!(args.last().map(String::as_str), Some("out.partial.mp4"));
    }

    #[test]
    fn test_render_command_loops_music() {
        let bed = MusicBed {
            path: PathBuf::from("song.mp3"),
            plays: 4,
            duration: 10.0,
            fade: Some(2.0),
            volume: Some(0.3),
        };
        let args = FfmpegBackend::render_command(&plan(AudioBinding::Music(bed)), &[], Path::new("out.mp4"))
            .build_args()
            .join(" ");

        assert!(args.contains("-stream_loop 3 -i song.mp3"));
        assert!(args.contains("-map [aout]"));
    }
}
