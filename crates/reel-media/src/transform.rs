//! Per-clip trim, resize, crop and mute.
//!
//! Clips that cannot be used are skipped with a log line; the stage only fails
//! when nothing survives.

use rand::Rng;
use reel_models::{TrimWindow, MIN_TRIM_SPAN};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::motion::MotionAnalyzer;
use crate::plan::{ClipSegment, Geometry};
use crate::scope::{ResourceScope, VideoHandle};
use crate::source::{MediaBackend, SourceInfo};

/// Output height every clip is scaled to.
pub const DEFAULT_OUTPUT_HEIGHT: u32 = 720;
/// Target aspect ratio (width:height).
const ASPECT_NUM: u32 = 9;
const ASPECT_DEN: u32 = 16;

const CLIPS_SKIPPED_METRIC: &str = "reel_clips_skipped_total";

/// Requested trim for one input (either end may be missing).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipTrim {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

/// One source video in final timeline order.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInput {
    pub path: PathBuf,
    /// Trim from matching clip settings
    pub trim: Option<ClipTrim>,
}

impl SourceInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            trim: None,
        }
    }

    pub fn with_trim(mut self, start: Option<f64>, end: Option<f64>) -> Self {
        self.trim = Some(ClipTrim { start, end });
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransformOptions {
    pub output_height: u32,
    pub mute: bool,
    /// Use analyzer moments for clips without a trim
    pub auto_moments: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            output_height: DEFAULT_OUTPUT_HEIGHT,
            mute: false,
            auto_moments: false,
        }
    }
}

/// A clip that did not make it into the reel.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedClip {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub segments: Vec<ClipSegment>,
    pub skipped: Vec<SkippedClip>,
}

pub struct TransformStage<'a> {
    backend: &'a dyn MediaBackend,
    analyzer: MotionAnalyzer,
    options: TransformOptions,
}

impl<'a> TransformStage<'a> {
    pub fn new(backend: &'a dyn MediaBackend, options: TransformOptions) -> Self {
        Self {
            backend,
            analyzer: MotionAnalyzer::default(),
            options,
        }
    }

    /// Transform every input, adopting opened handles into `scope`.
    ///
    /// Returns [`MediaError::NoClips`] after closing every handle in `scope`
    /// when no clip survives.
    pub async fn run<R: Rng + Send>(
        &self,
        inputs: &[SourceInput],
        scope: &mut ResourceScope,
        rng: &mut R,
    ) -> MediaResult<TransformOutput> {
        let mut segments = Vec::new();
        let mut skipped = Vec::new();

        for (i, input) in inputs.iter().enumerate() {
            info!(path = %input.path.display(), "Processing video {}", i + 1);
            match self.transform_one(input, scope, rng).await {
                Ok(mut clip_segments) => segments.append(&mut clip_segments),
                Err(e) => {
                    warn!(path = %input.path.display(), "Skipping clip: {}", e);
                    metrics::counter!(CLIPS_SKIPPED_METRIC).increment(1);
                    skipped.push(SkippedClip {
                        path: input.path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if segments.is_empty() {
            scope.close_all();
            return Err(MediaError::NoClips);
        }

        Ok(TransformOutput { segments, skipped })
    }

    async fn transform_one<R: Rng + Send>(
        &self,
        input: &SourceInput,
        scope: &mut ResourceScope,
        rng: &mut R,
    ) -> MediaResult<Vec<ClipSegment>> {
        if !input.path.exists() {
            return Err(MediaError::FileNotFound(input.path.clone()));
        }

        let source = self.backend.open_video(&input.path).await?;
        let handle = scope.adopt_video(source);

        let planned = self.plan_clip(input, scope, handle, rng).await;
        if planned.is_err() {
            scope.release_video(handle);
        }
        planned
    }

    async fn plan_clip<R: Rng + Send>(
        &self,
        input: &SourceInput,
        scope: &ResourceScope,
        handle: VideoHandle,
        rng: &mut R,
    ) -> MediaResult<Vec<ClipSegment>> {
        let source = scope.video(handle)?;
        let info = source.info().clone();
        if !info.has_valid_duration() {
            return Err(MediaError::InvalidVideo(format!(
                "{} has no valid duration",
                input.path.display()
            )));
        }
        debug!(path = %input.path.display(), "Duration: {:.2}s", info.duration);

        let windows = match input.trim {
            Some(trim) => {
                let window = TrimWindow::resolve(trim.start, trim.end, info.duration).ok_or_else(|| {
                    MediaError::InvalidTrim(format!(
                        "trimmed clip too short ({:?}..{:?} of {:.2}s)",
                        trim.start, trim.end, info.duration
                    ))
                })?;
                debug!("Trimming: {:.2}s to {:.2}s", window.start, window.end);
                vec![window]
            }
            None if self.options.auto_moments => {
                let moments = self.analyzer.detect(source, rng).await;
                let windows: Vec<TrimWindow> = moments
                    .iter()
                    .filter_map(|m| TrimWindow::resolve(Some(m.start), Some(m.end()), info.duration))
                    .collect();
                if windows.is_empty() {
                    vec![whole_clip(&info)?]
                } else {
                    debug!("Auto moments: {:?}", windows);
                    windows
                }
            }
            None => vec![whole_clip(&info)?],
        };

        let geometry = vertical_geometry(&info, self.options.output_height)?;
        let keep_audio = info.has_audio && !self.options.mute;

        Ok(windows
            .into_iter()
            .map(|window| ClipSegment {
                source: input.path.clone(),
                start: window.start,
                duration: window.span(),
                geometry,
                keep_audio,
            })
            .collect())
    }
}

/// The untrimmed clip, held to the same minimum span as a trimmed one.
fn whole_clip(info: &SourceInfo) -> MediaResult<TrimWindow> {
    TrimWindow::resolve(None, None, info.duration).ok_or_else(|| {
        MediaError::InvalidTrim(format!(
            "clip too short ({:.2}s, need {:.1}s)",
            info.duration, MIN_TRIM_SPAN
        ))
    })
}

/// Scale to `height` keeping proportions, then center-crop to 9:16 when wider.
///
/// Widths are rounded down to even for H.264.
pub fn vertical_geometry(info: &SourceInfo, height: u32) -> MediaResult<Geometry> {
    if info.width == 0 || info.height == 0 || height == 0 {
        return Err(MediaError::InvalidGeometry(format!(
            "cannot resize {}x{} to height {}",
            info.width, info.height, height
        )));
    }

    let exact = f64::from(info.width) * f64::from(height) / f64::from(info.height);
    let scaled_width = floor_even(exact);
    if scaled_width == 0 {
        return Err(MediaError::InvalidGeometry(format!(
            "{}x{} collapses to zero width",
            info.width, info.height
        )));
    }

    let crop_width = if u64::from(scaled_width) * u64::from(ASPECT_DEN) > u64::from(height) * u64::from(ASPECT_NUM) {
        // at most `height`, so it fits back into u32
        let target = (u64::from(height) * u64::from(ASPECT_NUM) / u64::from(ASPECT_DEN)) as u32 & !1;
        if target == 0 {
            return Err(MediaError::InvalidGeometry(format!("crop of height {} is empty", height)));
        }
        Some(target)
    } else {
        None
    };

    Ok(Geometry {
        scaled_width,
        scaled_height: height,
        crop_width,
    })
}

fn floor_even(value: f64) -> u32 {
    let halves = (value / 2.0).floor().clamp(0.0, f64::from(u32::MAX / 2));
    halves as u32 * 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32, height: u32) -> SourceInfo {
        SourceInfo {
            path: PathBuf::from("clip.mp4"),
            duration: 5.0,
            width,
            height,
            has_audio: true,
        }
    }

    #[test]
    fn test_landscape_is_cropped_to_vertical() {
        let g = vertical_geometry(&info(1920, 1080), 720).unwrap();
        assert_eq!(g.scaled_width, 1280);
        assert_eq!(g.scaled_height, 720);
        assert_eq!(g.crop_width, Some(404));
        assert_eq!(g.crop_x(), 438);
    }

    #[test]
    fn test_portrait_is_only_scaled() {
        let g = vertical_geometry(&info(1080, 1920), 720).unwrap();
        assert_eq!(g.scaled_width, 404);
        assert_eq!(g.crop_width, None);

        let g = vertical_geometry(&info(720, 1440), 720).unwrap();
        assert_eq!(g.scaled_width, 360);
        assert_eq!(g.crop_width, None);
    }

    #[test]
    fn test_huge_output_height_does_not_overflow() {
        let height = u32::MAX;
        let g = vertical_geometry(&info(1920, 1080), height).unwrap();
        let expected = (u64::from(height) * 9 / 16) as u32 & !1;
        assert_eq!(g.crop_width, Some(expected));
        assert_eq!(g.scaled_height, height);
        assert_eq!(g.scaled_width % 2, 0);
    }

    #[test]
    fn test_degenerate_geometry_fails() {
        assert!(vertical_geometry(&info(0, 1080), 720).is_err());
        assert!(vertical_geometry(&info(1, 100000), 720).is_err());
    }
}
