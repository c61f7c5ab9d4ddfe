//! The composed reel, described as data.
//!
//! Transform, compositor and mixer each contribute a part of a [`RenderPlan`];
//! the backend turns the finished plan into one encode.

use reel_models::{CaptionPosition, CaptionWindow, EncodingConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Scale and crop applied to one clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub scaled_width: u32,
    pub scaled_height: u32,
    /// Centered horizontal crop width, when the clip is wider than 9:16
    pub crop_width: Option<u32>,
}

impl Geometry {
    pub fn output_width(&self) -> u32 {
        self.crop_width.unwrap_or(self.scaled_width)
    }

    pub fn output_height(&self) -> u32 {
        self.scaled_height
    }

    /// Left edge of the centered crop in scaled coordinates.
    pub fn crop_x(&self) -> u32 {
        self.crop_width
            .map(|w| self.scaled_width.saturating_sub(w) / 2)
            .unwrap_or(0)
    }
}

/// One trimmed, transformed piece of a source clip, in timeline order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSegment {
    pub source: PathBuf,
    /// Trim start within the source (seconds)
    pub start: f64,
    /// Trimmed length (seconds)
    pub duration: f64,
    pub geometry: Geometry,
    /// Native audio survives (source has audio and mute was not requested)
    pub keep_audio: bool,
}

/// A text overlay ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionOverlay {
    /// Wrapped text, lines separated by `\n`
    pub text: String,
    pub window: CaptionWindow,
    pub position: CaptionPosition,
    pub font_size: u32,
    /// FFmpeg color expression for the fill
    pub color: String,
    pub stroke_color: String,
    pub stroke_width: u32,
    pub font_file: Option<PathBuf>,
}

/// Background music prepared to cover the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicBed {
    pub path: PathBuf,
    /// Total plays of the track (1 means no looping)
    pub plays: u32,
    /// Exact length the bed is cut/padded to
    pub duration: f64,
    /// Symmetric fade in/out length
    pub fade: Option<f64>,
    /// Gain factor
    pub volume: Option<f64>,
}

/// Which audio ends up in the encoded reel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioBinding {
    /// Concatenated clip audio (silence where a clip has none)
    Native,
    /// Music replaces clip audio
    Music(MusicBed),
}

/// Whether an optional feature made it into the reel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum FeatureOutcome {
    #[default]
    NotRequested,
    Applied,
    Skipped(String),
}

impl FeatureOutcome {
    pub fn skipped(reason: impl ToString) -> Self {
        Self::Skipped(reason.to_string())
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, FeatureOutcome::Applied)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FeatureOutcome::Skipped(_))
    }
}

/// Outcome of each best-effort feature for one render.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureReport {
    pub captions: FeatureOutcome,
    pub music: FeatureOutcome,
    pub fade: FeatureOutcome,
    pub volume: FeatureOutcome,
}

/// Everything the backend needs to encode the reel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    pub segments: Vec<ClipSegment>,
    /// Width and height every segment is padded to
    pub canvas: (u32, u32),
    pub captions: Vec<CaptionOverlay>,
    pub audio: AudioBinding,
    pub encoding: EncodingConfig,
    pub features: FeatureReport,
}

impl RenderPlan {
    /// Timeline length in seconds.
    pub fn duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }
}
