//! Time windows: clip trims, caption spans and analyzer moments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Shortest trimmed clip that is kept (seconds).
pub const MIN_TRIM_SPAN: f64 = 0.5;
/// Shortest caption display span (seconds).
pub const MIN_CAPTION_SPAN: f64 = 0.1;

/// Slack for float comparisons against media durations.
const EPSILON: f64 = 1e-6;

/// Portion of a source clip that ends up in the reel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrimWindow {
    pub start: f64,
    pub end: f64,
}

impl TrimWindow {
    /// Resolve requested trim points against a clip duration.
    ///
    /// The start is clamped into `[0, duration]` and the end is pushed out to at
    /// least `start + 0.5`. A window that then runs past the clip (or is shorter
    /// than the minimum) is collapsed and `None` is returned.
    pub fn resolve(trim_start: Option<f64>, trim_end: Option<f64>, duration: f64) -> Option<Self> {
        if !duration.is_finite() || duration <= 0.0 {
            return None;
        }

        let requested_start = trim_start.unwrap_or(0.0);
        let requested_end = trim_end.unwrap_or(duration);
        if !requested_start.is_finite() || !requested_end.is_finite() {
            return None;
        }

        let start = requested_start.clamp(0.0, duration);
        let end = (start + MIN_TRIM_SPAN).max(requested_end.min(duration));

        let window = Self { start, end };
        if window.span() + EPSILON < MIN_TRIM_SPAN || end > duration + EPSILON {
            return None;
        }
        Some(window)
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }
}

/// Display interval of a caption on the final timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionWindow {
    pub start: f64,
    pub end: f64,
}

impl CaptionWindow {
    /// Clamp caption times into `[0, timeline]` keeping at least a 0.1s span.
    ///
    /// When the minimum span would push the end past the timeline the start is
    /// pulled back instead. Returns `None` only for timelines shorter than the
    /// minimum span.
    pub fn clamp(start: f64, end: f64, timeline: f64) -> Option<Self> {
        if !timeline.is_finite() || timeline < MIN_CAPTION_SPAN {
            return None;
        }
        let start = if start.is_finite() { start } else { 0.0 };
        let end = if end.is_finite() { end } else { timeline };

        let mut start = start.clamp(0.0, timeline);
        let mut end = (start + MIN_CAPTION_SPAN).max(end.min(timeline));
        if end > timeline {
            end = timeline;
            start = (timeline - MIN_CAPTION_SPAN).max(0.0);
        }
        Some(Self { start, end })
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }
}

/// A segment chosen by the motion analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Moment {
    pub start: f64,
    pub length: f64,
}

impl Moment {
    pub fn new(start: f64, length: f64) -> Self {
        Self { start, length }
    }

    pub fn end(&self) -> f64 {
        self.start + self.length
    }
}
