//! Encode progress read from `-progress pipe:2`.
//!
//! FFmpeg writes `key=value` lines in blocks, each closed by a `progress=`
//! line. [`EncodeProgress::feed`] folds lines into the open block and hands
//! back a snapshot when it closes.

use serde::{Deserialize, Serialize};

/// Where the encoder is along the reel timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodeProgress {
    pub frame: u64,
    /// Timeline position written so far, in seconds.
    pub position: f64,
    /// Encode speed relative to realtime.
    pub speed: f64,
    pub finished: bool,
}

impl EncodeProgress {
    /// Whether `line` belongs to a progress block rather than the log.
    pub fn is_progress_line(line: &str) -> bool {
        matches!(
            line.trim().split_once('=').map(|(k, _)| k),
            Some(
                "frame"
                    | "fps"
                    | "stream_0_0_q"
                    | "bitrate"
                    | "total_size"
                    | "out_time_us"
                    | "out_time_ms"
                    | "out_time"
                    | "dup_frames"
                    | "drop_frames"
                    | "speed"
                    | "progress"
            )
        )
    }

    pub fn feed(&mut self, line: &str) -> Option<EncodeProgress> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            // out_time_ms is microseconds too, despite the name
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.position = us.max(0) as f64 / 1_000_000.0;
                }
            }
            "frame" => self.frame = value.parse().unwrap_or(self.frame),
            "speed" => {
                if let Some(speed) = value.trim().strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.speed = speed;
                }
            }
            "progress" => {
                self.finished = value == "end";
                return Some(self.clone());
            }
            _ => {}
        }
        None
    }

    /// Share of a `timeline` seconds long reel already written, 0 to 100.
    pub fn percent_of(&self, timeline: f64) -> f64 {
        if timeline <= 0.0 {
            return if self.finished { 100.0 } else { 0.0 };
        }
        (self.position / timeline * 100.0).clamp(0.0, 100.0)
    }
}

/// Lets a report through each time progress crosses another `step` percent.
#[derive(Debug, Clone)]
pub struct ProgressSteps {
    step: f64,
    next: f64,
}

impl ProgressSteps {
    pub fn new(step: f64) -> Self {
        let step = step.max(1.0);
        Self { step, next: step }
    }

    /// The step reached by `percent`, if it is a new one.
    pub fn reached(&mut self, percent: f64) -> Option<f64> {
        if percent < self.next {
            return None;
        }
        let reached = (percent / self.step).floor() * self.step;
        self.next = reached + self.step;
        Some(reached)
    }
}
