//! Motion-based moment selection.
//!
//! Samples frame pairs across a clip, scores them by mean absolute pixel
//! difference and turns the busiest sample points into short segments.
//! Segment lengths and the no-frames fallback are randomized, so callers pass
//! in the random source.

use rand::Rng;
use reel_models::Moment;
use tracing::{debug, warn};

use crate::source::VideoSource;

/// Moments returned by default.
pub const DEFAULT_MOMENT_COUNT: usize = 2;
/// Upper bound on sampled timestamps.
pub const MAX_SAMPLES: usize = 15;
/// Gap between the two frames of a motion sample (seconds).
const PAIR_GAP: f64 = 0.5;
/// Longest fallback segment (seconds).
const FALLBACK_MAX_LENGTH: f64 = 4.0;
/// Fallback segment as a share of the clip.
const FALLBACK_SHARE: f64 = 0.4;
/// Offset range when frames cannot be decoded at all.
const UNDECODABLE_OFFSET: (f64, f64) = (0.1, 0.5);
/// Offset range when decoding worked but no sample scored.
const UNSCORED_OFFSET: (f64, f64) = (0.15, 0.55);
/// Segment length range for scored moments.
const SEGMENT_LENGTH: (f64, f64) = (2.5, 4.0);
/// Tail margin kept clear of the clip end.
const TAIL_MARGIN: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
struct MotionSample {
    time: f64,
    score: f64,
}

/// Picks interesting segments from a clip.
#[derive(Debug, Clone)]
pub struct MotionAnalyzer {
    moment_count: usize,
}

impl Default for MotionAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_MOMENT_COUNT)
    }
}

impl MotionAnalyzer {
    pub fn new(moment_count: usize) -> Self {
        Self {
            moment_count: moment_count.max(1),
        }
    }

    /// Find up to `moment_count` moments in `source`.
    pub async fn detect<R: Rng + Send>(&self, source: &dyn VideoSource, rng: &mut R) -> Vec<Moment> {
        let duration = source.info().duration;

        if !duration.is_finite() || duration <= 0.0 {
            return vec![Moment::new(0.0, 2.0)];
        }
        if duration < 2.0 {
            return vec![Moment::new(0.0, duration.min(2.0))];
        }

        if let Err(e) = source.frame_at(0.0).await {
            debug!(
                path = %source.info().path.display(),
                "Frame decoding unavailable ({}), using time-based segment", e
            );
            return vec![random_segment(duration, UNDECODABLE_OFFSET, rng)];
        }

        let samples = self.score_samples(source, duration).await;
        if samples.is_empty() {
            debug!(path = %source.info().path.display(), "No motion scores, using single segment");
            return vec![random_segment(duration, UNSCORED_OFFSET, rng)];
        }

        select_moments(samples, self.moment_count, duration, rng)
    }

    async fn score_samples(&self, source: &dyn VideoSource, duration: f64) -> Vec<MotionSample> {
        let count = MAX_SAMPLES.min(duration.floor() as usize).max(1);
        let interval = duration / count as f64;
        let mut samples = Vec::with_capacity(count);

        for i in 0..count {
            let time = i as f64 * interval;
            if time + 1.0 > duration {
                break;
            }

            let second = (time + PAIR_GAP).min(duration - TAIL_MARGIN);
            let score = match (source.frame_at(time).await, source.frame_at(second).await) {
                (Ok(a), Ok(b)) => a.mean_abs_diff(&b),
                (Err(e), _) | (_, Err(e)) => Err(e),
            };

            match score {
                Ok(score) => samples.push(MotionSample { time, score }),
                Err(e) => warn!("Frame analysis failed at {:.2}s: {}", time, e),
            }
        }

        samples
    }
}

/// One segment at a random offset, used when motion cannot be scored.
fn random_segment<R: Rng>(duration: f64, offset_range: (f64, f64), rng: &mut R) -> Moment {
    let length = FALLBACK_MAX_LENGTH.min(duration * FALLBACK_SHARE);
    let offset = rng.random_range(offset_range.0..offset_range.1);
    let mut start = duration * offset;
    if start + length > duration {
        start = (duration - length - TAIL_MARGIN).max(0.0);
    }
    Moment::new(start, length)
}

fn select_moments<R: Rng>(
    mut samples: Vec<MotionSample>,
    count: usize,
    duration: f64,
    rng: &mut R,
) -> Vec<Moment> {
    samples.sort_by(|a, b| b.score.total_cmp(&a.score));

    samples
        .into_iter()
        .take(count)
        .map(|sample| {
            let mut start = sample.time;
            let mut length = rng.random_range(SEGMENT_LENGTH.0..=SEGMENT_LENGTH.1);

            if start + length > duration {
                length = duration - start - TAIL_MARGIN;
                if length < 1.0 {
                    start = (duration - FALLBACK_MAX_LENGTH).max(0.0);
                    length = FALLBACK_MAX_LENGTH.min(duration - start - TAIL_MARGIN);
                }
            }

            Moment::new(start, length)
        })
        .collect()
}
