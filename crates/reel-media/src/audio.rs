//! Background music: looping, fades and attenuation.
//!
//! Everything here is best-effort. A missing or undecodable track leaves the
//! clips' own audio in place, and a bad fade or volume setting only drops that
//! effect.

use std::path::Path;
use tracing::{info, warn};

use crate::error::{MediaError, MediaResult};
use crate::plan::{AudioBinding, FeatureOutcome, MusicBed};
use crate::scope::ResourceScope;
use crate::source::MediaBackend;

/// Gain applied to background music.
pub const DEFAULT_MUSIC_VOLUME: f64 = 0.3;
/// Refuse to loop a track more often than this.
const MAX_PLAYS: u32 = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct MixOptions {
    /// Fade in/out length in seconds, 0 disables
    pub fade: f64,
    pub volume: f64,
}

impl Default for MixOptions {
    fn default() -> Self {
        Self {
            fade: 2.0,
            volume: DEFAULT_MUSIC_VOLUME,
        }
    }
}

/// Audio chosen for the reel and what happened to each music feature.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicMix {
    pub binding: AudioBinding,
    pub music: FeatureOutcome,
    pub fade: FeatureOutcome,
    pub volume: FeatureOutcome,
}

impl MusicMix {
    fn native(music: FeatureOutcome) -> Self {
        Self {
            binding: AudioBinding::Native,
            music,
            fade: FeatureOutcome::NotRequested,
            volume: FeatureOutcome::NotRequested,
        }
    }
}

/// How many whole plays of a track cover `timeline` seconds.
///
/// A track at least as long as the timeline plays once and is cut.
pub fn plays_needed(track: f64, timeline: f64) -> MediaResult<u32> {
    if !(track.is_finite() && track > 0.0) {
        return Err(MediaError::InvalidAudio(format!("track duration {} is unusable", track)));
    }
    if track >= timeline {
        return Ok(1);
    }
    let plays = (timeline / track).floor() + 1.0;
    if plays > f64::from(MAX_PLAYS) {
        return Err(MediaError::InvalidAudio(format!(
            "{:.3}s track would need {} loops",
            track, plays
        )));
    }
    Ok(plays as u32)
}

/// Validate a fade length against the bed it applies to.
pub fn fade_envelope(fade: f64, bed: f64) -> MediaResult<f64> {
    if !fade.is_finite() || fade < 0.0 {
        return Err(MediaError::audio_effect(format!("fade of {}s is invalid", fade)));
    }
    if fade > bed {
        return Err(MediaError::audio_effect(format!(
            "fade of {:.2}s is longer than the {:.2}s track",
            fade, bed
        )));
    }
    Ok(fade)
}

/// Validate a gain factor.
pub fn volume_factor(volume: f64) -> MediaResult<f64> {
    if !volume.is_finite() || volume < 0.0 {
        return Err(MediaError::audio_effect(format!("volume factor {} is invalid", volume)));
    }
    Ok(volume)
}

pub struct AudioMixer<'a> {
    backend: &'a dyn MediaBackend,
    options: MixOptions,
}

impl<'a> AudioMixer<'a> {
    pub fn new(backend: &'a dyn MediaBackend, options: MixOptions) -> Self {
        Self { backend, options }
    }

    /// Prepare `music` to cover exactly `timeline` seconds.
    pub async fn mix(&self, music: Option<&Path>, timeline: f64, scope: &mut ResourceScope) -> MusicMix {
        let Some(path) = music else {
            return MusicMix::native(FeatureOutcome::NotRequested);
        };
        if !path.exists() {
            warn!(path = %path.display(), "Music file not found, keeping clip audio");
            return MusicMix::native(FeatureOutcome::skipped("music file not found"));
        }

        info!(path = %path.display(), "Adding music");
        let track = match self.backend.open_audio(path).await {
            Ok(track) => track,
            Err(e) => {
                warn!(path = %path.display(), "Could not add music: {}", e);
                return MusicMix::native(FeatureOutcome::skipped(e));
            }
        };
        let handle = scope.adopt_audio(track);
        let track_duration = match scope.audio(handle) {
            Ok(track) => track.duration(),
            Err(e) => return MusicMix::native(FeatureOutcome::skipped(e)),
        };

        let plays = match plays_needed(track_duration, timeline) {
            Ok(plays) => plays,
            Err(e) => {
                warn!(path = %path.display(), "Could not add music: {}", e);
                return MusicMix::native(FeatureOutcome::skipped(e));
            }
        };
        if plays > 1 {
            info!("Music shorter than video, looping {} times", plays);
        }

        let (fade, fade_outcome) = if self.options.fade == 0.0 {
            (None, FeatureOutcome::NotRequested)
        } else {
            match fade_envelope(self.options.fade, timeline) {
                Ok(fade) => {
                    info!("Applying {:.2}s fade in/out", fade);
                    (Some(fade), FeatureOutcome::Applied)
                }
                Err(e) => {
                    warn!("Fade effect failed: {}, continuing without fade", e);
                    (None, FeatureOutcome::skipped(e))
                }
            }
        };

        let (volume, volume_outcome) = match volume_factor(self.options.volume) {
            Ok(volume) => (Some(volume), FeatureOutcome::Applied),
            Err(e) => {
                warn!("Volume adjustment failed: {}, continuing at full volume", e);
                (None, FeatureOutcome::skipped(e))
            }
        };

        MusicMix {
            binding: AudioBinding::Music(MusicBed {
                path: path.to_path_buf(),
                plays,
                duration: timeline,
                fade,
                volume,
            }),
            music: FeatureOutcome::Applied,
            fade: fade_outcome,
            volume: volume_outcome,
        }
    }
}
