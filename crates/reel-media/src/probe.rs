//! Clip and music metadata via `ffprobe -show_format -show_streams`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Assumed when the container reports no usable frame rate.
const FALLBACK_FPS: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Seconds, 0 when neither container nor stream report one
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    /// Whether the clip carries its own sound
    pub has_audio: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    pub duration: f64,
    pub codec: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StreamKind {
    Video,
    Audio,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Probe {
    #[serde(default)]
    format: Container,
    #[serde(default)]
    streams: Vec<Stream>,
}

#[derive(Debug, Default, Deserialize)]
struct Container {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Stream {
    codec_type: StreamKind,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

impl Probe {
    fn first(&self, kind: StreamKind) -> Option<&Stream> {
        self.streams.iter().find(|s| s.codec_type == kind)
    }

    /// Container duration, else the stream's own.
    fn duration_of(&self, stream: &Stream) -> f64 {
        positive_seconds(self.format.duration.as_deref())
            .or_else(|| positive_seconds(stream.duration.as_deref()))
            .unwrap_or(0.0)
    }

    fn video(&self) -> MediaResult<VideoInfo> {
        let stream = self
            .first(StreamKind::Video)
            .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

        // avg_frame_rate is 0/0 for some variable rate files
        let fps = [&stream.avg_frame_rate, &stream.r_frame_rate]
            .into_iter()
            .flatten()
            .find_map(|rate| frame_rate(rate))
            .unwrap_or(FALLBACK_FPS);

        Ok(VideoInfo {
            duration: self.duration_of(stream),
            width: stream.width.unwrap_or(0),
            height: stream.height.unwrap_or(0),
            fps,
            codec: stream.codec_name.clone().unwrap_or_default(),
            has_audio: self.first(StreamKind::Audio).is_some(),
        })
    }

    fn audio(&self) -> MediaResult<AudioInfo> {
        let stream = self
            .first(StreamKind::Audio)
            .ok_or_else(|| MediaError::InvalidAudio("No audio stream found".to_string()))?;
        Ok(AudioInfo {
            duration: self.duration_of(stream),
            codec: stream.codec_name.clone().unwrap_or_default(),
        })
    }
}

async fn probe(path: &Path) -> MediaResult<Probe> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args(["-v", "error", "-of", "json", "-show_format", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(MediaError::FfprobeFailed {
            message: format!("Could not probe {}", path.display()),
            stderr: (!stderr.is_empty()).then_some(stderr),
        });
    }
    Ok(serde_json::from_slice(&output.stdout)?)
}

pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    probe(path.as_ref()).await?.video()
}

pub async fn probe_audio(path: impl AsRef<Path>) -> MediaResult<AudioInfo> {
    probe(path.as_ref()).await?.audio()
}

fn positive_seconds(value: Option<&str>) -> Option<f64> {
    value?.parse::<f64>().ok().filter(|s| s.is_finite() && *s > 0.0)
}

/// `"30000/1001"` or `"25"`; zero and undefined rates are `None`.
fn frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => num.trim().parse::<f64>().ok()? / den.trim().parse::<f64>().ok()?,
        None => rate.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}
