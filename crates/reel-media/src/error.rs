//! Reel assembly errors.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

/// Pipeline step an error belongs to, used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Open,
    Transform,
    Captions,
    Audio,
    Concatenate,
    Encode,
    Other,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Open => "open",
            Stage::Transform => "transform",
            Stage::Captions => "captions",
            Stage::Audio => "audio",
            Stage::Concatenate => "concatenate",
            Stage::Encode => "encode",
            Stage::Other => "other",
        }
    }
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg is not installed or not on PATH")]
    FfmpegNotFound,

    #[error("ffprobe is not installed or not on PATH")]
    FfprobeNotFound,

    #[error("ffmpeg failed: {message}")]
    FfmpegFailed {
        message: String,
        /// Last lines ffmpeg logged before exiting
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("ffprobe failed: {message}")]
    FfprobeFailed { message: String, stderr: Option<String> },

    #[error("No such media file: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Unreadable probe output: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Not a usable video: {0}")]
    InvalidVideo(String),

    #[error("Not a usable audio track: {0}")]
    InvalidAudio(String),

    #[error("Could not decode frame: {0}")]
    FrameDecode(String),

    #[error("Trim window out of range: {0}")]
    InvalidTrim(String),

    #[error("Bad output geometry: {0}")]
    InvalidGeometry(String),

    #[error("Caption layer: {0}")]
    Caption(String),

    #[error("Audio effect: {0}")]
    AudioEffect(String),

    #[error("No clips could be extracted from any video")]
    NoClips,

    #[error("Could not join clips: {0}")]
    ConcatFailed(String),

    #[error("Could not write reel: {0}")]
    EncodeFailed(String),

    #[error("{0} was already closed")]
    HandleClosed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    pub fn ffmpeg_failed(message: impl Into<String>, stderr: Option<String>, exit_code: Option<i32>) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn frame_decode(message: impl Into<String>) -> Self {
        Self::FrameDecode(message.into())
    }

    pub fn caption(message: impl Into<String>) -> Self {
        Self::Caption(message.into())
    }

    pub fn audio_effect(message: impl Into<String>) -> Self {
        Self::AudioEffect(message.into())
    }

    pub fn encode_failed(message: impl Into<String>) -> Self {
        Self::EncodeFailed(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn stage(&self) -> Stage {
        match self {
            MediaError::FileNotFound(_)
            | MediaError::FfprobeNotFound
            | MediaError::FfprobeFailed { .. }
            | MediaError::JsonParse(_)
            | MediaError::InvalidVideo(_)
            | MediaError::HandleClosed(_) => Stage::Open,
            MediaError::FrameDecode(_)
            | MediaError::InvalidTrim(_)
            | MediaError::InvalidGeometry(_)
            | MediaError::NoClips => Stage::Transform,
            MediaError::Caption(_) => Stage::Captions,
            MediaError::InvalidAudio(_) | MediaError::AudioEffect(_) => Stage::Audio,
            MediaError::ConcatFailed(_) => Stage::Concatenate,
            MediaError::FfmpegNotFound | MediaError::FfmpegFailed { .. } | MediaError::EncodeFailed(_) => {
                Stage::Encode
            }
            MediaError::Io(_) | MediaError::Internal(_) => Stage::Other,
        }
    }
}
