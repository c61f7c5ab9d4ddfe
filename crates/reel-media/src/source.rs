//! Decoded media handles and the backend that opens and renders them.
//!
//! The pipeline only talks to media through these traits: a [`MediaBackend`]
//! opens [`VideoSource`] and [`AudioSource`] handles and renders a finished
//! [`RenderPlan`](crate::plan::RenderPlan). Every handle is closed exactly
//! once, see [`ResourceScope`](crate::scope::ResourceScope).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MediaError, MediaResult};
use crate::plan::RenderPlan;

/// Static facts about an opened video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub path: PathBuf,
    /// Duration in seconds (0 when unknown)
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

impl SourceInfo {
    pub fn has_valid_duration(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0
    }
}

/// A decoded RGB24 raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> MediaResult<Self> {
        let expected = (width as usize) * (height as usize) * 3;
        if data.len() != expected || expected == 0 {
            return Err(MediaError::frame_decode(format!(
                "expected {} bytes for {}x{} RGB frame, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    /// Mean absolute per-channel difference against another frame of the same size.
    pub fn mean_abs_diff(&self, other: &Frame) -> MediaResult<f64> {
        if self.width != other.width || self.height != other.height {
            return Err(MediaError::frame_decode(format!(
                "frame size mismatch: {}x{} vs {}x{}",
                self.width, self.height, other.width, other.height
            )));
        }
        let total: u64 = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| u64::from(a.abs_diff(*b)))
            .sum();
        Ok(total as f64 / self.data.len() as f64)
    }
}

/// An opened video file.
#[async_trait]
pub trait VideoSource: Send + Sync {
    fn info(&self) -> &SourceInfo;

    /// Decode the frame shown at `t` seconds.
    async fn frame_at(&self, t: f64) -> MediaResult<Frame>;

    /// Release the handle. Called exactly once by the owning scope.
    fn close(&mut self) -> MediaResult<()>;
}

/// An opened audio file.
pub trait AudioSource: Send + Sync {
    fn path(&self) -> &Path;

    /// Duration in seconds.
    fn duration(&self) -> f64;

    /// Release the handle. Called exactly once by the owning scope.
    fn close(&mut self) -> MediaResult<()>;
}

/// Opens media and renders finished plans.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn open_video(&self, path: &Path) -> MediaResult<Box<dyn VideoSource>>;

    async fn open_audio(&self, path: &Path) -> MediaResult<Box<dyn AudioSource>>;

    /// Encode `plan` into `output`.
    async fn render(&self, plan: &RenderPlan, output: &Path) -> MediaResult<()>;
}
