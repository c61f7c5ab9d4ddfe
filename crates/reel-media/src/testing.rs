//! In-memory [`MediaBackend`] for tests.
//!
//! Media is registered by file name. Opening a file that exists on disk but was
//! never registered fails the way a corrupt file would. Rendering writes the
//! plan as JSON to the output path, so tests can inspect what would have been
//! encoded.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{MediaError, MediaResult};
use crate::plan::RenderPlan;
use crate::source::{AudioSource, Frame, MediaBackend, SourceInfo, VideoSource};

/// Properties of a registered fake video.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeVideo {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
    pub decodable: bool,
}

impl FakeVideo {
    /// A 1920x1080 clip with audio.
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            width: 1920,
            height: 1080,
            has_audio: true,
            decodable: true,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn without_audio(mut self) -> Self {
        self.has_audio = false;
        self
    }

    pub fn undecodable(mut self) -> Self {
        self.decodable = false;
        self
    }
}

#[derive(Debug, Default)]
struct Ledger {
    opened: HashMap<String, usize>,
    closed: HashMap<String, usize>,
    plans: Vec<RenderPlan>,
}

type SharedLedger = Arc<Mutex<Ledger>>;

fn lock(ledger: &SharedLedger) -> MutexGuard<'_, Ledger> {
    ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[derive(Default)]
pub struct FakeBackend {
    videos: Mutex<HashMap<String, FakeVideo>>,
    audios: Mutex<HashMap<String, f64>>,
    ledger: SharedLedger,
    fail_renders: AtomicBool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_video(&self, name: &str, video: FakeVideo) {
        self.videos
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(name.to_string(), video);
    }

    pub fn register_audio(&self, name: &str, duration: f64) {
        self.audios
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(name.to_string(), duration);
    }

    /// Make every following render fail.
    pub fn fail_renders(&self, fail: bool) {
        self.fail_renders.store(fail, Ordering::SeqCst);
    }

    pub fn open_count(&self, name: &str) -> usize {
        lock(&self.ledger).opened.get(name).copied().unwrap_or(0)
    }

    pub fn close_count(&self, name: &str) -> usize {
        lock(&self.ledger).closed.get(name).copied().unwrap_or(0)
    }

    /// Handles opened but not yet closed, across all files.
    pub fn open_handles(&self) -> usize {
        let ledger = lock(&self.ledger);
        let opened: usize = ledger.opened.values().sum();
        let closed: usize = ledger.closed.values().sum();
        opened.saturating_sub(closed)
    }

    pub fn rendered_plans(&self) -> Vec<RenderPlan> {
        lock(&self.ledger).plans.clone()
    }

    fn record_open(&self, name: &str) {
        *lock(&self.ledger).opened.entry(name.to_string()).or_default() += 1;
    }
}

#[async_trait]
impl MediaBackend for FakeBackend {
    async fn open_video(&self, path: &Path) -> MediaResult<Box<dyn VideoSource>> {
        let name = key(path);
        let video = self
            .videos
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&name)
            .cloned()
            .ok_or_else(|| MediaError::InvalidVideo(format!("{} is not a readable video", name)))?;

        self.record_open(&name);
        Ok(Box::new(FakeVideoSource {
            info: SourceInfo {
                path: path.to_path_buf(),
                duration: video.duration,
                width: video.width,
                height: video.height,
                has_audio: video.has_audio,
            },
            decodable: video.decodable,
            name,
            ledger: Arc::clone(&self.ledger),
        }))
    }

    async fn open_audio(&self, path: &Path) -> MediaResult<Box<dyn AudioSource>> {
        let name = key(path);
        let duration = self
            .audios
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&name)
            .copied()
            .ok_or_else(|| MediaError::InvalidAudio(format!("{} is not a readable audio file", name)))?;

        self.record_open(&name);
        Ok(Box::new(FakeAudioSource {
            path: path.to_path_buf(),
            duration,
            name,
            ledger: Arc::clone(&self.ledger),
        }))
    }

    async fn render(&self, plan: &RenderPlan, output: &Path) -> MediaResult<()> {
        lock(&self.ledger).plans.push(plan.clone());
        if self.fail_renders.load(Ordering::SeqCst) {
            // Leave a half-written file behind like a crashed encoder would
            tokio::fs::write(output, b"partial").await?;
            return Err(MediaError::ffmpeg_failed("simulated encoder crash", None, Some(1)));
        }
        let json = serde_json::to_vec_pretty(plan)?;
        tokio::fs::write(output, json).await?;
        Ok(())
    }
}

struct FakeVideoSource {
    info: SourceInfo,
    decodable: bool,
    name: String,
    ledger: SharedLedger,
}

#[async_trait]
impl VideoSource for FakeVideoSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    async fn frame_at(&self, t: f64) -> MediaResult<Frame> {
        if !self.decodable {
            return Err(MediaError::frame_decode("fake clip has no frames"));
        }
        // Alternates every half second so every sample pair scores
        let level = ((t * 2.0).floor() as u32 % 2 * 200) as u8;
        Frame::new(4, 4, vec![level; 48])
    }

    fn close(&mut self) -> MediaResult<()> {
        *lock(&self.ledger).closed.entry(self.name.clone()).or_default() += 1;
        Ok(())
    }
}

struct FakeAudioSource {
    path: PathBuf,
    duration: f64,
    name: String,
    ledger: SharedLedger,
}

impl AudioSource for FakeAudioSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn close(&mut self) -> MediaResult<()> {
        *lock(&self.ledger).closed.entry(self.name.clone()).or_default() += 1;
        Ok(())
    }
}
