//! Service configuration.

use std::path::{Path, PathBuf};

use reel_media::{PipelineSettings, DEFAULT_MUSIC_VOLUME};
use reel_models::EncodingConfig;

/// Reel service configuration.
#[derive(Debug, Clone)]
pub struct ReelConfig {
    /// Parent of the per-session upload folders
    pub upload_dir: PathBuf,
    /// Where rendered reels are written
    pub output_dir: PathBuf,
    /// Music library relative music paths are resolved against
    pub music_dir: PathBuf,
    /// Custom caption fonts
    pub font_dir: PathBuf,
    /// Height every clip is scaled to
    pub output_height: u32,
    /// Gain applied to background music
    pub music_volume: f64,
    /// File name offered when a reel is downloaded
    pub download_name: String,
    /// Encoder thread cap
    pub ffmpeg_threads: u32,
}

impl Default for ReelConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            music_dir: PathBuf::from("music"),
            font_dir: PathBuf::from("fonts"),
            output_height: 720,
            music_volume: DEFAULT_MUSIC_VOLUME,
            download_name: "pet_reel.mp4".to_string(),
            ffmpeg_threads: 8,
        }
    }
}

impl ReelConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            upload_dir: env_path("REEL_UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            output_dir: env_path("REEL_OUTPUT_DIR").unwrap_or(defaults.output_dir),
            music_dir: env_path("REEL_MUSIC_DIR").unwrap_or(defaults.music_dir),
            font_dir: env_path("REEL_FONT_DIR").unwrap_or(defaults.font_dir),
            output_height: std::env::var("REEL_OUTPUT_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|h| *h > 0)
                .unwrap_or(defaults.output_height),
            music_volume: std::env::var("REEL_MUSIC_VOLUME")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.music_volume),
            download_name: std::env::var("REEL_DOWNLOAD_NAME").unwrap_or(defaults.download_name),
            ffmpeg_threads: std::env::var("REEL_FFMPEG_THREADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.ffmpeg_threads),
        }
    }

    /// Rooted at `base`, for tests and local runs.
    pub fn under(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            upload_dir: base.join("uploads"),
            output_dir: base.join("outputs"),
            music_dir: base.join("music"),
            font_dir: base.join("fonts"),
            ..Self::default()
        }
    }

    /// Create the upload, output, music and font folders.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.upload_dir, &self.output_dir, &self.music_dir, &self.font_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn session_upload_dir(&self, session: &str) -> PathBuf {
        self.upload_dir.join(session)
    }

    pub fn artifact_path(&self, artifact_file_name: &str) -> PathBuf {
        self.output_dir.join(artifact_file_name)
    }

    /// Absolute or existing paths are used as given, anything else is looked up
    /// in the music library.
    pub fn resolve_music_path(&self, requested: &str) -> PathBuf {
        let path = PathBuf::from(requested);
        if path.is_absolute() || path.exists() {
            path
        } else {
            self.music_dir.join(path)
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            output_height: self.output_height,
            music_volume: self.music_volume,
            encoding: EncodingConfig::default().with_threads(self.ffmpeg_threads),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty()).map(PathBuf::from)
}
