//! File-type helpers for uploaded media.

use std::path::Path;

/// Video container extensions accepted from uploads.
pub const ALLOWED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv"];

/// Music extensions accepted from uploads.
pub const ALLOWED_MUSIC_EXTENSIONS: &[&str] = &["mp3", "wav", "aac", "m4a", "ogg", "flac"];

fn has_extension(name: &str, allowed: &[&str]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| allowed.iter().any(|a| a.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Whether a file name looks like an accepted video upload.
pub fn is_allowed_video(name: &str) -> bool {
    has_extension(name, ALLOWED_VIDEO_EXTENSIONS)
}

/// Whether a file name looks like an accepted music upload.
pub fn is_allowed_music(name: &str) -> bool {
    has_extension(name, ALLOWED_MUSIC_EXTENSIONS)
}
