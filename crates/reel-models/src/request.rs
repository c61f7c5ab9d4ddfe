//! Render request as submitted by the upload front end.
//!
//! Field names follow the JSON the front end already sends (`startTime`,
//! `fontSize`), so the request can be deserialized as-is.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default caption font family.
pub const DEFAULT_FONT: &str = "Arial";
/// Default caption font size in pixels.
pub const DEFAULT_FONT_SIZE: u32 = 70;
/// Default caption fill color.
pub const DEFAULT_COLOR: &str = "white";
/// Default caption start (seconds).
pub const DEFAULT_CAPTION_START: f64 = 0.0;
/// Default caption end (seconds).
pub const DEFAULT_CAPTION_END: f64 = 3.0;
/// Default music fade in/out (seconds).
pub const DEFAULT_MUSIC_FADE: f64 = 2.0;

/// A request to assemble a reel from a session's uploads.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderRequest {
    #[serde(default)]
    pub session_id: String,

    /// Per-clip ordering and trim settings
    #[serde(default)]
    pub video_settings: Vec<ClipSettings>,

    #[serde(default)]
    pub captions: Vec<Caption>,

    #[serde(default)]
    pub music_source: MusicSource,

    /// Path of an uploaded music track (used when `music_source` is `local`)
    #[serde(default)]
    pub music_path: Option<String>,

    /// Global caption style
    #[serde(default)]
    pub text_style: Option<TextStyle>,

    /// Strip native audio from every clip
    #[serde(default)]
    pub mute_videos: bool,

    /// Music fade in/out duration in seconds (0 disables)
    #[serde(default = "default_music_fade")]
    pub music_fade: f64,

    /// Let the motion analyzer pick segments for clips without trim settings
    #[serde(default)]
    pub auto_moments: bool,
}

fn default_music_fade() -> f64 {
    DEFAULT_MUSIC_FADE
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            video_settings: Vec::new(),
            captions: Vec::new(),
            music_source: MusicSource::None,
            music_path: None,
            text_style: None,
            mute_videos: false,
            music_fade: DEFAULT_MUSIC_FADE,
            auto_moments: false,
        }
    }
}

impl RenderRequest {
    /// Settings sorted by their `order` field (stable for equal orders).
    pub fn ordered_settings(&self) -> Vec<&ClipSettings> {
        let mut sorted: Vec<&ClipSettings> = self.video_settings.iter().collect();
        sorted.sort_by_key(|s| s.order);
        sorted
    }

    /// Effective text style (request style or defaults).
    pub fn style(&self) -> TextStyle {
        self.text_style.clone().unwrap_or_default()
    }

    /// Music path to use, if any was requested.
    pub fn requested_music(&self) -> Option<&str> {
        match self.music_source {
            MusicSource::Local => self
                .music_path
                .as_deref()
                .filter(|p| !p.trim().is_empty()),
            MusicSource::None => None,
        }
    }
}

/// Where background music comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MusicSource {
    #[default]
    None,
    Local,
}

/// Ordering and trim for one uploaded clip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipSettings {
    /// Final sequence position
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub trim_start: Option<f64>,
    #[serde(default)]
    pub trim_end: Option<f64>,
    /// Uploaded file name this setting applies to
    #[serde(default)]
    pub filename: String,
}

/// A timed text overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Caption {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "startTime", default = "default_caption_start")]
    pub start_time: f64,
    #[serde(rename = "endTime", default = "default_caption_end")]
    pub end_time: f64,
    /// Overrides the global position when non-empty
    #[serde(default)]
    pub position: Option<String>,
    /// Overrides the global color when non-empty
    #[serde(default)]
    pub color: Option<String>,
}

fn default_caption_start() -> f64 {
    DEFAULT_CAPTION_START
}
fn default_caption_end() -> f64 {
    DEFAULT_CAPTION_END
}

impl Caption {
    pub fn new(text: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            text: text.into(),
            start_time,
            end_time,
            position: None,
            color: None,
        }
    }

    /// Caption text with surrounding whitespace removed.
    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }

    /// Effective position: caption override, then the global style.
    pub fn effective_position(&self, style: &TextStyle) -> CaptionPosition {
        match self.position.as_deref().filter(|p| !p.is_empty()) {
            Some(p) => CaptionPosition::parse(p),
            None => style.position(),
        }
    }

    /// Effective fill color: caption override, then the global style.
    pub fn effective_color<'a>(&'a self, style: &'a TextStyle) -> &'a str {
        self.color
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(style.color.as_str())
    }
}

/// Global caption style defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextStyle {
    #[serde(default = "default_font")]
    pub font: String,
    #[serde(rename = "fontSize", default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_position")]
    pub position: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_font() -> String {
    DEFAULT_FONT.to_string()
}
fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}
fn default_position() -> String {
    CaptionPosition::Bottom.as_str().to_string()
}
fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: default_font(),
            font_size: DEFAULT_FONT_SIZE,
            position: default_position(),
            color: default_color(),
        }
    }
}

impl TextStyle {
    pub fn position(&self) -> CaptionPosition {
        CaptionPosition::parse(&self.position)
    }
}

/// Vertical caption placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CaptionPosition {
    Top,
    Center,
    #[default]
    Bottom,
}

impl CaptionPosition {
    /// Parse a position name. Unknown names land at the bottom.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => CaptionPosition::Top,
            "center" | "centre" | "middle" => CaptionPosition::Center,
            _ => CaptionPosition::Bottom,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionPosition::Top => "top",
            CaptionPosition::Center => "center",
            CaptionPosition::Bottom => "bottom",
        }
    }
}
