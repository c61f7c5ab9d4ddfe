//! Shared data models for the reel assembly service.
//!
//! This crate provides Serde-serializable types for:
//! - Render requests (clip settings, captions, text style, music)
//! - Job lifecycle state and poll results
//! - Trim, caption and moment time windows
//! - Encoding configuration

pub mod encoding;
pub mod job;
pub mod request;
pub mod timing;
pub mod utils;

// Re-export common types
pub use encoding::EncodingConfig;
pub use job::{JobOutcome, JobPoll, JobRecord, JobState, SessionId};
pub use request::{Caption, CaptionPosition, ClipSettings, MusicSource, RenderRequest, TextStyle};
pub use timing::{CaptionWindow, Moment, TrimWindow, MIN_CAPTION_SPAN, MIN_TRIM_SPAN};
pub use utils::{is_allowed_music, is_allowed_video};
