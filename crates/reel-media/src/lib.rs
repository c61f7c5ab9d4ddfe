#![deny(unreachable_patterns)]
//! Reel assembly on top of the FFmpeg CLI.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and progress parsing
//! - Motion-based moment selection over decoded frames
//! - Per-clip vertical transform, concatenation and caption overlays
//! - Background music looping and mixing
//! - Atomic publication of the encoded reel

pub mod audio;
pub mod command;
pub mod compositor;
pub mod encoder;
pub mod error;
pub mod ffmpeg_backend;
pub mod filters;
pub mod fonts;
pub mod fs_utils;
pub mod motion;
pub mod pipeline;
pub mod plan;
pub mod probe;
pub mod progress;
pub mod scope;
pub mod source;
pub mod transform;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use audio::{AudioMixer, MixOptions, MusicMix, DEFAULT_MUSIC_VOLUME};
pub use command::{FfmpegCommand, FfmpegInput, FfmpegRunner};
pub use compositor::{concatenate, CaptionLayer, Compositor, Timeline};
pub use encoder::Encoder;
pub use error::{MediaError, MediaResult, Stage};
pub use ffmpeg_backend::FfmpegBackend;
pub use fonts::{
    CatalogFontResolver, DirectoryFontCatalog, FontCatalog, FontDescriptor, FontResolver, FontResolverChain,
    PlatformFontTable,
};
pub use motion::MotionAnalyzer;
pub use pipeline::{PipelineSettings, ReelJob, ReelPipeline, RenderOutcome};
pub use plan::{AudioBinding, CaptionOverlay, ClipSegment, FeatureOutcome, FeatureReport, Geometry, MusicBed, RenderPlan};
pub use probe::{probe_audio, probe_video, AudioInfo, VideoInfo};
pub use progress::{EncodeProgress, ProgressSteps};
pub use scope::ResourceScope;
pub use source::{AudioSource, Frame, MediaBackend, SourceInfo, VideoSource};
pub use transform::{SkippedClip, SourceInput, TransformOptions, TransformStage};
