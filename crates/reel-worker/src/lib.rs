//! Reel render service.
//!
//! This crate provides:
//! - Submission validation and clip ordering
//! - Background render jobs with exactly-once result consumption
//! - Polling with an artifact-on-disk fallback
//! - Download of finished reels

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod service;

pub use config::ReelConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{InlineExecutor, TaskExecutor, TokioExecutor};
pub use logging::JobLogger;
pub use registry::JobRegistry;
pub use service::{order_sources, Download, ReelService};
