//! Tracing setup and the per-render logger.

use std::fmt::Display;
use std::time::Instant;

use reel_models::SessionId;
use tracing::{error, info, info_span, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Used when `RUST_LOG` is unset or empty.
const DEFAULT_DIRECTIVES: &[&str] = &["reelcut=info", "reel_media=info", "reel_worker=info"];

/// How log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Colored, human readable.
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// `json` (any case) selects [`LogFormat::Json`].
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// `RUST_LOG` as given, or the default directives when it is blank.
fn filter_directives(rust_log: Option<&str>) -> String {
    match rust_log.map(str::trim) {
        Some(directives) if !directives.is_empty() => directives.to_string(),
        _ => DEFAULT_DIRECTIVES.join(","),
    }
}

/// Install the global subscriber.
pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = EnvFilter::try_new(filter_directives(rust_log.as_deref()))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
        LogFormat::Pretty => registry
            .with(fmt::layer().with_ansi(true).with_target(true).with_file(false))
            .try_init()?,
    }
    Ok(())
}

/// Logs one render job's lifecycle under a `render` span.
#[derive(Debug, Clone)]
pub struct JobLogger {
    session_id: SessionId,
    started: Instant,
    span: Span,
}

impl JobLogger {
    pub fn new(session_id: &SessionId) -> Self {
        Self {
            session_id: session_id.clone(),
            started: Instant::now(),
            span: info_span!("render", session_id = %session_id),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// The job's span, for instrumenting its task.
    pub fn span(&self) -> Span {
        self.span.clone()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn accepted(&self, clips: usize) {
        info!(session_id = %self.session_id, clips, "Render accepted");
    }

    /// Something left out of the reel without failing it.
    pub fn skipped(&self, what: impl Display, reason: impl Display) {
        warn!(session_id = %self.session_id, "Skipped {}: {}", what, reason);
    }

    pub fn finished(&self, summary: impl Display) {
        info!(
            session_id = %self.session_id,
            elapsed_secs = self.elapsed_secs(),
            "Reel ready: {}",
            summary
        );
    }

    pub fn failed(&self, reason: impl Display) {
        error!(
            session_id = %self.session_id,
            elapsed_secs = self.elapsed_secs(),
            "Reel failed: {}",
            reason
        );
    }
}
