//! Prometheus metrics for render jobs.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "reel_jobs_submitted_total";
    pub const JOBS_REJECTED_TOTAL: &str = "reel_jobs_rejected_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "reel_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "reel_jobs_failed_total";
    pub const JOBS_ACTIVE: &str = "reel_jobs_active";
    pub const RENDER_DURATION_SECONDS: &str = "reel_render_duration_seconds";
    pub const FEATURES_SKIPPED_TOTAL: &str = "reel_features_skipped_total";
}

/// Serve `/metrics` on `addr`.
pub fn install_exporter(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    Ok(())
}

pub fn record_job_submitted(clip_count: usize) {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
    histogram!("reel_job_clip_count").record(clip_count as f64);
}

pub fn record_job_rejected(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::JOBS_REJECTED_TOTAL, &labels).increment(1);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::RENDER_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_failed(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_feature_skipped(feature: &str) {
    let labels = [("feature", feature.to_string())];
    counter!(names::FEATURES_SKIPPED_TOTAL, &labels).increment(1);
}

pub fn set_active_jobs(count: usize) {
    gauge!(names::JOBS_ACTIVE).set(count as f64);
}
