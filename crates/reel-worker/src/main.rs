//! Reel render worker binary.
//!
//! Renders the request JSON given as the first argument and prints the final
//! poll result.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::info;

use reel_media::{command::check_ffmpeg, FfmpegBackend};
use reel_models::{JobPoll, RenderRequest};
use reel_storage::LocalStorage;
use reel_worker::logging::{init_tracing, LogFormat};
use reel_worker::{ReelConfig, ReelService, TokioExecutor};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let format = LogFormat::parse(std::env::var("LOG_FORMAT").ok().as_deref());
    init_tracing(format)?;

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        let addr = addr.parse().context("METRICS_ADDR is not a socket address")?;
        reel_worker::metrics::install_exporter(addr)?;
        info!("Serving metrics on {}", addr);
    }

    let request_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => bail!("usage: reelcut-worker <request.json>"),
    };

    info!("Starting reelcut-worker");

    let config = ReelConfig::from_env();
    info!("Reel config: {:?}", config);
    config.ensure_dirs().context("Failed to create working folders")?;

    check_ffmpeg().context("ffmpeg is required to render reels")?;

    let raw = tokio::fs::read(&request_path)
        .await
        .with_context(|| format!("Failed to read {}", request_path))?;
    let request: RenderRequest = serde_json::from_slice(&raw).context("Invalid render request")?;

    let service = ReelService::new(
        config,
        Arc::new(FfmpegBackend::new()),
        Arc::new(LocalStorage::new()),
        Arc::new(TokioExecutor),
    );

    let session = service.submit(request).await?;
    info!(session_id = %session, "Render accepted");

    let result = loop {
        match service.poll(session.as_str()).await {
            JobPoll::Processing => tokio::time::sleep(POLL_INTERVAL).await,
            other => break other,
        }
    };

    println!("{}", serde_json::to_string_pretty(&result)?);

    if let JobPoll::Failed { error } = &result {
        bail!("Render failed: {}", error);
    }
    Ok(())
}
