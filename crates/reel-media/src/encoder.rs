//! Writes the finished reel to its artifact path.
//!
//! The encode goes to a sibling `.partial` file that is moved into place only
//! after the backend succeeds, so an artifact on disk is always complete.

use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{move_file, partial_path, remove_if_exists};
use crate::plan::RenderPlan;
use crate::source::MediaBackend;

const ENCODE_DURATION_METRIC: &str = "reel_encode_duration_seconds";

pub struct Encoder<'a> {
    backend: &'a dyn MediaBackend,
}

impl<'a> Encoder<'a> {
    pub fn new(backend: &'a dyn MediaBackend) -> Self {
        Self { backend }
    }

    /// Render `plan` and publish it at `artifact`.
    pub async fn write(&self, plan: &RenderPlan, artifact: &Path) -> MediaResult<()> {
        let partial = partial_path(artifact);
        let started = Instant::now();
        info!(artifact = %artifact.display(), "Writing final video");

        if let Err(e) = self.backend.render(plan, &partial).await {
            error!(artifact = %artifact.display(), "Encode failed: {}", e);
            discard(&partial).await;
            return Err(match e {
                MediaError::FfmpegNotFound | MediaError::EncodeFailed(_) => e,
                other => MediaError::encode_failed(other.to_string()),
            });
        }

        if let Err(e) = move_file(&partial, artifact).await {
            discard(&partial).await;
            return Err(MediaError::encode_failed(format!(
                "could not publish {}: {}",
                artifact.display(),
                e
            )));
        }

        let elapsed = started.elapsed().as_secs_f64();
        metrics::histogram!(ENCODE_DURATION_METRIC).record(elapsed);
        info!(artifact = %artifact.display(), "Video saved in {:.2}s", elapsed);
        Ok(())
    }
}

async fn discard(partial: &Path) {
    if let Err(e) = remove_if_exists(partial).await {
        warn!(path = %partial.display(), "Could not remove partial output: {}", e);
    }
}
