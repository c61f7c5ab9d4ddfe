//! Render job orchestration: validate, launch, poll, download.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tracing::Instrument;

use reel_media::{
    DirectoryFontCatalog, FeatureReport, FontCatalog, FontDescriptor, FontResolverChain, MediaBackend, ReelJob,
    ReelPipeline, SourceInput,
};
use reel_models::{is_allowed_music, is_allowed_video, JobPoll, RenderRequest, SessionId};
use reel_storage::{FileInfo, Storage, StorageError};

use crate::config::ReelConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::executor::TaskExecutor;
use crate::logging::JobLogger;
use crate::metrics;
use crate::registry::JobRegistry;

/// A rendered reel ready to be sent as an attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub struct ReelService {
    config: ReelConfig,
    registry: Arc<JobRegistry>,
    pipeline: Arc<ReelPipeline>,
    storage: Arc<dyn Storage>,
    executor: Arc<dyn TaskExecutor>,
}

impl ReelService {
    pub fn new(
        config: ReelConfig,
        backend: Arc<dyn MediaBackend>,
        storage: Arc<dyn Storage>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        let fonts = FontResolverChain::standard(&config.font_dir);
        let pipeline = ReelPipeline::new(backend, fonts, config.pipeline_settings());
        Self {
            config,
            registry: Arc::new(JobRegistry::new()),
            pipeline: Arc::new(pipeline),
            storage,
            executor,
        }
    }

    pub fn config(&self) -> &ReelConfig {
        &self.config
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Validate `request` and launch its render.
    ///
    /// Input problems are returned here and no job is created. Once this
    /// returns `Ok`, the outcome is only observable through [`poll`](Self::poll).
    pub async fn submit(&self, request: RenderRequest) -> WorkerResult<SessionId> {
        let (session, job) = self.prepare(&request).await.inspect_err(|e| {
            metrics::record_job_rejected(e.reject_reason());
        })?;

        if !self.registry.start(&session) {
            metrics::record_job_rejected("busy");
            return Err(WorkerError::Busy(session));
        }
        metrics::record_job_submitted(job.sources.len());
        metrics::set_active_jobs(self.registry.active_count());

        let logger = JobLogger::new(&session);
        logger.accepted(job.sources.len());
        let span = logger.span();
        let task = render_task(
            Arc::clone(&self.pipeline),
            Arc::clone(&self.registry),
            session.clone(),
            job,
            logger,
        );
        self.executor.execute(task.instrument(span).boxed()).await;

        Ok(session)
    }

    async fn prepare(&self, request: &RenderRequest) -> WorkerResult<(SessionId, ReelJob)> {
        let session = SessionId::from_string(request.session_id.trim());
        if !session.is_valid() {
            return Err(WorkerError::invalid_input("Missing or invalid session_id"));
        }

        let upload_dir = self.config.session_upload_dir(session.as_str());
        let files = match self.storage.list(&upload_dir).await {
            Ok(files) => files,
            Err(StorageError::NotFound(_)) => return Err(WorkerError::not_found("Session folder not found")),
            Err(e) => return Err(e.into()),
        };
        let videos: Vec<FileInfo> = files.into_iter().filter(|f| is_allowed_video(&f.name)).collect();
        if videos.is_empty() {
            return Err(WorkerError::invalid_input("No valid video files found"));
        }

        let music = match request.requested_music() {
            Some(requested) => {
                if !is_allowed_music(requested) {
                    return Err(WorkerError::invalid_input(format!(
                        "Unsupported music file: {}",
                        requested
                    )));
                }
                let path = self.config.resolve_music_path(requested);
                if !self.storage.exists(&path).await? {
                    return Err(WorkerError::not_found("Music file not found"));
                }
                Some(path)
            }
            None => None,
        };

        let job = ReelJob {
            sources: order_sources(request, &videos, &upload_dir),
            captions: request.captions.clone(),
            style: request.style(),
            mute: request.mute_videos,
            music,
            music_fade: request.music_fade,
            auto_moments: request.auto_moments,
            output: self.config.artifact_path(&session.artifact_file_name()),
        };
        Ok((session, job))
    }

    /// Report a session's render status.
    ///
    /// Terminal results are handed out once. Without a record, an artifact on
    /// disk still counts as completed.
    pub async fn poll(&self, session_id: &str) -> JobPoll {
        let session = SessionId::from_string(session_id.trim());
        if !session.is_valid() {
            return JobPoll::NotFound;
        }
        if let Some(poll) = self.registry.poll(&session) {
            metrics::set_active_jobs(self.registry.active_count());
            return poll;
        }

        let artifact = self.config.artifact_path(&session.artifact_file_name());
        match self.storage.exists(&artifact).await {
            Ok(true) => JobPoll::Completed {
                download_url: session.download_url(),
            },
            _ => JobPoll::NotFound,
        }
    }

    /// Read a session's rendered reel.
    pub async fn download(&self, session_id: &str) -> WorkerResult<Download> {
        let session = SessionId::from_string(session_id.trim());
        if !session.is_valid() {
            return Err(WorkerError::invalid_input("Missing or invalid session_id"));
        }
        let artifact = self.config.artifact_path(&session.artifact_file_name());
        let bytes = self.storage.read(&artifact).await.map_err(|e| match e {
            StorageError::NotFound(_) => WorkerError::not_found("Video not found"),
            other => other.into(),
        })?;
        Ok(Download {
            file_name: self.config.download_name.clone(),
            bytes,
        })
    }

    /// Fonts available for captions, sorted by display name.
    pub fn list_fonts(&self) -> Vec<FontDescriptor> {
        DirectoryFontCatalog::new(&self.config.font_dir).list_fonts()
    }
}

/// Put uploads in timeline order.
///
/// Settings are applied in `order`, each picking the upload with its file name.
/// When no setting names an upload, every upload is used in name order.
pub fn order_sources(request: &RenderRequest, videos: &[FileInfo], upload_dir: &Path) -> Vec<SourceInput> {
    let ordered: Vec<SourceInput> = request
        .ordered_settings()
        .into_iter()
        .filter_map(|setting| {
            let file = videos.iter().find(|f| f.name == setting.filename)?;
            let input = SourceInput::new(upload_dir.join(&file.name));
            if setting.trim_start.is_some() || setting.trim_end.is_some() {
                Some(input.with_trim(setting.trim_start, setting.trim_end))
            } else {
                Some(input)
            }
        })
        .collect();
    if !ordered.is_empty() {
        return ordered;
    }

    let mut names: Vec<&str> = videos.iter().map(|f| f.name.as_str()).collect();
    names.sort_unstable();
    names
        .into_iter()
        .map(|name| SourceInput::new(upload_dir.join(name)))
        .collect()
}

async fn render_task(
    pipeline: Arc<ReelPipeline>,
    registry: Arc<JobRegistry>,
    session: SessionId,
    job: ReelJob,
    logger: JobLogger,
) {
    let result = AssertUnwindSafe(pipeline.run(&job)).catch_unwind().await;

    match result {
        Ok(Ok(outcome)) => {
            report_features(&logger, &outcome.features);
            for skipped in &outcome.skipped {
                logger.skipped(skipped.path.display(), &skipped.reason);
            }
            registry.complete(&session, session.download_url());
            metrics::record_job_completed(logger.elapsed_secs());
            logger.finished(format_args!(
                "{} segments, {:.2}s at {}",
                outcome.segment_count,
                outcome.duration,
                outcome.path.display()
            ));
        }
        Ok(Err(e)) => {
            logger.failed(&e);
            metrics::record_job_failed(e.stage().as_str());
            registry.fail(&session, e.to_string());
        }
        Err(_) => {
            logger.failed("render task panicked");
            metrics::record_job_failed("panic");
            registry.fail(&session, "Internal error while rendering the reel");
        }
    }
    metrics::set_active_jobs(registry.active_count());
}

fn report_features(logger: &JobLogger, features: &FeatureReport) {
    for (name, outcome) in [
        ("captions", &features.captions),
        ("music", &features.music),
        ("fade", &features.fade),
        ("volume", &features.volume),
    ] {
        if outcome.is_skipped() {
            metrics::record_feature_skipped(name);
            logger.skipped(name, format_args!("{:?}", outcome));
        }
    }
}
