//! Render job identity, lifecycle state and poll results.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque upload session token. One session renders at most one reel at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the token is usable as a session key (non-empty, no path separators).
    pub fn is_valid(&self) -> bool {
        let s = self.0.trim();
        !s.is_empty() && !s.contains(['/', '\\']) && s != "." && s != ".."
    }

    /// File name of the rendered artifact for this session.
    pub fn artifact_file_name(&self) -> String {
        format!("{}.mp4", self.0)
    }

    /// Download handle reported to pollers once the artifact exists.
    pub fn download_url(&self) -> String {
        format!("/download/{}", self.0)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render job state. Absence of a record is the implicit initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Pipeline is running in the background
    #[default]
    Processing,
    /// Artifact written
    Completed,
    /// Pipeline aborted with an error
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload attached to a job once it reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum JobOutcome {
    Success { download_url: String },
    Failure { error: String },
}

/// In-memory record of a render job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    pub session_id: SessionId,
    pub state: JobState,
    pub outcome: Option<JobOutcome>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a record in the processing state.
    pub fn processing(session_id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            state: JobState::Processing,
            outcome: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Mark job as completed with its download handle.
    pub fn complete(&mut self, download_url: impl Into<String>) {
        self.state = JobState::Completed;
        self.outcome = Some(JobOutcome::Success {
            download_url: download_url.into(),
        });
        self.updated_at = Utc::now();
    }

    /// Mark job as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.state = JobState::Failed;
        self.outcome = Some(JobOutcome::Failure {
            error: error.into(),
        });
        self.updated_at = Utc::now();
    }

    /// Convert a record into what a poller sees.
    pub fn to_poll(&self) -> JobPoll {
        match (&self.state, &self.outcome) {
            (JobState::Processing, _) => JobPoll::Processing,
            (JobState::Completed, Some(JobOutcome::Success { download_url })) => JobPoll::Completed {
                download_url: download_url.clone(),
            },
            (JobState::Completed, _) => JobPoll::Completed {
                download_url: self.session_id.download_url(),
            },
            (JobState::Failed, Some(JobOutcome::Failure { error })) => JobPoll::Failed {
                error: error.clone(),
            },
            (JobState::Failed, _) => JobPoll::Failed {
                error: "Unknown error".to_string(),
            },
        }
    }
}

/// Result of polling a session's render status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobPoll {
    Processing,
    Completed { download_url: String },
    Failed { error: String },
    NotFound,
}

impl JobPoll {
    pub fn status(&self) -> &'static str {
        match self {
            JobPoll::Processing => "processing",
            JobPoll::Completed { .. } => "completed",
            JobPoll::Failed { .. } => "failed",
            JobPoll::NotFound => "not_found",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPoll::Completed { .. } | JobPoll::Failed { .. })
    }
}
