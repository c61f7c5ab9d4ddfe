//! Submission and download errors.

use reel_models::SessionId;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("A reel is already rendering for session {0}")]
    Busy(SessionId),

    #[error(transparent)]
    Storage(#[from] reel_storage::StorageError),
}

impl WorkerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// The caller's fault: bad request, missing input, or a render already running.
    pub fn is_input_error(&self) -> bool {
        !matches!(self, WorkerError::Storage(_))
    }

    /// Label for the rejected-submission counter.
    pub fn reject_reason(&self) -> &'static str {
        match self {
            WorkerError::InvalidInput(_) | WorkerError::NotFound(_) => "input",
            WorkerError::Busy(_) => "busy",
            WorkerError::Storage(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_storage::StorageError;

    #[test]
    fn test_rejections_are_classified() {
        let busy = WorkerError::Busy(SessionId::from_string("s1"));
        assert!(busy.is_input_error());
        assert_eq!(busy.reject_reason(), "busy");
        assert_eq!(busy.to_string(), "A reel is already rendering for session s1");

        assert!(WorkerError::not_found("Session folder not found").is_input_error());
        assert_eq!(WorkerError::invalid_input("no videos").reject_reason(), "input");

        let io = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let storage = WorkerError::from(StorageError::from(io));
        assert!(!storage.is_input_error());
        assert_eq!(storage.reject_reason(), "internal");
    }
}
