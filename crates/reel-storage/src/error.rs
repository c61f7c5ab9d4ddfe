//! Storage errors.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// The storage call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    Read,
    List,
    Delete,
    Stat,
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageOp::Read => "read",
            StorageOp::List => "list",
            StorageOp::Delete => "delete",
            StorageOp::Stat => "stat",
        })
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No such file or folder: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Could not {op} {}: {source}", path.display())]
    Access {
        op: StorageOp,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Attach `op` and `path` to an io error, keeping missing paths distinct.
    pub fn from_io(op: StorageOp, path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Access {
                op,
                path: path.to_path_buf(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_path_is_not_found() {
        let err = StorageError::from_io(
            StorageOp::List,
            Path::new("uploads/s1"),
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "No such file or folder: uploads/s1");
    }

    #[test]
    fn test_other_failures_name_the_operation() {
        let err = StorageError::from_io(
            StorageOp::Delete,
            Path::new("out/s1.mp4"),
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(!err.is_not_found());
        assert!(err.to_string().starts_with("Could not delete out/s1.mp4"));
    }
}
