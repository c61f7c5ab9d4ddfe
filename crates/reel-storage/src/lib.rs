//! File storage behind the reel service.
//!
//! This crate provides:
//! - The [`Storage`] contract the service reads uploads and artifacts through
//! - A local filesystem implementation

pub mod error;
pub mod local;

pub use error::{StorageError, StorageOp, StorageResult};
pub use local::{FileInfo, LocalStorage, Storage};
