//! Putting rendered files in place.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::MediaResult;

/// `EXDEV` on Linux and macOS.
const CROSS_DEVICE: i32 = 18;

/// `reel.mp4` is encoded as `reel.partial.mp4` next to it.
pub fn partial_path(artifact: &Path) -> PathBuf {
    let stem = artifact.file_stem().map_or_else(|| "output".into(), |s| s.to_string_lossy());
    let ext = artifact.extension().map_or_else(|| "mp4".into(), |e| e.to_string_lossy());
    artifact.with_file_name(format!("{stem}.partial.{ext}"))
}

/// Move `from` onto `to`, replacing any previous file there.
///
/// When the two sit on different filesystems the file is copied beside `to`
/// first, so `to` only ever appears complete.
pub async fn move_file(from: impl AsRef<Path>, to: impl AsRef<Path>) -> MediaResult<()> {
    let (from, to) = (from.as_ref(), to.as_ref());
    if let Some(dir) = to.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).await?;
    }

    match fs::rename(from, to).await {
        Err(e) if e.raw_os_error() == Some(CROSS_DEVICE) => {
            debug!(from = %from.display(), to = %to.display(), "Rename crosses devices, copying");
            copy_across(from, to).await
        }
        renamed => Ok(renamed?),
    }
}

async fn copy_across(from: &Path, to: &Path) -> MediaResult<()> {
    let staged = to.with_extension("copying");
    fs::copy(from, &staged).await?;
    if let Err(e) = fs::rename(&staged, to).await {
        let _ = fs::remove_file(&staged).await;
        return Err(e.into());
    }
    if let Err(e) = fs::remove_file(from).await {
        warn!(path = %from.display(), "Left source behind after copy: {}", e);
    }
    Ok(())
}

/// Delete `path`; a file that is already gone is fine.
pub async fn remove_if_exists(path: impl AsRef<Path>) -> MediaResult<()> {
    match fs::remove_file(path.as_ref()).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_sits_next_to_artifact() {
        assert_eq!(
            partial_path(Path::new("outputs/abc.mp4")),
            PathBuf::from("outputs/abc.partial.mp4")
        );
        assert_eq!(partial_path(Path::new("outputs/abc")), PathBuf::from("outputs/abc.partial.mp4"));
    }

    #[tokio::test]
    async fn test_previous_artifact_is_replaced() {
        let dir = TempDir::new().unwrap();
        let partial = dir.path().join("abc.partial.mp4");
        let artifact = dir.path().join("abc.mp4");
        fs::write(&partial, b"new").await.unwrap();
        fs::write(&artifact, b"old").await.unwrap();

        move_file(&partial, &artifact).await.unwrap();

        assert!(!partial.exists());
        assert_eq!(fs::read(&artifact).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_missing_output_folder_is_created() {
        let dir = TempDir::new().unwrap();
        let partial = dir.path().join("a.mp4");
        let artifact = dir.path().join("outputs").join("a.mp4");
        fs::write(&partial, b"x").await.unwrap();

        move_file(&partial, &artifact).await.unwrap();
        assert!(artifact.exists());
    }

    #[tokio::test]
    async fn test_removing_twice_is_fine() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.mp4");
        remove_if_exists(&path).await.unwrap();

        fs::write(&path, b"x").await.unwrap();
        remove_if_exists(&path).await.unwrap();
        remove_if_exists(&path).await.unwrap();
        assert!(!path.exists());
    }
}
