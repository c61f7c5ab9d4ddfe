//! Ownership of decoded media handles for one render.
//!
//! Every handle opened during a render is adopted by a [`ResourceScope`].
//! Handles can be released early (a skipped clip) or all at once when the
//! render ends; either way each one is closed exactly once. Dropping the scope
//! closes whatever is still open.

use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::source::{AudioSource, VideoSource};

/// Index of a video adopted by a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VideoHandle(usize);

/// Index of an audio track adopted by a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioHandle(usize);

#[derive(Default)]
pub struct ResourceScope {
    videos: Vec<Option<Box<dyn VideoSource>>>,
    audios: Vec<Option<Box<dyn AudioSource>>>,
}

impl ResourceScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adopt_video(&mut self, source: Box<dyn VideoSource>) -> VideoHandle {
        self.videos.push(Some(source));
        VideoHandle(self.videos.len() - 1)
    }

    pub fn adopt_audio(&mut self, source: Box<dyn AudioSource>) -> AudioHandle {
        self.audios.push(Some(source));
        AudioHandle(self.audios.len() - 1)
    }

    pub fn video(&self, handle: VideoHandle) -> MediaResult<&dyn VideoSource> {
        self.videos
            .get(handle.0)
            .and_then(|slot| slot.as_deref())
            .ok_or_else(|| MediaError::HandleClosed(format!("video #{}", handle.0)))
    }

    pub fn audio(&self, handle: AudioHandle) -> MediaResult<&dyn AudioSource> {
        self.audios
            .get(handle.0)
            .and_then(|slot| slot.as_deref())
            .ok_or_else(|| MediaError::HandleClosed(format!("audio #{}", handle.0)))
    }

    /// Close one video now. Closing an already released handle is a no-op.
    pub fn release_video(&mut self, handle: VideoHandle) {
        if let Some(mut source) = self.videos.get_mut(handle.0).and_then(Option::take) {
            let path = source.info().path.display().to_string();
            if let Err(e) = source.close() {
                warn!(path = %path, "Failed to close video: {}", e);
            }
        }
    }

    /// Number of handles still open.
    pub fn open_count(&self) -> usize {
        self.videos.iter().filter(|s| s.is_some()).count()
            + self.audios.iter().filter(|s| s.is_some()).count()
    }

    /// Close every handle still open, ignoring individual close errors.
    /// Returns how many handles were closed.
    pub fn close_all(&mut self) -> usize {
        let mut closed = 0;

        for slot in self.videos.iter_mut() {
            if let Some(mut source) = slot.take() {
                if let Err(e) = source.close() {
                    warn!(path = %source.info().path.display(), "Failed to close video: {}", e);
                }
                closed += 1;
            }
        }

        for slot in self.audios.iter_mut() {
            if let Some(mut source) = slot.take() {
                if let Err(e) = source.close() {
                    warn!(path = %source.path().display(), "Failed to close audio: {}", e);
                }
                closed += 1;
            }
        }

        if closed > 0 {
            debug!("Closed {} media handles", closed);
        }
        closed
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Frame, SourceInfo};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingVideo {
        info: SourceInfo,
        closes: Arc<AtomicUsize>,
        fail_close: bool,
    }

    #[async_trait]
    impl VideoSource for CountingVideo {
        fn info(&self) -> &SourceInfo {
            &self.info
        }

        async fn frame_at(&self, _t: f64) -> MediaResult<Frame> {
            Err(MediaError::frame_decode("not needed"))
        }

        fn close(&mut self) -> MediaResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(MediaError::internal("close failed"));
            }
            Ok(())
        }
    }

    struct CountingAudio {
        path: PathBuf,
        closes: Arc<AtomicUsize>,
    }

    impl AudioSource for CountingAudio {
        fn path(&self) -> &Path {
            &self.path
        }

        fn duration(&self) -> f64 {
            3.0
        }

        fn close(&mut self) -> MediaResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn video(closes: &Arc<AtomicUsize>, fail_close: bool) -> Box<dyn VideoSource> {
        Box::new(CountingVideo {
            info: SourceInfo {
                path: PathBuf::from("a.mp4"),
                duration: 5.0,
                width: 1920,
                height: 1080,
                has_audio: true,
            },
            closes: closes.clone(),
            fail_close,
        })
    }

    #[test]
    fn test_each_handle_closed_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut scope = ResourceScope::new();
        let first = scope.adopt_video(video(&closes, false));
        scope.adopt_video(video(&closes, true));
        scope.adopt_audio(Box::new(CountingAudio {
            path: PathBuf::from("m.mp3"),
            closes: closes.clone(),
        }));

        scope.release_video(first);
        scope.release_video(first);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(scope.video(first).is_err());

        assert_eq!(scope.close_all(), 2);
        assert_eq!(scope.close_all(), 0);
        drop(scope);
        assert_eq!(closes.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_drop_closes_open_handles() {
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let mut scope = ResourceScope::new();
            scope.adopt_video(video(&closes, false));
            scope.adopt_video(video(&closes, false));
            assert_eq!(scope.open_count(), 2);
        }
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }
}
