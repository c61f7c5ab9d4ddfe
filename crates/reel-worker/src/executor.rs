//! Where accepted render jobs run.

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::error;

/// Runs a render job.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Hand off `task`. Implementations decide whether this waits for it.
    async fn execute(&self, task: BoxFuture<'static, ()>);
}

/// One tokio task per job; `execute` returns as soon as the task is spawned.
#[derive(Debug, Default, Clone)]
pub struct TokioExecutor;

#[async_trait]
impl TaskExecutor for TokioExecutor {
    async fn execute(&self, task: BoxFuture<'static, ()>) {
        let handle = tokio::spawn(task);
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                error!("Render task aborted: {}", e);
            }
        });
    }
}

/// Runs the job to completion before `execute` returns.
#[derive(Debug, Default, Clone)]
pub struct InlineExecutor;

#[async_trait]
impl TaskExecutor for InlineExecutor {
    async fn execute(&self, task: BoxFuture<'static, ()>) {
        task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_inline_executor_finishes_task() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        InlineExecutor
            .execute(async move { flag.store(true, Ordering::SeqCst) }.boxed())
            .await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_tokio_executor_does_not_wait() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        TokioExecutor
            .execute(
                async move {
                    let _ = rx.await;
                    let _ = done_tx.send(());
                }
                .boxed(),
            )
            .await;

        tx.send(()).unwrap();
        done_rx.await.unwrap();
    }
}
