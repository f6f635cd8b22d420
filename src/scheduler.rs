// Background Flush Scheduler
//
// Periodically runs a flush job (the fast-store save) on its own task.
// The wait between flushes is interruptible, so stopping is bounded by the
// stop timeout rather than the flush interval.

use crate::error::{BrainError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Flush task did not stop within {0:?}")]
    StopTimedOut(Duration),

    #[error("Flush task failed: {0}")]
    TaskFailed(String),
}

impl From<SchedulerError> for BrainError {
    fn from(err: SchedulerError) -> Self {
        BrainError::Scheduler(err.to_string())
    }
}

/// Work performed on every tick
#[async_trait]
pub trait FlushJob: Send + Sync {
    /// Job name (for logging)
    fn name(&self) -> &str;

    /// Persist whatever the job owns
    async fn flush(&self) -> Result<()>;
}

struct RunningTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Single periodic flush task with idempotent start and bounded stop
pub struct FlushScheduler {
    interval: Duration,
    stop_timeout: Duration,
    running: Arc<AtomicBool>,
    flushes: Arc<AtomicU64>,
    task: Mutex<Option<RunningTask>>,
}

impl FlushScheduler {
    pub fn new(interval: Duration, stop_timeout: Duration) -> Self {
        Self {
            interval,
            stop_timeout,
            running: Arc::new(AtomicBool::new(false)),
            flushes: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of completed flush attempts since creation
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Spawn the flush loop. Returns false if it was already running.
    pub async fn start(&self, job: Arc<dyn FlushJob>) -> bool {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let running = Arc::clone(&self.running);
        let flushes = Arc::clone(&self.flushes);
        let interval = self.interval;

        running.store(true, Ordering::SeqCst);
        tracing::info!(
            "Starting flush scheduler for {} (interval: {:?})",
            job.name(),
            interval
        );

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = sleep(interval) => {}
                }

                if token.is_cancelled() || !running.load(Ordering::SeqCst) {
                    break;
                }

                match job.flush().await {
                    Ok(()) => tracing::debug!("Flush job {} completed", job.name()),
                    Err(e) => tracing::warn!("Flush job {} failed: {}", job.name(), e),
                }
                flushes.fetch_add(1, Ordering::SeqCst);
            }
            tracing::info!("Flush scheduler for {} stopped", job.name());
        });

        *task = Some(RunningTask { cancel, handle });
        true
    }

    /// Signal the loop to exit and wait for it, at most `stop_timeout`.
    ///
    /// When this returns `Ok`, no further flush will run.
    pub async fn stop(&self) -> std::result::Result<(), SchedulerError> {
        let Some(RunningTask { cancel, mut handle }) = self.task.lock().await.take() else {
            return Ok(());
        };

        self.running.store(false, Ordering::SeqCst);
        cancel.cancel();

        match timeout(self.stop_timeout, &mut handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SchedulerError::TaskFailed(e.to_string())),
            Err(_) => {
                handle.abort();
                tracing::error!(
                    "Flush task did not stop within {:?}, aborted",
                    self.stop_timeout
                );
                Err(SchedulerError::StopTimedOut(self.stop_timeout))
            }
        }
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.cancel.cancel();
        }
    }
}
