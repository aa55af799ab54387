//! Background analysis runs.
//!
//! A job runs `Engine::get_or_compute` on its own thread and reports back
//! through a channel. The caller polls; nothing is pushed into its loop.

use super::cache::CacheKey;
use super::engine::Engine;
use crate::error::{AuditError, Result};
use crate::models::AnalysisResult;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

/// Progress notifications from a running job.
#[derive(Debug, Clone)]
pub enum JobStatus {
    /// The worker thread picked the job up.
    Started { key: CacheKey },
    /// The analysis completed.
    Finished(Arc<AnalysisResult>),
    /// Loading or analysis failed.
    Failed(String),
}

/// Handle to an analysis running on a background thread.
pub struct AnalysisJob {
    rx: Receiver<JobStatus>,
    done: bool,
}

impl AnalysisJob {
    /// Starts an analysis for `key`.
    ///
    /// With `refresh`, the cached result and raw table for the key are
    /// dropped first so the source is re-read.
    pub fn spawn(engine: Arc<Engine>, key: CacheKey, refresh: bool) -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        thread::Builder::new()
            .name("cellaudit-job".to_string())
            .spawn(move || {
                // Send failures mean the caller dropped the handle; nothing to do
                let _ = tx.send(JobStatus::Started { key: key.clone() });

                if refresh {
                    engine.invalidate(&key);
                }

                let status = match engine.get_or_compute(&key) {
                    Ok(result) => JobStatus::Finished(result),
                    Err(e) => {
                        error!("Analysis of {} failed: {}", key, e);
                        JobStatus::Failed(e.to_string())
                    }
                };
                let _ = tx.send(status);
            })
            .map_err(|e| AuditError::Analysis(format!("could not start worker thread: {}", e)))?;

        Ok(Self { rx, done: false })
    }

    /// Returns the next status without blocking.
    ///
    /// A worker that exits without reporting is surfaced once as `Failed`.
    pub fn poll(&mut self) -> Option<JobStatus> {
        if self.done {
            return None;
        }
        match self.rx.try_recv() {
            Ok(status) => {
                if matches!(status, JobStatus::Finished(_) | JobStatus::Failed(_)) {
                    self.done = true;
                }
                Some(status)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.done = true;
                Some(JobStatus::Failed("analysis worker exited unexpectedly".to_string()))
            }
        }
    }

    /// Polls every `interval` until the job ends, calling `on_tick` after each poll.
    pub async fn wait(
        mut self,
        interval: Duration,
        mut on_tick: impl FnMut(Option<&JobStatus>),
    ) -> Result<Arc<AnalysisResult>> {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let status = self.poll();
            on_tick(status.as_ref());

            match status {
                Some(JobStatus::Finished(result)) => return Ok(result),
                Some(JobStatus::Failed(msg)) => return Err(AuditError::Analysis(msg)),
                Some(JobStatus::Started { key }) => debug!("Job started for {}", key),
                None => {}
            }
        }
    }
}
