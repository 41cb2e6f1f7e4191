//! # Sync Driver
//!
//! Calls `process_next_batch` on an interval until the run is over.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SyncDriver::run(run_id)                                                │
//! │                                                                         │
//! │   loop {                                                                │
//! │     select! {                                                           │
//! │       interval.tick()  ──► process_next_batch(run_id)                  │
//! │                              done / terminal ──► stop                  │
//! │                              Err            ──► stop, return Err       │
//! │       shutdown_rx      ──► stop (the run stays running; a later        │
//! │                            driver resumes from the stored cursor)       │
//! │     }                                                                   │
//! │   }                                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use verial_core::RunStatus;

use crate::error::{SyncError, SyncResult};
use crate::orchestrator::SyncOrchestrator;

/// Drives one run to completion in the background.
pub struct SyncDriver {
    orchestrator: Arc<SyncOrchestrator>,
    poll_interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping a [`SyncDriver`].
#[derive(Clone)]
pub struct SyncDriverHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SyncDriverHandle {
    /// Stops the driver after the batch in progress, if any.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Shutdown channel closed".into()))
    }
}

impl SyncDriver {
    /// Creates a driver ticking at the configured poll interval.
    pub fn new(orchestrator: Arc<SyncOrchestrator>) -> (Self, SyncDriverHandle) {
        let poll_interval = orchestrator.config().poll_interval();
        Self::with_interval(orchestrator, poll_interval)
    }

    pub fn with_interval(
        orchestrator: Arc<SyncOrchestrator>,
        poll_interval: Duration,
    ) -> (Self, SyncDriverHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let driver = SyncDriver {
            orchestrator,
            poll_interval,
            shutdown_rx,
        };

        (driver, SyncDriverHandle { shutdown_tx })
    }

    /// Runs batches until the run ends, an error occurs or shutdown is
    /// requested. Returns the last status seen.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self, run_id: String) -> SyncResult<RunStatus> {
        info!(run_id = %run_id, "Sync driver starting");

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut status = RunStatus::Running;
        let mut batches = 0u64;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.orchestrator.process_next_batch(&run_id).await {
                        Ok(outcome) => {
                            batches += 1;
                            status = outcome.status;
                            debug!(run_id = %run_id, batches, status = %status, "Batch done");
                            if outcome.done || status.is_terminal() {
                                break;
                            }
                        }
                        Err(e) => {
                            error!(run_id = %run_id, error = %e, "Sync driver stopping on error");
                            return Err(e);
                        }
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!(run_id = %run_id, "Sync driver shutting down");
                    break;
                }
            }
        }

        info!(run_id = %run_id, batches, status = %status, "Sync driver stopped");
        Ok(status)
    }
}
