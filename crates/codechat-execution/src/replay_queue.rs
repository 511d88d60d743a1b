//! Background worker owning fire-and-forget shadow replays.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::shadow::Replayer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayJob {
    pub code: String,
    pub conversation_id: String,
}

/// Runs submitted replays one at a time, in submission order.
///
/// Outcomes are only logged; nothing is reported back to the submitter.
pub struct ReplayQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<ReplayJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ReplayQueue {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn(replayer: Arc<dyn Replayer>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(replayer, receiver));

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queues a replay. Returns `false` once the queue has been shut down.
    pub async fn submit(&self, job: ReplayJob) -> bool {
        let sender = self.sender.lock().await;
        let Some(sender) = sender.as_ref() else {
            tracing::warn!(
                "[Replay] Queue is shut down, dropping replay for {}",
                job.conversation_id
            );
            return false;
        };

        tracing::debug!("[Replay] Queued replay for {}", job.conversation_id);
        sender.send(job).is_ok()
    }

    /// Stops accepting jobs and waits for queued replays to drain.
    pub async fn shutdown(&self) {
        self.sender.lock().await.take();

        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::warn!("[Replay] Worker task failed: {}", e);
            }
        }
    }
}

async fn run_worker(replayer: Arc<dyn Replayer>, mut receiver: mpsc::UnboundedReceiver<ReplayJob>) {
    while let Some(job) = receiver.recv().await {
        match replayer.replay(&job.code, &job.conversation_id).await {
            Ok(output) => tracing::info!(
                "[Replay] Replay for {} finished ({} bytes stdout)",
                job.conversation_id,
                output.stdout.len()
            ),
            Err(codechat_core::CodechatError::ReplayFailed { stdout, stderr }) => tracing::warn!(
                "[Replay] Replay for {} failed\nstdout: {}\nstderr: {}",
                job.conversation_id,
                stdout,
                stderr
            ),
            Err(e) => tracing::warn!("[Replay] Replay for {} failed: {}", job.conversation_id, e),
        }
    }
    tracing::debug!("[Replay] Worker stopped");
}
