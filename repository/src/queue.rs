//! Per-repository FIFO of pending writes.
//!
//! One worker task drains the queue: at most one write is in flight, writes
//! run in submission order, and every write that ran is followed by the
//! configured delay before its outcome is released and the next one starts.
//! A submitter that stops waiting (dropped future, elapsed start timeout) has
//! its write skipped if it has not started yet; the queue keeps moving either
//! way. Once a write has started it is always awaited to completion.

use futures::future::BoxFuture;
use futures::FutureExt;
use shared_types::WriteOutcome;
use std::panic::AssertUnwindSafe;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

pub type WriteJob = BoxFuture<'static, WriteOutcome>;

struct QueuedWrite {
    label: String,
    job: WriteJob,
    started: oneshot::Sender<()>,
    reply: oneshot::Sender<WriteOutcome>,
}

pub struct WriteQueue {
    delay: Duration,
    sender: OnceLock<mpsc::UnboundedSender<QueuedWrite>>,
}

impl WriteQueue {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            sender: OnceLock::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    // The worker is spawned on first use so queues can be built outside a runtime.
    fn sender(&self) -> &mpsc::UnboundedSender<QueuedWrite> {
        self.sender.get_or_init(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(drain(rx, self.delay));
            tx
        })
    }

    /// Queues `job` and waits for its outcome, including the post-write delay.
    pub async fn submit(&self, label: impl Into<String>, job: WriteJob) -> WriteOutcome {
        self.submit_within(label, job, None).await
    }

    /// Like [`submit`](Self::submit), but gives up with
    /// [`WriteOutcome::TimedOut`] if the worker has not picked the job up
    /// within `start_timeout`. The limit covers waiting in line only: a job
    /// that started is awaited to completion, delay included.
    pub async fn submit_within(
        &self,
        label: impl Into<String>,
        job: WriteJob,
        start_timeout: Option<Duration>,
    ) -> WriteOutcome {
        let label = label.into();
        let (started_tx, mut started) = oneshot::channel();
        let (reply, outcome) = oneshot::channel();

        let queued = QueuedWrite {
            label: label.clone(),
            job,
            started: started_tx,
            reply,
        };
        if self.sender().send(queued).is_err() {
            return WriteOutcome::failed(format!("write queue closed before {label} could run"));
        }

        if let Some(limit) = start_timeout {
            if tokio::time::timeout(limit, &mut started).await.is_err() {
                // Closing first settles the race with the worker: either it
                // already signalled the start, or its signal now fails and
                // the job is skipped.
                started.close();
                if started.try_recv().is_err() {
                    debug!("Gave up on {} after {:?} in line", label, limit);
                    return WriteOutcome::TimedOut;
                }
            }
        }

        outcome
            .await
            .unwrap_or_else(|_| WriteOutcome::failed(format!("write queue dropped {label}")))
    }
}

async fn drain(mut rx: mpsc::UnboundedReceiver<QueuedWrite>, delay: Duration) {
    while let Some(write) = rx.recv().await {
        if write.reply.is_closed() || write.started.send(()).is_err() {
            debug!("Skipping abandoned write: {}", write.label);
            continue;
        }

        debug!("Running queued write: {}", write.label);
        let outcome = match AssertUnwindSafe(write.job).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("Queued write panicked: {}", write.label);
                WriteOutcome::failed(format!("write {} panicked", write.label))
            }
        };

        tokio::time::sleep(delay).await;

        if write.reply.send(outcome).is_err() {
            debug!("Caller stopped waiting for {} after it ran", write.label);
        }
    }
    debug!("Write queue closed");
}
