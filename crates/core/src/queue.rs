//! FIFO work queue of relay jobs, decoupling ingestion from execution.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tokio::sync::{Mutex, mpsc};

use crate::{
    error::{Error, Result},
    transport::ReplyContext,
    types::{ChannelRef, UserId},
};

/// One unit of work: deliver the content behind a link to the requesting
/// user. Created on enqueue, consumed exactly once by a worker, never
/// persisted.
pub struct RelayJob {
    pub channel: ChannelRef,
    pub message_id: i64,
    pub user: UserId,
    pub reply: Arc<dyn ReplyContext>,
}

impl std::fmt::Debug for RelayJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayJob")
            .field("channel", &self.channel)
            .field("message_id", &self.message_id)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Queue entry: either work or an explicit shutdown signal. One `Shutdown`
/// is enqueued per worker during drain; no null-valued sentinels.
#[derive(Debug)]
pub enum Job {
    Relay(RelayJob),
    Shutdown,
}

/// Unbounded FIFO of [`Job`]s shared by the worker pool.
///
/// Ordering is FIFO across the whole queue, not per user: jobs from one user
/// can complete out of relative order when picked up by different idle
/// workers. Bounding is a deployment choice, not a correctness requirement.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    depth: Arc<AtomicUsize>,
}

impl JobQueue {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            depth: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Enqueue a relay job.
    pub fn enqueue(&self, job: RelayJob) -> Result<()> {
        self.tx.send(Job::Relay(job)).map_err(|_| Error::QueueClosed)?;
        self.depth.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Enqueue one shutdown signal; call once per worker when draining.
    pub fn signal_shutdown(&self) -> Result<()> {
        self.tx.send(Job::Shutdown).map_err(|_| Error::QueueClosed)
    }

    /// Pull the next job, waiting until one is available. Returns `None`
    /// only when the queue is closed.
    pub async fn next(&self) -> Option<Job> {
        let mut rx = self.rx.lock().await;
        let job = rx.recv().await;
        if matches!(job, Some(Job::Relay(_))) {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        job
    }

    /// Number of relay jobs currently waiting (shutdown signals excluded).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
