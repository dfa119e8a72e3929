//! Lifecycle controller: shared state, startup, keep-alive, shutdown.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use {
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    dedup::{self, DedupLedger},
    delivery::DeliveryEngine,
    error::Result,
    limits::FloodGate,
    queue::JobQueue,
    roles::RoleStore,
    snapshot::{self, StateSnapshot},
    transport::Transport,
    worker,
};

/// Shared mutable state: role store, debounce clock, dedup ledger.
///
/// All sections use `std::sync::Mutex` and are never held across an await
/// point, so mutations are atomic with respect to the other tasks.
pub struct RelayState {
    roles: Mutex<RoleStore>,
    gate: Mutex<FloodGate>,
    dedup: Mutex<DedupLedger>,
}

impl RelayState {
    #[must_use]
    pub fn new(dedup_capacity: usize) -> Self {
        Self {
            roles: Mutex::new(RoleStore::new()),
            gate: Mutex::new(FloodGate::new()),
            dedup: Mutex::new(DedupLedger::new(dedup_capacity)),
        }
    }

    pub fn roles(&self) -> MutexGuard<'_, RoleStore> {
        self.roles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn gate(&self) -> MutexGuard<'_, FloodGate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn dedup(&self) -> MutexGuard<'_, DedupLedger> {
        self.dedup.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tunables for the relay service.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Number of concurrent workers draining the queue.
    pub workers: usize,
    /// Snapshot file; `None` disables persistence entirely.
    pub snapshot_path: Option<PathBuf>,
    /// Maximum dedup ledger size.
    pub dedup_capacity: usize,
    /// Keep-alive probe and opportunistic snapshot interval.
    pub keep_alive_interval: Duration,
    /// How long shutdown waits for the queue to drain before aborting
    /// workers.
    pub shutdown_grace: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            workers: 3,
            snapshot_path: None,
            dedup_capacity: dedup::DEFAULT_CAPACITY,
            keep_alive_interval: Duration::from_secs(300),
            shutdown_grace: Duration::from_secs(90),
        }
    }
}

/// Owns the queue, the worker pool and the keep-alive task.
pub struct RelayService {
    state: Arc<RelayState>,
    queue: JobQueue,
    transport: Arc<dyn Transport>,
    options: ServiceOptions,
    workers: Vec<JoinHandle<()>>,
    keep_alive: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl RelayService {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, options: ServiceOptions) -> Self {
        Self {
            state: Arc::new(RelayState::new(options.dedup_capacity)),
            queue: JobQueue::new(),
            transport,
            options,
            workers: Vec::new(),
            keep_alive: None,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> Arc<RelayState> {
        Arc::clone(&self.state)
    }

    #[must_use]
    pub fn queue(&self) -> JobQueue {
        self.queue.clone()
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.options.workers
    }

    /// Load the snapshot, spawn the worker pool and the keep-alive task.
    pub async fn start(&mut self) {
        if let Some(path) = &self.options.snapshot_path {
            let restored = snapshot::load(path).await;
            let (users, admins, owners) = restored.counts();
            info!(users, admins, owners, "restored state snapshot");
            *self.state.roles() = restored;
        }

        let engine = Arc::new(DeliveryEngine::new(Arc::clone(&self.transport)));
        self.workers = worker::spawn_workers(
            self.options.workers,
            self.queue.clone(),
            engine,
            Arc::clone(&self.state),
        );
        info!(workers = self.options.workers, "worker pool started");

        self.keep_alive = Some(self.spawn_keep_alive());
    }

    /// Periodic lightweight health probe plus opportunistic snapshot save.
    /// Runs until cancelled during shutdown.
    fn spawn_keep_alive(&self) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let state = Arc::clone(&self.state);
        let snapshot_path = self.options.snapshot_path.clone();
        let interval = self.options.keep_alive_interval;
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("keep-alive task cancelled");
                        break;
                    },
                    () = tokio::time::sleep(interval) => {},
                }

                if !transport.is_connected() {
                    warn!("keep-alive: transport not connected");
                    continue;
                }
                match transport.self_id().await {
                    Ok(_) => debug!("keep-alive probe successful"),
                    Err(e) => warn!(error = %e, "keep-alive probe failed"),
                }

                if let Some(path) = &snapshot_path {
                    let captured = StateSnapshot::capture(&state.roles());
                    if let Err(e) = snapshot::save(path, &captured).await {
                        warn!(error = %e, "opportunistic snapshot save failed");
                    }
                }
            }
        })
    }

    /// Drain and stop everything.
    ///
    /// Cancels the keep-alive task, signals one shutdown per worker, waits up
    /// to the grace period for the queue to drain, then aborts stragglers and
    /// abandons any in-flight job. Finishes with a best-effort snapshot save.
    pub async fn shutdown(mut self) -> Result<()> {
        info!(pending = self.queue.depth(), "shutting down, draining queue");

        self.cancel.cancel();
        if let Some(handle) = self.keep_alive.take() {
            let _ = handle.await;
        }

        for _ in 0..self.workers.len() {
            let _ = self.queue.signal_shutdown();
        }

        let aborts: Vec<_> = self.workers.iter().map(JoinHandle::abort_handle).collect();
        let drain = futures::future::join_all(std::mem::take(&mut self.workers));
        match tokio::time::timeout(self.options.shutdown_grace, drain).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result
                        && !e.is_cancelled()
                    {
                        warn!(error = %e, "worker task panicked during drain");
                    }
                }
                info!("all workers stopped");
            },
            Err(_) => {
                warn!(
                    grace_secs = self.options.shutdown_grace.as_secs(),
                    "queue did not drain in time, cancelling workers"
                );
                for abort in aborts {
                    abort.abort();
                }
            },
        }

        self.save_snapshot().await;
        info!("shutdown complete");
        Ok(())
    }

    /// Best-effort snapshot write; used at shutdown and on termination
    /// signals.
    pub async fn save_snapshot(&self) {
        let Some(path) = &self.options.snapshot_path else {
            return;
        };
        let captured = StateSnapshot::capture(&self.state.roles());
        match snapshot::save(path, &captured).await {
            Ok(()) => debug!(path = %path.display(), "state snapshot saved"),
            Err(e) => warn!(error = %e, "failed to save state snapshot"),
        }
    }
}
