//! Fixed-size pool of queue consumers.
//!
//! Each worker pulls one job at a time, runs the delivery pipeline, and
//! reports failures through the job's reply context. A worker never dies
//! from a job's failure; it exits only on an explicit shutdown signal or
//! forced cancellation during drain timeout.

use std::sync::Arc;

use {
    tokio::task::JoinHandle,
    tracing::{debug, error, info},
};

use crate::{
    delivery::{DeliveryEngine, truncate_summary},
    queue::{Job, JobQueue, RelayJob},
    service::RelayState,
};

/// Spawn `count` worker tasks draining `queue`.
pub fn spawn_workers(
    count: usize,
    queue: JobQueue,
    engine: Arc<DeliveryEngine>,
    state: Arc<RelayState>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|index| {
            let queue = queue.clone();
            let engine = Arc::clone(&engine);
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                info!(worker = index, "worker started");
                worker_loop(index, queue, engine, state).await;
                info!(worker = index, "worker stopped");
            })
        })
        .collect()
}

async fn worker_loop(
    index: usize,
    queue: JobQueue,
    engine: Arc<DeliveryEngine>,
    state: Arc<RelayState>,
) {
    loop {
        let job = match queue.next().await {
            Some(Job::Relay(job)) => job,
            Some(Job::Shutdown) => {
                info!(worker = index, "received shutdown signal");
                break;
            },
            None => break,
        };

        run_job(index, &engine, &state, &job).await;
    }
}

async fn run_job(index: usize, engine: &DeliveryEngine, state: &RelayState, job: &RelayJob) {
    let key = job.channel.job_key(job.message_id);
    debug!(worker = index, %key, user = %job.user, "processing job");

    // Bookkeeping before the network round-trips; locks are never held
    // across an await.
    {
        let mut dedup = state.dedup();
        if !dedup.insert(key.clone()) {
            debug!(worker = index, %key, "key seen recently");
        }
    }
    {
        let mut roles = state.roles();
        if let Some(record) = roles.record_mut(job.user) {
            record.messages_processed += 1;
            record.daily_count += 1;
        }
    }

    match engine.run(job).await {
        Ok(outcome) => {
            debug!(worker = index, %key, ?outcome, "job finished");
        },
        Err(e) => {
            // Unclassified failure: the worker boundary. Log with context,
            // summarize to the user, carry on.
            error!(worker = index, %key, error = %e, "unexpected error processing job");
            engine
                .reply_best_effort(
                    job.reply.as_ref(),
                    &format!(
                        "❌ Error processing link {key}: {}",
                        truncate_summary(&e.to_string())
                    ),
                )
                .await;
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use {
        super::*,
        crate::{
            testutil::{CapturingReply, MockTransport},
            transport::TransportError,
            types::{ChannelRef, UserId},
        },
    };

    fn state() -> Arc<RelayState> {
        Arc::new(RelayState::new(100))
    }

    fn job(id: i64, reply: Arc<CapturingReply>) -> RelayJob {
        RelayJob {
            channel: ChannelRef::Public("news".into()),
            message_id: id,
            user: UserId(7),
            reply,
        }
    }

    #[tokio::test]
    async fn single_worker_processes_jobs_in_fifo_order() {
        let transport = Arc::new(MockTransport::default());
        let engine = Arc::new(DeliveryEngine::new(transport.clone()));
        let queue = JobQueue::new();
        let reply = Arc::new(CapturingReply::default());

        for id in [1, 2, 3] {
            queue.enqueue(job(id, reply.clone())).unwrap();
        }
        queue.signal_shutdown().unwrap();

        let handles = spawn_workers(1, queue, engine, state());
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();
        }

        let forwards: Vec<String> = transport
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("forward "))
            .collect();
        assert_eq!(forwards, vec![
            "forward news/1",
            "forward news/2",
            "forward news/3",
        ]);
    }

    #[tokio::test]
    async fn worker_survives_failing_jobs() {
        let transport = Arc::new(MockTransport {
            fetch_error: Some(TransportError::NotFound),
            ..Default::default()
        });
        let engine = Arc::new(DeliveryEngine::new(transport.clone()));
        let queue = JobQueue::new();
        let reply = Arc::new(CapturingReply::default());

        queue.enqueue(job(1, reply.clone())).unwrap();
        queue.enqueue(job(2, reply.clone())).unwrap();
        queue.signal_shutdown().unwrap();

        let handles = spawn_workers(1, queue, engine, state());
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();
        }

        // Both jobs were attempted and both failures reported.
        assert_eq!(reply.messages().len(), 2);
    }

    #[tokio::test]
    async fn worker_updates_user_counters_and_ledger() {
        let transport = Arc::new(MockTransport::default());
        let engine = Arc::new(DeliveryEngine::new(transport));
        let queue = JobQueue::new();
        let state = state();
        let reply = Arc::new(CapturingReply::default());

        {
            let mut roles = state.roles();
            roles.ensure_record(UserId(7), "Alice");
        }

        queue.enqueue(job(42, reply)).unwrap();
        queue.signal_shutdown().unwrap();

        let handles = spawn_workers(1, queue, engine, Arc::clone(&state));
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();
        }

        let roles = state.roles();
        let record = roles.record(UserId(7)).unwrap();
        assert_eq!(record.messages_processed, 1);
        assert_eq!(record.daily_count, 1);
        drop(roles);
        assert!(state.dedup().contains("news/42"));
    }

    #[tokio::test]
    async fn every_worker_exits_on_its_shutdown_signal() {
        let transport = Arc::new(MockTransport::default());
        let engine = Arc::new(DeliveryEngine::new(transport));
        let queue = JobQueue::new();

        let handles = spawn_workers(3, queue.clone(), engine, state());
        for _ in 0..3 {
            queue.signal_shutdown().unwrap();
        }
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }
}
