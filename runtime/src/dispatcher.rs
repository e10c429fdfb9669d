//! Consumer dispatcher: per-partition pull workers.
//!
//! A dispatcher owns one topic for one consumer group. It assigns the
//! topic's partitions round-robin to a fixed set of worker tasks; each
//! worker drains its partitions in rotation, strictly in offset order
//! within every partition, while workers for disjoint partition sets run
//! fully in parallel.
//!
//! Per delivered record the lifecycle is `received → handling →
//! {committed | dead-lettered}`: the worker hands the record to the
//! [`RetrySupervisor`] and advances the group's committed offset only after
//! the supervisor reports a disposition, never on raw delivery. A crash
//! between delivery and commit therefore causes redelivery, which the
//! idempotency guard absorbs.
//!
//! On shutdown (broadcast signal), workers stop polling for new batches but
//! let the in-flight handle-or-backoff cycle finish; anything not yet
//! committed is left for redelivery. No partial commit is ever made.

use crate::supervisor::{Disposition, RetryPolicy, RetrySupervisor};
use eventline_core::handler::EventHandler;
use eventline_core::log::PartitionedLog;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

const DEFAULT_POLL_BATCH: usize = 50;
const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(250);

/// Pull-based consumer for one topic within one consumer group.
pub struct ConsumerDispatcher {
    group: String,
    topic: String,
    log: Arc<dyn PartitionedLog>,
    handler: Arc<dyn EventHandler>,
    shutdown: broadcast::Receiver<()>,
    policy: RetryPolicy,
    poll_batch: usize,
    idle_backoff: Duration,
    workers: u32,
}

impl ConsumerDispatcher {
    /// Create a dispatcher with default retry policy, batch size, idle
    /// backoff, and one worker per partition.
    #[must_use]
    pub fn new(
        group: impl Into<String>,
        topic: impl Into<String>,
        log: Arc<dyn PartitionedLog>,
        handler: Arc<dyn EventHandler>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            group: group.into(),
            topic: topic.into(),
            log,
            handler,
            shutdown,
            policy: RetryPolicy::default(),
            poll_batch: DEFAULT_POLL_BATCH,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            workers: u32::MAX,
        }
    }

    /// Override the retry policy applied to every record.
    #[must_use]
    pub const fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override how many records one poll may return.
    #[must_use]
    pub const fn with_poll_batch(mut self, poll_batch: usize) -> Self {
        self.poll_batch = poll_batch;
        self
    }

    /// Override how long a worker parks after an empty poll rotation.
    #[must_use]
    pub const fn with_idle_backoff(mut self, idle_backoff: Duration) -> Self {
        self.idle_backoff = idle_backoff;
        self
    }

    /// Cap the number of worker tasks. The effective count never exceeds
    /// the topic's partition count (a partition has exactly one owner).
    #[must_use]
    pub const fn with_workers(mut self, workers: u32) -> Self {
        self.workers = workers;
        self
    }

    /// Spawn the dispatcher as a background task.
    ///
    /// The task runs until the shutdown signal fires and every worker has
    /// finished its in-flight record.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        let partitions = self.log.partition_count(&self.topic);
        if partitions == 0 {
            error!(
                group = %self.group,
                topic = %self.topic,
                "Topic has no partitions, dispatcher not starting"
            );
            return;
        }

        let worker_count = self.workers.clamp(1, partitions);
        let supervisor = RetrySupervisor::new(self.policy, Arc::clone(&self.log));

        // Round-robin partition assignment: worker w owns every partition p
        // with p % worker_count == w.
        let mut handles = Vec::with_capacity(worker_count as usize);
        for worker in 0..worker_count {
            let owned: Vec<u32> = (0..partitions).filter(|p| p % worker_count == worker).collect();
            let task = PartitionWorker {
                group: self.group.clone(),
                topic: self.topic.clone(),
                partitions: owned,
                log: Arc::clone(&self.log),
                handler: Arc::clone(&self.handler),
                supervisor: supervisor.clone(),
                shutdown: self.shutdown.resubscribe(),
                poll_batch: self.poll_batch,
                idle_backoff: self.idle_backoff,
            };
            handles.push(tokio::spawn(task.run()));
        }

        info!(
            group = %self.group,
            topic = %self.topic,
            partitions,
            workers = worker_count,
            "Consumer dispatcher started"
        );

        for handle in handles {
            if let Err(e) = handle.await {
                error!(group = %self.group, topic = %self.topic, error = %e, "Worker task failed");
            }
        }

        info!(group = %self.group, topic = %self.topic, "Consumer dispatcher stopped");
    }
}

/// One worker task: sole owner of a fixed partition subset.
struct PartitionWorker {
    group: String,
    topic: String,
    partitions: Vec<u32>,
    log: Arc<dyn PartitionedLog>,
    handler: Arc<dyn EventHandler>,
    supervisor: RetrySupervisor,
    shutdown: broadcast::Receiver<()>,
    poll_batch: usize,
    idle_backoff: Duration,
}

impl PartitionWorker {
    async fn run(mut self) {
        info!(
            group = %self.group,
            topic = %self.topic,
            partitions = ?self.partitions,
            "Partition worker started"
        );

        let partitions = self.partitions.clone();

        'main: loop {
            let mut saw_records = false;

            for &partition in &partitions {
                let batch = tokio::select! {
                    _ = self.shutdown.recv() => break 'main,
                    polled = self.log.poll(&self.group, &self.topic, partition, self.poll_batch) => {
                        match polled {
                            Ok(batch) => batch,
                            Err(e) => {
                                error!(
                                    group = %self.group,
                                    topic = %self.topic,
                                    partition,
                                    error = %e,
                                    "Poll failed"
                                );
                                continue;
                            }
                        }
                    }
                };

                if batch.is_empty() {
                    continue;
                }
                saw_records = true;

                for delivery in batch {
                    // The handle-or-backoff cycle is never interrupted:
                    // shutdown is only checked between records.
                    match self.supervisor.process(self.handler.as_ref(), &delivery).await {
                        Ok(disposition) => {
                            let coordinate = &delivery.coordinate;
                            match &disposition {
                                Disposition::Committed(report) => {
                                    info!(
                                        group = %self.group,
                                        topic = %coordinate.topic,
                                        partition = coordinate.partition,
                                        offset = coordinate.offset,
                                        event_id = %report.event_id,
                                        status = report.outcome.as_str(),
                                        detail = %report.detail,
                                        "Record consumed"
                                    );
                                }
                                Disposition::DeadLettered { attempts, reason } => {
                                    info!(
                                        group = %self.group,
                                        topic = %coordinate.topic,
                                        partition = coordinate.partition,
                                        offset = coordinate.offset,
                                        attempts,
                                        reason = %reason,
                                        status = "DEAD_LETTERED",
                                        "Record escalated and committed"
                                    );
                                }
                            }

                            if let Err(e) = self
                                .log
                                .commit(&self.group, &self.topic, partition, coordinate.offset)
                                .await
                            {
                                // Redelivery after a failed commit is safe;
                                // the guard will classify it a duplicate.
                                warn!(
                                    group = %self.group,
                                    topic = %self.topic,
                                    partition,
                                    offset = coordinate.offset,
                                    error = %e,
                                    "Commit failed, record may be redelivered"
                                );
                            }
                        }
                        Err(e) => {
                            // Dead-letter escalation failed: leave this and
                            // everything after it uncommitted so the whole
                            // tail is redelivered in order.
                            error!(
                                group = %self.group,
                                topic = %self.topic,
                                partition,
                                offset = delivery.coordinate.offset,
                                error = %e,
                                "Dead-letter escalation failed, leaving record uncommitted"
                            );
                            break;
                        }
                    }

                    if self.shutdown_requested() {
                        break 'main;
                    }
                }
            }

            if !saw_records {
                let jitter =
                    Duration::from_millis(rand::thread_rng().gen_range(0..=idle_jitter_ms(self.idle_backoff)));
                tokio::select! {
                    _ = self.shutdown.recv() => break 'main,
                    () = sleep(self.idle_backoff + jitter) => {}
                }
            }
        }

        info!(
            group = %self.group,
            topic = %self.topic,
            partitions = ?self.partitions,
            "Partition worker stopped"
        );
    }

    /// Non-blocking shutdown check between records. Anything other than an
    /// empty channel (a signal, a closed sender, a lagged receiver) means
    /// stop.
    fn shutdown_requested(&mut self) -> bool {
        !matches!(
            self.shutdown.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        )
    }
}

/// Jitter bound for the idle park: a quarter of the idle backoff.
fn idle_jitter_ms(idle_backoff: Duration) -> u64 {
    (idle_backoff.as_millis() as u64) / 4
}
