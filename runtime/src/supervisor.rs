//! Retry/backoff supervision and dead-letter escalation.
//!
//! The supervisor wraps handler invocation for one delivered record. On a
//! transient failure it retries the *same* record with a fixed delay
//! between attempts, blocking the partition during backoff. Retries are
//! serialized on purpose, because processing anything later from the same
//! partition would break offset order. On exhaustion (or immediately, for
//! terminal failures) the record plus failure metadata is published to the
//! source topic's dead-letter sibling, pinned to the source partition index
//! so the dead-letter topic preserves the source's distribution. Only then
//! may the dispatcher commit the original offset.
//!
//! Dead-lettered records are never retried by this system; they exist for
//! manual triage.

use eventline_core::handler::{EventHandler, HandlerError, ProcessingReport};
use eventline_core::log::{Delivery, LogError, PartitionedLog};
use eventline_core::topic::dlq_topic;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

/// Local retry policy: bounded attempts with a fixed delay between them.
///
/// Defaults mirror the system's contract: 3 retries, 2000 ms apart, for a
/// total of 4 attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// Total invocation attempts this policy allows (1 + retries).
    #[must_use]
    pub const fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// What the supervisor concluded about one record.
///
/// Either way the record is finished and its offset may be committed.
#[derive(Debug)]
pub enum Disposition {
    /// The handler succeeded (side effect applied, or duplicate skipped).
    Committed(ProcessingReport),
    /// The record was escalated to the dead-letter topic.
    DeadLettered {
        /// How many invocation attempts were made.
        attempts: u32,
        /// The last failure.
        reason: String,
    },
}

/// A record escalated to a dead-letter topic, as serialized on the wire.
///
/// Carries the original envelope (as JSON, or the raw text if the envelope
/// never parsed) plus enough delivery metadata for triage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    /// The original event envelope.
    pub event: serde_json::Value,
    /// Partition the record was consumed from (and is re-published to).
    pub original_partition: u32,
    /// Offset the record was consumed at.
    pub original_offset: i64,
    /// The failure that exhausted handling.
    pub failure_reason: String,
    /// Invocation attempts made before escalation.
    pub attempt_count: u32,
}

impl DeadLetterRecord {
    /// Build a record from the failed delivery.
    #[must_use]
    pub fn from_delivery(delivery: &Delivery, attempt_count: u32, failure_reason: String) -> Self {
        let event = serde_json::from_slice(&delivery.payload).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&delivery.payload).into_owned())
        });
        Self {
            event,
            original_partition: delivery.coordinate.partition,
            original_offset: delivery.coordinate.offset,
            failure_reason,
            attempt_count,
        }
    }

    /// The dead event's id, when the original envelope carried one.
    #[must_use]
    pub fn event_id(&self) -> Option<Uuid> {
        self.event
            .get("event_id")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    /// The dead event's aggregate id, when the original envelope carried one.
    #[must_use]
    pub fn aggregate_id(&self) -> Option<&str> {
        self.event.get("aggregate_id").and_then(serde_json::Value::as_str)
    }
}

/// Supervises handler invocation for single records.
///
/// Cheap to clone; clones share the log handle used for escalation.
#[derive(Clone)]
pub struct RetrySupervisor {
    policy: RetryPolicy,
    log: Arc<dyn PartitionedLog>,
}

impl RetrySupervisor {
    /// Create a supervisor escalating through the given log.
    #[must_use]
    pub fn new(policy: RetryPolicy, log: Arc<dyn PartitionedLog>) -> Self {
        Self { policy, log }
    }

    /// The policy this supervisor runs.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Drive one record to a disposition.
    ///
    /// Invokes the handler, retrying transient failures up to the policy's
    /// budget with the fixed backoff in between. Terminal failures skip the
    /// budget entirely. When handling cannot succeed, the record is
    /// published to the dead-letter topic before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] only if dead-letter escalation itself fails;
    /// the caller must *not* commit the record in that case, so the log
    /// redelivers it and escalation is re-attempted.
    pub async fn process(
        &self,
        handler: &dyn EventHandler,
        delivery: &Delivery,
    ) -> Result<Disposition, LogError> {
        let coordinate = &delivery.coordinate;
        let mut attempt: u32 = 1;

        let failure = loop {
            match handler.handle(delivery).await {
                Ok(report) => {
                    if attempt > 1 {
                        tracing::info!(
                            topic = %coordinate.topic,
                            partition = coordinate.partition,
                            offset = coordinate.offset,
                            attempt,
                            "Handler succeeded after retry"
                        );
                    }
                    return Ok(Disposition::Committed(report));
                }
                Err(error) if error.is_transient() && attempt <= self.policy.max_retries => {
                    tracing::warn!(
                        topic = %coordinate.topic,
                        partition = coordinate.partition,
                        offset = coordinate.offset,
                        attempt,
                        backoff_ms = self.policy.backoff.as_millis() as u64,
                        error = %error,
                        "Handler failed, retrying same record"
                    );
                    sleep(self.policy.backoff).await;
                    attempt += 1;
                }
                Err(error) => break error,
            }
        };

        if failure.is_transient() {
            tracing::error!(
                topic = %coordinate.topic,
                partition = coordinate.partition,
                offset = coordinate.offset,
                attempts = attempt,
                error = %failure,
                "Retries exhausted, escalating to dead-letter topic"
            );
        } else {
            tracing::error!(
                topic = %coordinate.topic,
                partition = coordinate.partition,
                offset = coordinate.offset,
                attempts = attempt,
                error = %failure,
                "Terminal handler failure, escalating to dead-letter topic"
            );
        }

        self.dead_letter(delivery, attempt, &failure).await?;
        Ok(Disposition::DeadLettered {
            attempts: attempt,
            reason: failure.to_string(),
        })
    }

    /// Publish the failed record to `<topic>-dlq`, pinned to the source
    /// partition index.
    async fn dead_letter(
        &self,
        delivery: &Delivery,
        attempts: u32,
        failure: &HandlerError,
    ) -> Result<(), LogError> {
        let coordinate = &delivery.coordinate;
        let record = DeadLetterRecord::from_delivery(delivery, attempts, failure.to_string());
        let dlq = dlq_topic(&coordinate.topic);

        let payload = serde_json::to_vec(&record).map_err(|e| LogError::AppendFailed {
            topic: dlq.clone(),
            reason: format!("dead-letter record did not serialize: {e}"),
        })?;

        let dead_coordinate = self
            .log
            .append_to_partition(&dlq, coordinate.partition, &coordinate.key, payload)
            .await?;

        tracing::error!(
            topic = %coordinate.topic,
            partition = coordinate.partition,
            offset = coordinate.offset,
            key = %coordinate.key,
            dlq_topic = %dead_coordinate.topic,
            dlq_offset = dead_coordinate.offset,
            attempts,
            "Message moved to DLQ"
        );
        Ok(())
    }
}
