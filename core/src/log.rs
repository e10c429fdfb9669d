//! Contract for the external partitioned, durable log.
//!
//! The log is a *given primitive*: this module states what the pipeline
//! requires of it; it is implemented by adapter crates (the rdkafka-backed
//! `eventline-redpanda` for production, the in-memory log in
//! `eventline-testing` for tests).
//!
//! # Stated contract
//!
//! - A topic is a fixed set of partitions; each partition is an ordered,
//!   appendable sequence with monotonically increasing offsets.
//! - Keyed appends place records with
//!   [`partition_for_key`](crate::partition::partition_for_key); appends to
//!   an explicit partition go exactly there (used for dead-letter records,
//!   which must preserve the source partition index).
//! - Delivery is at-least-once per consumer group: a group's position is
//!   durable only up to its committed offset, so anything handled but not
//!   committed is redelivered after a crash, restart, or rebalance (the
//!   in-memory double redelivers it on the very next poll).
//! - [`PartitionedLog::commit`] advances the group's offset for one
//!   partition. Commit order is the caller's responsibility; the dispatcher
//!   only commits after a record is fully handled or dead-lettered.
//!
//! # Dyn compatibility
//!
//! Methods return explicit `Pin<Box<dyn Future>>` instead of `async fn` so
//! the trait can be used as `Arc<dyn PartitionedLog>` and shared across
//! worker tasks.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during log operations.
#[derive(Error, Debug, Clone)]
pub enum LogError {
    /// Failed to reach the log at all.
    #[error("log connection failed: {0}")]
    ConnectionFailed(String),

    /// An append could not be completed.
    #[error("append failed for topic '{topic}': {reason}")]
    AppendFailed {
        /// Topic the append targeted.
        topic: String,
        /// Why it failed.
        reason: String,
    },

    /// A poll could not be completed.
    #[error("poll failed for {topic}[{partition}]: {reason}")]
    PollFailed {
        /// Topic being polled.
        topic: String,
        /// Partition being polled.
        partition: u32,
        /// Why it failed.
        reason: String,
    },

    /// A commit could not be completed.
    #[error("commit failed for {topic}[{partition}] at offset {offset}: {reason}")]
    CommitFailed {
        /// Topic being committed.
        topic: String,
        /// Partition being committed.
        partition: u32,
        /// Offset that failed to commit.
        offset: i64,
        /// Why it failed.
        reason: String,
    },

    /// The topic is not provisioned on this log.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
}

/// Identifies one physical delivery of an event.
///
/// Many deliveries may carry the same logical event under redelivery; the
/// coordinate names the exact log position this copy came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryCoordinate {
    /// Topic the record lives on.
    pub topic: String,
    /// Partition index within the topic.
    pub partition: u32,
    /// Offset within the partition.
    pub offset: i64,
    /// Partition key the record was appended with.
    pub key: String,
}

/// One record pulled from the log: its position plus the raw envelope bytes.
#[derive(Clone, Debug)]
pub struct Delivery {
    /// Where this record sits in the log.
    pub coordinate: DeliveryCoordinate,
    /// Serialized event envelope.
    pub payload: Vec<u8>,
}

/// The partitioned log primitive.
///
/// All implementations must be `Send + Sync`; one instance is shared by the
/// publisher and every dispatcher worker.
pub trait PartitionedLog: Send + Sync {
    /// Number of partitions provisioned for a topic.
    ///
    /// Returns 0 for unknown topics.
    fn partition_count(&self, topic: &str) -> u32;

    /// Append a record, placing it by stable hash of `key`.
    ///
    /// Resolves to the coordinate of the appended record once the log has
    /// acknowledged it.
    fn append(
        &self,
        topic: &str,
        key: &str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryCoordinate, LogError>> + Send + '_>>;

    /// Append a record to an explicit partition, bypassing key placement.
    ///
    /// Dead-letter escalation uses this to pin a record to its source
    /// partition index.
    fn append_to_partition(
        &self,
        topic: &str,
        partition: u32,
        key: &str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryCoordinate, LogError>> + Send + '_>>;

    /// Pull up to `max_records` records for `group` from one partition, in
    /// offset order.
    ///
    /// Polling never advances the committed offset; a record only stops
    /// being redeliverable once [`PartitionedLog::commit`] moves past it.
    fn poll(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        max_records: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Delivery>, LogError>> + Send + '_>>;

    /// Advance `group`'s committed offset for one partition.
    ///
    /// After this resolves, records at `offset` and below are never
    /// redelivered to the group.
    fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        offset: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogError>> + Send + '_>>;
}
