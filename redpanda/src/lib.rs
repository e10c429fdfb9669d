//! Kafka-compatible [`PartitionedLog`] adapter built on rdkafka.
//!
//! Works against Redpanda, Apache Kafka, or any other Kafka-protocol
//! broker. One [`RedpandaLog`] instance carries a single producer plus a
//! lazily created consumer per `(group, topic, partition)` triple.
//!
//! # Producer configuration
//!
//! The producer is configured for broker-side deduplication of retried
//! sends, so transient network retries neither reorder nor duplicate at the
//! log level:
//!
//! - `acks=all`: acknowledge from all in-sync replicas
//! - `enable.idempotence=true`: broker de-duplicates producer retries
//! - `retries=2147483647`: unlimited internal retries (bounded by the
//!   message timeout)
//! - `max.in.flight.requests.per.connection=5`: bounded in-flight requests
//!
//! Partition placement is computed client-side with the same stable hash as
//! every other adapter ([`partition_for_key`]), so partition assertions made
//! against the in-memory log hold here too.
//!
//! # Consumer model
//!
//! Consumers use *manual partition assignment*, not group subscription: the
//! dispatcher owns the partition-to-worker mapping, so each consumer is
//! pinned to exactly one partition with `assign()` and resumes from the
//! group's stored offset. Commits are synchronous and go through the group
//! coordinator, which is what makes the committed offset the durable
//! progress point: anything handled but not committed is redelivered after
//! a restart from the last committed offset.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use eventline_core::log::{Delivery, DeliveryCoordinate, LogError, PartitionedLog};
use eventline_core::partition::partition_for_key;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Kafka-compatible partitioned log.
pub struct RedpandaLog {
    brokers: String,
    producer: FutureProducer,
    send_timeout: Duration,
    poll_wait: Duration,
    auto_offset_reset: String,
    /// Provisioned topics and their partition counts, from configuration,
    /// the same source of truth the provisioning job uses.
    topics: HashMap<String, u32>,
    consumers: Mutex<HashMap<(String, String, u32), Arc<StreamConsumer>>>,
}

impl RedpandaLog {
    /// Create a builder.
    #[must_use]
    pub fn builder() -> RedpandaLogBuilder {
        RedpandaLogBuilder::default()
    }

    /// Broker addresses this log talks to.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    fn consumer_for(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
    ) -> Result<Arc<StreamConsumer>, LogError> {
        let key = (group.to_string(), topic.to_string(), partition);
        let mut consumers = match self.consumers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(consumer) = consumers.get(&key) {
            return Ok(Arc::clone(consumer));
        }

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| LogError::ConnectionFailed(format!("failed to create consumer: {e}")))?;

        let mut assignment = TopicPartitionList::new();
        assignment
            .add_partition_offset(topic, partition as i32, Offset::Stored)
            .map_err(|e| LogError::ConnectionFailed(format!("invalid assignment: {e}")))?;
        consumer
            .assign(&assignment)
            .map_err(|e| LogError::ConnectionFailed(format!("failed to assign partition: {e}")))?;

        tracing::info!(
            brokers = %self.brokers,
            group,
            topic,
            partition,
            auto_offset_reset = %self.auto_offset_reset,
            "Consumer assigned"
        );

        let consumer = Arc::new(consumer);
        consumers.insert(key, Arc::clone(&consumer));
        Ok(consumer)
    }

    async fn send_to(
        &self,
        topic: String,
        partition: u32,
        key: String,
        payload: Vec<u8>,
    ) -> Result<DeliveryCoordinate, LogError> {
        let record = FutureRecord::to(&topic)
            .partition(partition as i32)
            .key(&key)
            .payload(&payload);

        match self.producer.send(record, Timeout::After(self.send_timeout)).await {
            Ok((acked_partition, offset)) => {
                tracing::debug!(
                    topic = %topic,
                    partition = acked_partition,
                    offset,
                    key = %key,
                    "Record appended"
                );
                Ok(DeliveryCoordinate {
                    topic,
                    partition: acked_partition.unsigned_abs(),
                    offset,
                    key,
                })
            }
            Err((kafka_error, _)) => Err(LogError::AppendFailed {
                topic,
                reason: kafka_error.to_string(),
            }),
        }
    }
}

impl PartitionedLog for RedpandaLog {
    fn partition_count(&self, topic: &str) -> u32 {
        self.topics.get(topic).copied().unwrap_or(0)
    }

    fn append(
        &self,
        topic: &str,
        key: &str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryCoordinate, LogError>> + Send + '_>> {
        let topic = topic.to_string();
        let key = key.to_string();
        Box::pin(async move {
            let count = self.partition_count(&topic);
            if count == 0 {
                return Err(LogError::UnknownTopic(topic));
            }
            let partition = partition_for_key(&key, count);
            self.send_to(topic, partition, key, payload).await
        })
    }

    fn append_to_partition(
        &self,
        topic: &str,
        partition: u32,
        key: &str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryCoordinate, LogError>> + Send + '_>> {
        let topic = topic.to_string();
        let key = key.to_string();
        Box::pin(async move {
            let count = self.partition_count(&topic);
            if count == 0 {
                return Err(LogError::UnknownTopic(topic));
            }
            if partition >= count {
                return Err(LogError::AppendFailed {
                    topic,
                    reason: format!("partition {partition} out of range (topic has {count})"),
                });
            }
            self.send_to(topic, partition, key, payload).await
        })
    }

    fn poll(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        max_records: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Delivery>, LogError>> + Send + '_>> {
        let group = group.to_string();
        let topic = topic.to_string();
        Box::pin(async move {
            let consumer = self.consumer_for(&group, &topic, partition)?;

            let mut batch = Vec::new();
            while batch.len() < max_records {
                match tokio::time::timeout(self.poll_wait, consumer.recv()).await {
                    // Wait window elapsed: return whatever arrived.
                    Err(_) => break,
                    Ok(Err(e)) => {
                        if batch.is_empty() {
                            return Err(LogError::PollFailed {
                                topic,
                                partition,
                                reason: e.to_string(),
                            });
                        }
                        tracing::warn!(
                            group = %group,
                            topic = %topic,
                            partition,
                            error = %e,
                            "Receive error mid-batch, returning partial batch"
                        );
                        break;
                    }
                    Ok(Ok(message)) => {
                        let key = message
                            .key()
                            .map(|k| String::from_utf8_lossy(k).into_owned())
                            .unwrap_or_default();
                        batch.push(Delivery {
                            coordinate: DeliveryCoordinate {
                                topic: topic.clone(),
                                partition,
                                offset: message.offset(),
                                key,
                            },
                            payload: message.payload().unwrap_or_default().to_vec(),
                        });
                    }
                }
            }
            Ok(batch)
        })
    }

    fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        offset: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogError>> + Send + '_>> {
        let group = group.to_string();
        let topic = topic.to_string();
        Box::pin(async move {
            let consumer = self.consumer_for(&group, &topic, partition)?;

            // Kafka commits the *next* offset to consume.
            let mut offsets = TopicPartitionList::new();
            offsets
                .add_partition_offset(&topic, partition as i32, Offset::Offset(offset + 1))
                .map_err(|e| LogError::CommitFailed {
                    topic: topic.clone(),
                    partition,
                    offset,
                    reason: e.to_string(),
                })?;

            // Synchronous so the commit point is durable before the next
            // record is handled.
            consumer
                .commit(&offsets, CommitMode::Sync)
                .map_err(|e| LogError::CommitFailed {
                    topic,
                    partition,
                    offset,
                    reason: e.to_string(),
                })
        })
    }
}

/// Builder for a [`RedpandaLog`].
#[derive(Default)]
pub struct RedpandaLogBuilder {
    brokers: Option<String>,
    send_timeout: Option<Duration>,
    poll_wait: Option<Duration>,
    auto_offset_reset: Option<String>,
    topics: HashMap<String, u32>,
}

impl RedpandaLogBuilder {
    /// Set the broker addresses (comma-separated).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Provision a topic with its partition count.
    ///
    /// Must match the broker-side provisioning; partition placement and
    /// range checks use this count.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>, partitions: u32) -> Self {
        self.topics.insert(topic.into(), partitions);
        self
    }

    /// Set the producer send timeout (default: 30 seconds).
    #[must_use]
    pub const fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Set how long one poll waits for the first/next record
    /// (default: 500 ms).
    #[must_use]
    pub const fn poll_wait(mut self, wait: Duration) -> Self {
        self.poll_wait = Some(wait);
        self
    }

    /// Where new consumer groups start reading: `"earliest"` or `"latest"`
    /// (default: `"earliest"`, so a fresh group processes the backlog).
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the log.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::ConnectionFailed`] if brokers are not configured
    /// or the producer cannot be created.
    pub fn build(self) -> Result<RedpandaLog, LogError> {
        let brokers = self
            .brokers
            .ok_or_else(|| LogError::ConnectionFailed("brokers not configured".to_string()))?;

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("retries", "2147483647")
            .set("max.in.flight.requests.per.connection", "5")
            .create()
            .map_err(|e| LogError::ConnectionFailed(format!("failed to create producer: {e}")))?;

        tracing::info!(
            brokers = %brokers,
            topics = ?self.topics,
            "RedpandaLog created"
        );

        Ok(RedpandaLog {
            brokers,
            producer,
            send_timeout: self.send_timeout.unwrap_or(Duration::from_secs(30)),
            poll_wait: self.poll_wait.unwrap_or(Duration::from_millis(500)),
            auto_offset_reset: self.auto_offset_reset.unwrap_or_else(|| "earliest".to_string()),
            topics: self.topics,
            consumers: Mutex::new(HashMap::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redpanda_log_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaLog>();
        assert_sync::<RedpandaLog>();
    }

    #[test]
    fn build_without_brokers_fails() {
        let result = RedpandaLog::builder().topic("order-created", 3).build();
        assert!(matches!(result, Err(LogError::ConnectionFailed(_))));
    }

    #[test]
    fn builder_records_topic_provisioning() {
        let builder = RedpandaLog::builder()
            .brokers("localhost:9092")
            .topic("order-created", 3)
            .topic("order-created-dlq", 3);
        assert_eq!(builder.topics.len(), 2);
    }
}
