//! Event publisher: keyed appends to the partitioned log.
//!
//! The publisher serializes a [`DomainEvent`] envelope and appends it keyed
//! by the event's `aggregate_id`, so every event of one aggregate lands on
//! the same partition and is consumed in publish order. That placement is
//! the system's only ordering guarantee.
//!
//! Failure semantics: a send that cannot be initiated (the envelope does
//! not serialize) fails before anything reaches the log. A send whose
//! acknowledgment fails is logged at error severity and returned to the
//! caller. The publisher itself never retries; at-least-once behavior on
//! the producing side is the broker configuration's job (acks from all
//! replicas, idempotent producer, bounded in-flight), not a retry loop
//! here.

use eventline_core::event::DomainEvent;
use eventline_core::log::{DeliveryCoordinate, LogError, PartitionedLog};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by [`EventPublisher::publish`].
#[derive(Error, Debug)]
pub enum PublishError {
    /// The envelope could not be serialized; nothing was sent.
    #[error("failed to serialize event {event_id}: {reason}")]
    Serialization {
        /// Event that failed to serialize.
        event_id: Uuid,
        /// Underlying serde error.
        reason: String,
    },

    /// The append was initiated but the log did not acknowledge it.
    #[error("failed to publish event {event_id} to '{topic}': {source}")]
    Append {
        /// Event that failed to publish.
        event_id: Uuid,
        /// Topic the append targeted.
        topic: String,
        /// Log-level failure.
        source: LogError,
    },
}

/// Publishes domain events to the partitioned log.
///
/// Cheap to clone; every clone shares the same log handle.
#[derive(Clone)]
pub struct EventPublisher {
    log: Arc<dyn PartitionedLog>,
}

impl EventPublisher {
    /// Create a publisher over a log handle.
    #[must_use]
    pub fn new(log: Arc<dyn PartitionedLog>) -> Self {
        Self { log }
    }

    /// Append `event` to `topic`, keyed by the event's `aggregate_id`.
    ///
    /// Resolves to the delivery coordinate once the log acknowledges the
    /// append.
    ///
    /// # Errors
    ///
    /// [`PublishError::Serialization`] if the envelope does not encode;
    /// [`PublishError::Append`] if the log fails to acknowledge. Both are
    /// logged here with full context before being returned, and neither is
    /// retried by the publisher.
    pub async fn publish(
        &self,
        topic: &str,
        event: &DomainEvent,
    ) -> Result<DeliveryCoordinate, PublishError> {
        let payload = event
            .to_bytes()
            .map_err(|e| PublishError::Serialization {
                event_id: event.event_id,
                reason: e.to_string(),
            })?;

        match self.log.append(topic, &event.aggregate_id, payload).await {
            Ok(coordinate) => {
                tracing::info!(
                    topic = %coordinate.topic,
                    partition = coordinate.partition,
                    offset = coordinate.offset,
                    key = %coordinate.key,
                    event_id = %event.event_id,
                    event_type = event.event_type(),
                    "Event published"
                );
                Ok(coordinate)
            }
            Err(source) => {
                tracing::error!(
                    topic = %topic,
                    key = %event.aggregate_id,
                    event_id = %event.event_id,
                    event_type = event.event_type(),
                    error = %source,
                    "Failed to publish event"
                );
                Err(PublishError::Append {
                    event_id: event.event_id,
                    topic: topic.to_string(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use eventline_core::event::{EventPayload, OrderCreated};
    use eventline_core::partition::partition_for_key;
    use eventline_core::topic;
    use eventline_testing::InMemoryLog;
    use rust_decimal::Decimal;

    fn order_event(aggregate: &str) -> DomainEvent {
        DomainEvent::new(
            aggregate.to_string(),
            EventPayload::OrderCreated(OrderCreated {
                order_id: aggregate.to_string(),
                customer_id: "c1".to_string(),
                customer_email: "c1@x.com".to_string(),
                total_amount: Decimal::new(1000, 2),
                currency: "USD".to_string(),
            }),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn publish_places_by_aggregate_id_hash() {
        let log = Arc::new(InMemoryLog::new(&[(topic::ORDER_CREATED, 4)]));
        let publisher = EventPublisher::new(log);

        let event = order_event("order-7");
        let coordinate = publisher.publish(topic::ORDER_CREATED, &event).await.unwrap();

        assert_eq!(coordinate.partition, partition_for_key("order-7", 4));
        assert_eq!(coordinate.key, "order-7");
        assert_eq!(coordinate.offset, 0);
    }

    #[tokio::test]
    async fn same_aggregate_id_always_selects_same_partition() {
        let log = Arc::new(InMemoryLog::new(&[(topic::ORDER_CREATED, 8)]));
        let publisher = EventPublisher::new(log);

        let first = publisher
            .publish(topic::ORDER_CREATED, &order_event("order-9"))
            .await
            .unwrap();
        let second = publisher
            .publish(topic::ORDER_CREATED, &order_event("order-9"))
            .await
            .unwrap();

        assert_eq!(first.partition, second.partition);
        assert_eq!(second.offset, first.offset + 1);
    }

    #[tokio::test]
    async fn unknown_topic_is_an_append_error() {
        let log = Arc::new(InMemoryLog::new(&[(topic::ORDER_CREATED, 1)]));
        let publisher = EventPublisher::new(log);

        let err = publisher
            .publish("no-such-topic", &order_event("order-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Append { .. }));
    }
}
