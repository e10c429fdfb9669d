//! Topic names and dead-letter naming conventions.
//!
//! Each event type has its own topic, and each topic has a `-dlq` sibling
//! that receives messages after retry exhaustion. Dead-letter consumers run
//! under the primary consumer group id suffixed `-dlq` so they never compete
//! with primary consumers for partitions.

use crate::event::{DomainEvent, EventPayload};

/// Topic for `OrderCreated` events.
pub const ORDER_CREATED: &str = "order-created";

/// Topic for `OrderShipped` events.
pub const ORDER_SHIPPED: &str = "order-shipped";

/// Topic for `ProductCreated` events.
pub const PRODUCT_CREATED: &str = "product-created";

/// Suffix appended to a topic to name its dead-letter sibling.
pub const DLQ_SUFFIX: &str = "-dlq";

/// The primary topic an event belongs on, derived from its payload type.
#[must_use]
pub const fn topic_for(event: &DomainEvent) -> &'static str {
    match event.payload {
        EventPayload::OrderCreated(_) => ORDER_CREATED,
        EventPayload::OrderShipped(_) => ORDER_SHIPPED,
        EventPayload::ProductCreated(_) => PRODUCT_CREATED,
    }
}

/// Dead-letter sibling of a topic.
#[must_use]
pub fn dlq_topic(topic: &str) -> String {
    format!("{topic}{DLQ_SUFFIX}")
}

/// Consumer group id for a topic's dead-letter consumers.
#[must_use]
pub fn dlq_group(group: &str) -> String {
    format!("{group}{DLQ_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    #[test]
    fn events_map_to_their_type_topic() {
        let event = DomainEvent::new(
            "order-1".to_string(),
            crate::event::EventPayload::OrderCreated(crate::event::OrderCreated {
                order_id: "order-1".to_string(),
                customer_id: "c1".to_string(),
                customer_email: "c1@x.com".to_string(),
                total_amount: Decimal::new(1000, 2),
                currency: "USD".to_string(),
            }),
            Utc::now(),
        );
        assert_eq!(topic_for(&event), ORDER_CREATED);
    }

    #[test]
    fn dlq_naming_follows_the_source_topic() {
        assert_eq!(dlq_topic(ORDER_CREATED), "order-created-dlq");
        assert_eq!(dlq_topic(ORDER_SHIPPED), "order-shipped-dlq");
        assert_eq!(dlq_topic(PRODUCT_CREATED), "product-created-dlq");
    }

    #[test]
    fn dlq_group_is_suffixed() {
        assert_eq!(dlq_group("notification-service"), "notification-service-dlq");
    }
}
