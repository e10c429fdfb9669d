//! Domain event envelope and wire format.
//!
//! Every event that travels through the log is a [`DomainEvent`]: a small
//! envelope carrying a globally unique `event_id` (the sole deduplication
//! key), the `aggregate_id` that determines partition placement, a typed
//! payload, and the creation timestamp. The envelope is serialized as JSON;
//! the payload enum is internally tagged so the `type` field doubles as the
//! event-type discriminator on the wire.
//!
//! Events are immutable facts. They are created once at the producing
//! service's boundary and travel through the log unmodified; under
//! redelivery the same `DomainEvent` may be observed more than once, which
//! is exactly what the idempotency guard exists to absorb.
//!
//! # Example
//!
//! ```
//! use eventline_core::event::{DomainEvent, EventPayload, OrderCreated};
//! use chrono::Utc;
//! use rust_decimal::Decimal;
//!
//! let event = DomainEvent::new(
//!     "order-42".to_string(),
//!     EventPayload::OrderCreated(OrderCreated {
//!         order_id: "order-42".to_string(),
//!         customer_id: "c1".to_string(),
//!         customer_email: "c1@example.com".to_string(),
//!         total_amount: Decimal::new(1000, 2),
//!         currency: "USD".to_string(),
//!     }),
//!     Utc::now(),
//! );
//!
//! let bytes = event.to_bytes()?;
//! let decoded = DomainEvent::from_bytes(&bytes)?;
//! assert_eq!(decoded.event_id, event.event_id);
//! # Ok::<(), eventline_core::event::EnvelopeError>(())
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while encoding or decoding an event envelope.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// The envelope could not be serialized to JSON.
    #[error("failed to serialize event {event_id}: {reason}")]
    Serialization {
        /// Event that failed to serialize.
        event_id: Uuid,
        /// Underlying serde error.
        reason: String,
    },

    /// The bytes on the wire are not a valid event envelope.
    ///
    /// This is a terminal condition for a delivered message: redelivering
    /// the same bytes cannot make them parse.
    #[error("failed to deserialize event envelope: {0}")]
    Deserialization(String),
}

/// A new order was accepted at the order service boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    /// Order aggregate id.
    pub order_id: String,
    /// Customer that placed the order.
    pub customer_id: String,
    /// Address for the confirmation notification.
    pub customer_email: String,
    /// Order total.
    pub total_amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
}

/// An order moved along its shipping lifecycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderShipped {
    /// Order aggregate id.
    pub order_id: String,
    /// Customer that placed the order.
    pub customer_id: String,
    /// Address for the shipping notification.
    pub customer_email: String,
    /// Status the order was in before the change.
    pub previous_status: u8,
    /// Status the order moved to.
    pub current_status: u8,
}

/// A new product was registered at the product service boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductCreated {
    /// Product aggregate id.
    pub product_id: String,
    /// Display name.
    pub product_name: String,
    /// Unit price.
    pub price: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Initial stock level.
    pub stock_quantity: u32,
}

/// Typed event payload.
///
/// Internally tagged: the JSON representation carries a `"type"` field with
/// the variant name and the payload fields inline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    /// See [`OrderCreated`].
    OrderCreated(OrderCreated),
    /// See [`OrderShipped`].
    OrderShipped(OrderShipped),
    /// See [`ProductCreated`].
    ProductCreated(ProductCreated),
}

impl EventPayload {
    /// Stable event-type discriminator, identical to the wire `type` tag.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::OrderCreated(_) => "OrderCreated",
            Self::OrderShipped(_) => "OrderShipped",
            Self::ProductCreated(_) => "ProductCreated",
        }
    }
}

/// The event envelope published to and consumed from the partitioned log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Globally unique id of this logical occurrence.
    ///
    /// This is the idempotency key: many physical deliveries may share one
    /// `event_id`, and at most one of them may apply the side effect.
    pub event_id: Uuid,

    /// Business entity key (order id, product id). All events sharing an
    /// `aggregate_id` land on the same partition and are therefore handled
    /// in publish order.
    pub aggregate_id: String,

    /// Typed payload.
    pub payload: EventPayload,

    /// When the producing service created the event.
    pub created_at: DateTime<Utc>,
}

impl DomainEvent {
    /// Create a new event with a fresh `event_id`.
    #[must_use]
    pub fn new(aggregate_id: String, payload: EventPayload, created_at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            payload,
            created_at,
        }
    }

    /// Event-type discriminator of the payload.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    /// Serialize the envelope to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Serialization`] if the envelope cannot be
    /// encoded, which only happens for non-string map keys and similar
    /// structural issues serde_json rejects.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|e| EnvelopeError::Serialization {
            event_id: self.event_id,
            reason: e.to_string(),
        })
    }

    /// Decode an envelope from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Deserialization`] if the bytes are not a
    /// valid envelope.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(|e| EnvelopeError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order_created() -> DomainEvent {
        DomainEvent::new(
            "order-1".to_string(),
            EventPayload::OrderCreated(OrderCreated {
                order_id: "order-1".to_string(),
                customer_id: "c1".to_string(),
                customer_email: "c1@x.com".to_string(),
                total_amount: Decimal::new(1000, 2),
                currency: "USD".to_string(),
            }),
            Utc::now(),
        )
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let event = order_created();
        let bytes = event.to_bytes().unwrap();
        let decoded = DomainEvent::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn wire_envelope_carries_type_tag() {
        let event = order_created();
        let json: serde_json::Value =
            serde_json::from_slice(&event.to_bytes().unwrap()).unwrap();
        assert_eq!(json["payload"]["type"], "OrderCreated");
        assert_eq!(json["payload"]["customer_id"], "c1");
        assert_eq!(json["aggregate_id"], "order-1");
    }

    #[test]
    fn garbage_bytes_are_a_deserialization_error() {
        let err = DomainEvent::from_bytes(b"not json").unwrap_err();
        assert!(matches!(err, EnvelopeError::Deserialization(_)));
    }

    #[test]
    fn event_type_matches_payload_variant() {
        let event = order_created();
        assert_eq!(event.event_type(), "OrderCreated");
    }
}
