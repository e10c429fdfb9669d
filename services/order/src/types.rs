//! Request/response types and the order status model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Order lifecycle status codes. The numeric values are part of the external
// contract with the upstream order management system.

/// The order was completed and paid.
pub const STATUS_ORDER_COMPLETED: u8 = 20;
/// The order is being shipped.
pub const STATUS_SHIPPING: u8 = 25;
/// The order was delivered.
pub const STATUS_DELIVERED: u8 = 80;

/// The only status transitions the service accepts.
///
/// Anything else is structurally invalid and is rejected before any event
/// is published; an invalid transition must never reach the retry or
/// dead-letter path, because retrying it cannot succeed.
pub const ALLOWED_TRANSITIONS: [(u8, u8); 2] = [
    (STATUS_ORDER_COMPLETED, STATUS_SHIPPING),
    (STATUS_SHIPPING, STATUS_DELIVERED),
];

/// Whether `(previous, current)` is an allowed status transition.
#[must_use]
pub fn transition_allowed(previous: u8, current: u8) -> bool {
    ALLOWED_TRANSITIONS.contains(&(previous, current))
}

/// Response status for a request whose event reached the log.
pub const STATUS_PUBLISHED: &str = "PUBLISHED";

/// Incoming create-order request.
#[derive(Clone, Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Customer placing the order.
    pub customer_id: String,
    /// Address for order notifications.
    pub customer_email: String,
    /// Order total.
    pub total_amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
}

/// Response to a successful create-order request.
#[derive(Clone, Debug, Serialize)]
pub struct CreateOrderResponse {
    /// Generated order id.
    pub order_id: String,
    /// Id of the published `OrderCreated` event.
    pub event_id: Uuid,
    /// Always [`STATUS_PUBLISHED`].
    pub status: &'static str,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
}

/// Incoming status-update request.
#[derive(Clone, Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    /// Customer that placed the order.
    pub customer_id: String,
    /// Address for the shipping notification.
    pub customer_email: String,
    /// Status the order is currently in.
    pub previous_status: u8,
    /// Status to move the order to.
    pub current_status: u8,
}

/// Response to a successful status-update request.
#[derive(Clone, Debug, Serialize)]
pub struct UpdateOrderStatusResponse {
    /// Order the status change applies to.
    pub order_id: String,
    /// Id of the published `OrderShipped` event.
    pub event_id: Uuid,
    /// Status the order was in before the change.
    pub previous_status: u8,
    /// Status the order moved to.
    pub current_status: u8,
    /// Always [`STATUS_PUBLISHED`].
    pub status: &'static str,
    /// When the status changed.
    pub changed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_two_listed_transitions_are_allowed() {
        assert!(transition_allowed(20, 25));
        assert!(transition_allowed(25, 80));

        assert!(!transition_allowed(20, 80));
        assert!(!transition_allowed(80, 25));
        assert!(!transition_allowed(25, 20));
        assert!(!transition_allowed(20, 20));
    }
}
