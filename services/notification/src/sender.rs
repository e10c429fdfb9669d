//! Notification side-effect collaborator.
//!
//! The [`NotificationSender`] trait is the seam between the idempotency
//! protocol and the actual delivery channel; tests substitute a recording
//! implementation to count side effects. The production implementation
//! logs the notification (a stand-in for an email/SMS gateway) and keeps
//! the original system's outage simulation: customer ids and product names
//! prefixed `fail-` always fail transiently, which is how the retry and
//! dead-letter paths are exercised end to end.

use eventline_core::event::{OrderCreated, OrderShipped, ProductCreated};
use eventline_core::handler::HandlerError;
use uuid::Uuid;

/// Prefix that simulates a downstream outage for demo and test traffic.
pub const FAILURE_PREFIX: &str = "fail-";

/// Delivery channel for notifications.
pub trait NotificationSender: Send + Sync {
    /// Send the order confirmation for an `OrderCreated` event.
    ///
    /// # Errors
    ///
    /// [`HandlerError::Transient`] when the downstream channel is
    /// unavailable.
    fn send_order_confirmation(
        &self,
        event_id: Uuid,
        event: &OrderCreated,
    ) -> Result<(), HandlerError>;

    /// Send the shipping update for an `OrderShipped` event.
    ///
    /// # Errors
    ///
    /// [`HandlerError::Transient`] when the downstream channel is
    /// unavailable.
    fn send_order_shipping_update(
        &self,
        event_id: Uuid,
        event: &OrderShipped,
    ) -> Result<(), HandlerError>;

    /// Send the creation notice for a `ProductCreated` event.
    ///
    /// # Errors
    ///
    /// [`HandlerError::Transient`] when the downstream channel is
    /// unavailable.
    fn send_product_creation_notice(
        &self,
        event_id: Uuid,
        event: &ProductCreated,
    ) -> Result<(), HandlerError>;
}

/// Log-backed sender used in production wiring.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSender;

impl NotificationSender for LogNotificationSender {
    fn send_order_confirmation(
        &self,
        event_id: Uuid,
        event: &OrderCreated,
    ) -> Result<(), HandlerError> {
        if event.customer_id.starts_with(FAILURE_PREFIX) {
            tracing::error!(
                event_id = %event_id,
                customer_id = %event.customer_id,
                "Simulating downstream failure"
            );
            return Err(HandlerError::Transient(format!(
                "simulated downstream failure for customer_id={}",
                event.customer_id
            )));
        }

        tracing::info!(
            event_id = %event_id,
            order_id = %event.order_id,
            customer_email = %event.customer_email,
            amount = %event.total_amount,
            currency = %event.currency,
            "Notification sent"
        );
        Ok(())
    }

    fn send_order_shipping_update(
        &self,
        event_id: Uuid,
        event: &OrderShipped,
    ) -> Result<(), HandlerError> {
        if event.customer_id.starts_with(FAILURE_PREFIX) {
            return Err(HandlerError::Transient(format!(
                "simulated downstream failure for customer_id={}",
                event.customer_id
            )));
        }

        tracing::info!(
            event_id = %event_id,
            order_id = %event.order_id,
            customer_email = %event.customer_email,
            previous_status = event.previous_status,
            current_status = event.current_status,
            "Shipping notification sent"
        );
        Ok(())
    }

    fn send_product_creation_notice(
        &self,
        event_id: Uuid,
        event: &ProductCreated,
    ) -> Result<(), HandlerError> {
        if event.product_name.starts_with(FAILURE_PREFIX) {
            return Err(HandlerError::Transient(format!(
                "simulated downstream failure for product_name={}",
                event.product_name
            )));
        }

        tracing::info!(
            event_id = %event_id,
            product_id = %event.product_id,
            product_name = %event.product_name,
            price = %event.price,
            currency = %event.currency,
            "Product creation notification sent"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn fail_prefix_simulates_a_transient_outage() {
        let sender = LogNotificationSender;
        let event = OrderCreated {
            order_id: "order-1".to_string(),
            customer_id: "fail-c1".to_string(),
            customer_email: "c1@x.com".to_string(),
            total_amount: Decimal::new(1000, 2),
            currency: "USD".to_string(),
        };

        let err = sender
            .send_order_confirmation(Uuid::new_v4(), &event)
            .expect_err("fail- customer must fail");
        assert!(err.is_transient());
    }
}
