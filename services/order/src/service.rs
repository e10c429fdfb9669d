//! Order service operations.

use crate::types::{
    transition_allowed, CreateOrderRequest, CreateOrderResponse, UpdateOrderStatusRequest,
    UpdateOrderStatusResponse, STATUS_PUBLISHED,
};
use eventline_core::clock::Clock;
use eventline_core::event::{DomainEvent, EventPayload, OrderCreated, OrderShipped};
use eventline_core::topic;
use eventline_runtime::publisher::{EventPublisher, PublishError};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors the order service surfaces to its boundary.
///
/// `Validation` and `InvalidTransition` are rejected before any event is
/// published; `Publish` means the append could not be completed and the
/// caller should treat the request as not accepted (HTTP 503 at the
/// boundary).
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The request is malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requested status change is not on the allow-list.
    #[error("invalid order status transition: {0}")]
    InvalidTransition(String),

    /// The event could not be published.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Order producer service.
pub struct OrderService {
    publisher: EventPublisher,
    clock: Arc<dyn Clock>,
}

impl OrderService {
    /// Create the service over a publisher and a clock.
    #[must_use]
    pub fn new(publisher: EventPublisher, clock: Arc<dyn Clock>) -> Self {
        Self { publisher, clock }
    }

    /// Accept a new order and publish its `OrderCreated` event.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for malformed input (nothing is
    /// published); [`ServiceError::Publish`] if the append fails.
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<CreateOrderResponse, ServiceError> {
        validate_create_order(&request)?;

        let order_id = Uuid::new_v4().to_string();
        let created_at = self.clock.now();
        let event = DomainEvent::new(
            order_id.clone(),
            EventPayload::OrderCreated(OrderCreated {
                order_id: order_id.clone(),
                customer_id: request.customer_id,
                customer_email: request.customer_email,
                total_amount: request.total_amount,
                currency: request.currency,
            }),
            created_at,
        );
        let event_id = event.event_id;

        self.publisher.publish(topic::ORDER_CREATED, &event).await?;
        tracing::info!(
            order_id = %order_id,
            event_id = %event_id,
            "Order created and event published"
        );

        Ok(CreateOrderResponse {
            order_id,
            event_id,
            status: STATUS_PUBLISHED,
            created_at,
        })
    }

    /// Move an order along its shipping lifecycle and publish the
    /// `OrderShipped` event.
    ///
    /// Only the transitions 20→25 (shipping) and 25→80 (delivered) are
    /// accepted; anything else is rejected here, before any event exists,
    /// so a structurally invalid request can never enter the retry or
    /// dead-letter path.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for malformed input,
    /// [`ServiceError::InvalidTransition`] for a transition off the
    /// allow-list, [`ServiceError::Publish`] if the append fails.
    pub async fn update_order_status(
        &self,
        order_id: &str,
        request: UpdateOrderStatusRequest,
    ) -> Result<UpdateOrderStatusResponse, ServiceError> {
        validate_update_status(order_id, &request)?;

        if !transition_allowed(request.previous_status, request.current_status) {
            return Err(ServiceError::InvalidTransition(format!(
                "only 20->25 (shipping) and 25->80 (delivered) are supported, requested={}->{}",
                request.previous_status, request.current_status
            )));
        }

        let changed_at = self.clock.now();
        let event = DomainEvent::new(
            order_id.to_string(),
            EventPayload::OrderShipped(OrderShipped {
                order_id: order_id.to_string(),
                customer_id: request.customer_id,
                customer_email: request.customer_email,
                previous_status: request.previous_status,
                current_status: request.current_status,
            }),
            changed_at,
        );
        let event_id = event.event_id;

        self.publisher.publish(topic::ORDER_SHIPPED, &event).await?;
        tracing::info!(
            order_id = %order_id,
            event_id = %event_id,
            previous_status = request.previous_status,
            current_status = request.current_status,
            "Order status changed and shipped event published"
        );

        Ok(UpdateOrderStatusResponse {
            order_id: order_id.to_string(),
            event_id,
            previous_status: request.previous_status,
            current_status: request.current_status,
            status: STATUS_PUBLISHED,
            changed_at,
        })
    }
}

fn validate_create_order(request: &CreateOrderRequest) -> Result<(), ServiceError> {
    if request.customer_id.trim().is_empty() {
        return Err(ServiceError::Validation("customer_id must not be blank".to_string()));
    }
    if !request.customer_email.contains('@') {
        return Err(ServiceError::Validation(
            "customer_email must be a valid email address".to_string(),
        ));
    }
    if request.total_amount.is_sign_negative() || request.total_amount.is_zero() {
        return Err(ServiceError::Validation("total_amount must be positive".to_string()));
    }
    if request.currency.len() != 3 {
        return Err(ServiceError::Validation(
            "currency must be a 3-letter ISO 4217 code".to_string(),
        ));
    }
    Ok(())
}

fn validate_update_status(
    order_id: &str,
    request: &UpdateOrderStatusRequest,
) -> Result<(), ServiceError> {
    if order_id.trim().is_empty() {
        return Err(ServiceError::Validation("order_id must not be blank".to_string()));
    }
    if request.customer_id.trim().is_empty() {
        return Err(ServiceError::Validation("customer_id must not be blank".to_string()));
    }
    if !request.customer_email.contains('@') {
        return Err(ServiceError::Validation(
            "customer_email must be a valid email address".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use eventline_core::log::PartitionedLog;
    use eventline_core::partition::partition_for_key;
    use eventline_testing::{test_clock, InMemoryLog};
    use rust_decimal::Decimal;

    fn service(log: Arc<InMemoryLog>) -> OrderService {
        OrderService::new(
            EventPublisher::new(log as Arc<dyn PartitionedLog>),
            Arc::new(test_clock()),
        )
    }

    fn order_log() -> Arc<InMemoryLog> {
        Arc::new(InMemoryLog::new(&[
            (topic::ORDER_CREATED, 3),
            (topic::ORDER_SHIPPED, 3),
        ]))
    }

    fn create_request() -> CreateOrderRequest {
        CreateOrderRequest {
            customer_id: "c1".to_string(),
            customer_email: "c1@x.com".to_string(),
            total_amount: Decimal::new(1000, 2),
            currency: "USD".to_string(),
        }
    }

    fn status_request(previous: u8, current: u8) -> UpdateOrderStatusRequest {
        UpdateOrderStatusRequest {
            customer_id: "c1".to_string(),
            customer_email: "c1@x.com".to_string(),
            previous_status: previous,
            current_status: current,
        }
    }

    #[tokio::test]
    async fn create_order_publishes_and_responds_published() {
        let log = order_log();
        let response = service(Arc::clone(&log)).create_order(create_request()).await.unwrap();

        assert_eq!(response.status, "PUBLISHED");
        assert_eq!(log.record_count(topic::ORDER_CREATED), 1);

        // Keyed by the generated order id.
        let partition = partition_for_key(&response.order_id, 3);
        let records = log.records(topic::ORDER_CREATED, partition);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].coordinate.key, response.order_id);
    }

    #[tokio::test]
    async fn invalid_input_publishes_nothing() {
        let log = order_log();
        let svc = service(Arc::clone(&log));

        let mut request = create_request();
        request.customer_email = "not-an-email".to_string();
        let err = svc.create_order(request).await.unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(log.record_count(topic::ORDER_CREATED), 0);
    }

    #[tokio::test]
    async fn allowed_transitions_publish_shipped_events() {
        let log = order_log();
        let svc = service(Arc::clone(&log));

        let shipping = svc
            .update_order_status("order-1", status_request(20, 25))
            .await
            .unwrap();
        assert_eq!(shipping.status, "PUBLISHED");
        assert_eq!(shipping.current_status, 25);

        let delivered = svc
            .update_order_status("order-1", status_request(25, 80))
            .await
            .unwrap();
        assert_eq!(delivered.current_status, 80);

        assert_eq!(log.record_count(topic::ORDER_SHIPPED), 2);
    }

    #[tokio::test]
    async fn transitions_off_the_allow_list_are_rejected_without_publishing() {
        let log = order_log();
        let svc = service(Arc::clone(&log));

        for (previous, current) in [(20, 80), (80, 25), (20, 90)] {
            let err = svc
                .update_order_status("order-1", status_request(previous, current))
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::InvalidTransition(_)));
        }
        assert_eq!(log.record_count(topic::ORDER_SHIPPED), 0);
    }

    #[tokio::test]
    async fn publish_failure_surfaces_synchronously() {
        // Topic not provisioned: the append fails and the caller sees it.
        let log = Arc::new(InMemoryLog::new(&[(topic::ORDER_SHIPPED, 3)]));
        let err = service(log).create_order(create_request()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Publish(_)));
    }
}
