//! Business handlers: the idempotency guard protocol around notification
//! side effects.
//!
//! [`NotificationService`] implements the protocol once per event type,
//! mirroring the shape the supervisor expects:
//!
//! 1. Reserve the event id. A lost reservation means another delivery
//!    already processed (or is processing) this event: report
//!    `Duplicate` and skip the side effect.
//! 2. Run the side effect through the [`NotificationSender`].
//! 3. On success, keep the reservation (the TTL bounds the dedup window).
//! 4. On *transient* failure, release the reservation before propagating so
//!    the retry (or a redelivery) may re-attempt. Terminal failures keep
//!    the reservation; re-running them cannot succeed.
//!
//! The thin [`EventHandler`] wrappers decode the envelope (an undecodable
//! record is terminal) and route to the matching protocol method. The
//! [`DeadLetterLogHandler`] consumes `-dlq` topics and records dead letters
//! at error severity for manual triage; nothing is replayed automatically.

use crate::sender::NotificationSender;
use async_trait::async_trait;
use eventline_core::clock::Clock;
use eventline_core::event::{DomainEvent, EventPayload};
use eventline_core::handler::{EventHandler, HandlerError, ProcessingOutcome, ProcessingReport};
use eventline_core::log::Delivery;
use eventline_runtime::idempotency::IdempotencyGuard;
use eventline_runtime::supervisor::DeadLetterRecord;
use std::sync::Arc;
use uuid::Uuid;

/// Guard-protocol implementation shared by the per-topic handlers.
pub struct NotificationService {
    guard: IdempotencyGuard,
    sender: Arc<dyn NotificationSender>,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    /// Create the service over its collaborators.
    #[must_use]
    pub fn new(
        guard: IdempotencyGuard,
        sender: Arc<dyn NotificationSender>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { guard, sender, clock }
    }

    /// Process an `OrderCreated` event.
    ///
    /// # Errors
    ///
    /// Propagates sender and store failures; see the module protocol notes.
    pub async fn process_order_created(
        &self,
        event: &DomainEvent,
    ) -> Result<ProcessingReport, HandlerError> {
        let EventPayload::OrderCreated(payload) = &event.payload else {
            return Err(unexpected_payload(event, "OrderCreated"));
        };

        if !self.guard.reserve(event.event_id).await? {
            tracing::info!(
                event_id = %event.event_id,
                order_id = %payload.order_id,
                "Duplicate event ignored"
            );
            return Ok(self.report(event.event_id, &payload.order_id, ProcessingOutcome::Duplicate));
        }

        match self.sender.send_order_confirmation(event.event_id, payload) {
            Ok(()) => Ok(self.report(event.event_id, &payload.order_id, ProcessingOutcome::Sent)),
            Err(error) => {
                self.release_for_retry(event.event_id, &error).await;
                Err(error)
            }
        }
    }

    /// Process an `OrderShipped` event.
    ///
    /// # Errors
    ///
    /// Propagates sender and store failures; see the module protocol notes.
    pub async fn process_order_shipped(
        &self,
        event: &DomainEvent,
    ) -> Result<ProcessingReport, HandlerError> {
        let EventPayload::OrderShipped(payload) = &event.payload else {
            return Err(unexpected_payload(event, "OrderShipped"));
        };

        if !self.guard.reserve(event.event_id).await? {
            tracing::info!(
                event_id = %event.event_id,
                order_id = %payload.order_id,
                "Duplicate shipped event ignored"
            );
            return Ok(self.report(event.event_id, &payload.order_id, ProcessingOutcome::Duplicate));
        }

        match self.sender.send_order_shipping_update(event.event_id, payload) {
            Ok(()) => Ok(self.report(event.event_id, &payload.order_id, ProcessingOutcome::Sent)),
            Err(error) => {
                self.release_for_retry(event.event_id, &error).await;
                Err(error)
            }
        }
    }

    /// Process a `ProductCreated` event.
    ///
    /// # Errors
    ///
    /// Propagates sender and store failures; see the module protocol notes.
    pub async fn process_product_created(
        &self,
        event: &DomainEvent,
    ) -> Result<ProcessingReport, HandlerError> {
        let EventPayload::ProductCreated(payload) = &event.payload else {
            return Err(unexpected_payload(event, "ProductCreated"));
        };

        if !self.guard.reserve(event.event_id).await? {
            tracing::info!(
                event_id = %event.event_id,
                product_id = %payload.product_id,
                "Duplicate product event ignored"
            );
            return Ok(self.report(
                event.event_id,
                &payload.product_id,
                ProcessingOutcome::Duplicate,
            ));
        }

        match self.sender.send_product_creation_notice(event.event_id, payload) {
            Ok(()) => Ok(self.report(event.event_id, &payload.product_id, ProcessingOutcome::Sent)),
            Err(error) => {
                self.release_for_retry(event.event_id, &error).await;
                Err(error)
            }
        }
    }

    /// Release the reservation after a transient failure so a later attempt
    /// may re-run the side effect. Terminal failures keep the reservation.
    async fn release_for_retry(&self, event_id: Uuid, error: &HandlerError) {
        if !error.is_transient() {
            return;
        }
        if let Err(release_error) = self.guard.release(event_id).await {
            // The reservation now outlives the failure; the TTL will clear
            // it eventually, but retries until then are suppressed.
            tracing::warn!(
                event_id = %event_id,
                error = %release_error,
                "Failed to release reservation after transient failure"
            );
        }
    }

    fn report(&self, event_id: Uuid, subject_id: &str, outcome: ProcessingOutcome) -> ProcessingReport {
        let detail = match outcome {
            ProcessingOutcome::Sent => "Notification sent",
            ProcessingOutcome::Duplicate => "Already processed",
        };
        ProcessingReport {
            event_id,
            subject_id: subject_id.to_string(),
            outcome,
            detail: detail.to_string(),
            processed_at: self.clock.now(),
        }
    }
}

fn unexpected_payload(event: &DomainEvent, expected: &str) -> HandlerError {
    HandlerError::Terminal(format!(
        "expected {expected} payload, got {} (event_id={})",
        event.event_type(),
        event.event_id
    ))
}

/// Handler for the `order-created` topic.
pub struct OrderCreatedHandler {
    service: Arc<NotificationService>,
}

impl OrderCreatedHandler {
    /// Wrap the shared notification service.
    #[must_use]
    pub fn new(service: Arc<NotificationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for OrderCreatedHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<ProcessingReport, HandlerError> {
        let event = DomainEvent::from_bytes(&delivery.payload)?;
        self.service.process_order_created(&event).await
    }
}

/// Handler for the `order-shipped` topic.
pub struct OrderShippedHandler {
    service: Arc<NotificationService>,
}

impl OrderShippedHandler {
    /// Wrap the shared notification service.
    #[must_use]
    pub fn new(service: Arc<NotificationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for OrderShippedHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<ProcessingReport, HandlerError> {
        let event = DomainEvent::from_bytes(&delivery.payload)?;
        self.service.process_order_shipped(&event).await
    }
}

/// Handler for the `product-created` topic.
pub struct ProductCreatedHandler {
    service: Arc<NotificationService>,
}

impl ProductCreatedHandler {
    /// Wrap the shared notification service.
    #[must_use]
    pub fn new(service: Arc<NotificationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for ProductCreatedHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<ProcessingReport, HandlerError> {
        let event = DomainEvent::from_bytes(&delivery.payload)?;
        self.service.process_product_created(&event).await
    }
}

/// Handler for `-dlq` topics: records dead letters for manual triage.
///
/// Dead letters are never replayed automatically. In a full deployment the
/// error log feeds the alerting pipeline (Slack/PagerDuty); reprocessing is
/// an operator decision.
pub struct DeadLetterLogHandler {
    clock: Arc<dyn Clock>,
}

impl DeadLetterLogHandler {
    /// Create the triage handler.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl EventHandler for DeadLetterLogHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<ProcessingReport, HandlerError> {
        let record: DeadLetterRecord =
            serde_json::from_slice(&delivery.payload).map_err(|e| {
                HandlerError::Terminal(format!("dead-letter record did not decode: {e}"))
            })?;

        let event_id = record.event_id().unwrap_or_else(Uuid::nil);
        let subject_id = record.aggregate_id().unwrap_or_default().to_string();

        tracing::error!(
            topic = %delivery.coordinate.topic,
            partition = delivery.coordinate.partition,
            offset = delivery.coordinate.offset,
            event_id = %event_id,
            aggregate_id = %subject_id,
            original_partition = record.original_partition,
            original_offset = record.original_offset,
            attempt_count = record.attempt_count,
            failure_reason = %record.failure_reason,
            "DLQ event received"
        );

        Ok(ProcessingReport {
            event_id,
            subject_id,
            outcome: ProcessingOutcome::Sent,
            detail: "Dead letter recorded for manual triage".to_string(),
            processed_at: self.clock.now(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use eventline_core::event::{OrderCreated, OrderShipped, ProductCreated};
    use eventline_runtime::idempotency::RESERVATION_KEY_PREFIX;
    use eventline_testing::{test_clock, InMemoryReservationStore};
    use rust_decimal::Decimal;

    /// Sender whose order-confirmation path fails with a configured error.
    struct StubSender {
        confirmation_failure: Option<fn(String) -> HandlerError>,
    }

    impl NotificationSender for StubSender {
        fn send_order_confirmation(
            &self,
            _event_id: Uuid,
            event: &OrderCreated,
        ) -> Result<(), HandlerError> {
            match self.confirmation_failure {
                Some(make) => Err(make(format!("stubbed failure for {}", event.order_id))),
                None => Ok(()),
            }
        }

        fn send_order_shipping_update(
            &self,
            _event_id: Uuid,
            _event: &OrderShipped,
        ) -> Result<(), HandlerError> {
            Ok(())
        }

        fn send_product_creation_notice(
            &self,
            _event_id: Uuid,
            _event: &ProductCreated,
        ) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    fn order_created_event() -> DomainEvent {
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

    fn service_with(
        store: Arc<InMemoryReservationStore>,
        confirmation_failure: Option<fn(String) -> HandlerError>,
    ) -> NotificationService {
        NotificationService::new(
            IdempotencyGuard::new(store),
            Arc::new(StubSender { confirmation_failure }),
            Arc::new(test_clock()),
        )
    }

    fn reservation_key(event: &DomainEvent) -> String {
        format!("{RESERVATION_KEY_PREFIX}{}", event.event_id)
    }

    #[tokio::test]
    async fn first_processing_sends_and_keeps_the_reservation() {
        let store = Arc::new(InMemoryReservationStore::new());
        let service = service_with(Arc::clone(&store), None);
        let event = order_created_event();

        let report = service.process_order_created(&event).await.unwrap();
        assert_eq!(report.outcome, ProcessingOutcome::Sent);
        assert_eq!(report.detail, "Notification sent");
        assert!(store.contains(&reservation_key(&event)));
    }

    #[tokio::test]
    async fn second_processing_is_a_duplicate_skip() {
        let store = Arc::new(InMemoryReservationStore::new());
        let service = service_with(store, None);
        let event = order_created_event();

        service.process_order_created(&event).await.unwrap();
        let report = service.process_order_created(&event).await.unwrap();

        assert_eq!(report.outcome, ProcessingOutcome::Duplicate);
        assert_eq!(report.detail, "Already processed");
    }

    #[tokio::test]
    async fn transient_failure_releases_the_reservation() {
        let store = Arc::new(InMemoryReservationStore::new());
        let service = service_with(Arc::clone(&store), Some(HandlerError::Transient));
        let event = order_created_event();

        let err = service.process_order_created(&event).await.unwrap_err();
        assert!(err.is_transient());
        // Released: a retry or redelivery may re-attempt the side effect.
        assert!(!store.contains(&reservation_key(&event)));
    }

    #[tokio::test]
    async fn terminal_failure_keeps_the_reservation() {
        let store = Arc::new(InMemoryReservationStore::new());
        let service = service_with(Arc::clone(&store), Some(HandlerError::Terminal));
        let event = order_created_event();

        let err = service.process_order_created(&event).await.unwrap_err();
        assert!(!err.is_transient());
        // Kept: re-running a structurally broken message cannot succeed.
        assert!(store.contains(&reservation_key(&event)));
    }

    #[tokio::test]
    async fn mismatched_payload_type_is_terminal() {
        let store = Arc::new(InMemoryReservationStore::new());
        let service = service_with(store, None);
        let event = order_created_event();

        let err = service.process_order_shipped(&event).await.unwrap_err();
        assert!(matches!(err, HandlerError::Terminal(_)));
    }
}
