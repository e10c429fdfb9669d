//! Product service operations.

use chrono::{DateTime, Utc};
use eventline_core::clock::Clock;
use eventline_core::event::{DomainEvent, EventPayload, ProductCreated};
use eventline_core::topic;
use eventline_runtime::publisher::{EventPublisher, PublishError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Response status for a request whose event reached the log.
pub const STATUS_PUBLISHED: &str = "PUBLISHED";

/// Errors the product service surfaces to its boundary.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The request is malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The event could not be published.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Incoming create-product request.
#[derive(Clone, Debug, Deserialize)]
pub struct CreateProductRequest {
    /// Display name.
    pub product_name: String,
    /// Unit price.
    pub price: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Initial stock level.
    pub stock_quantity: u32,
}

/// Response to a successful create-product request.
#[derive(Clone, Debug, Serialize)]
pub struct CreateProductResponse {
    /// Generated product id.
    pub product_id: String,
    /// Id of the published `ProductCreated` event.
    pub event_id: Uuid,
    /// Always [`STATUS_PUBLISHED`].
    pub status: &'static str,
    /// When the product was created.
    pub created_at: DateTime<Utc>,
}

/// Product producer service.
pub struct ProductService {
    publisher: EventPublisher,
    clock: Arc<dyn Clock>,
}

impl ProductService {
    /// Create the service over a publisher and a clock.
    #[must_use]
    pub fn new(publisher: EventPublisher, clock: Arc<dyn Clock>) -> Self {
        Self { publisher, clock }
    }

    /// Register a new product and publish its `ProductCreated` event.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for malformed input (nothing is
    /// published); [`ServiceError::Publish`] if the append fails.
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<CreateProductResponse, ServiceError> {
        validate(&request)?;

        let product_id = Uuid::new_v4().to_string();
        let created_at = self.clock.now();
        let event = DomainEvent::new(
            product_id.clone(),
            EventPayload::ProductCreated(ProductCreated {
                product_id: product_id.clone(),
                product_name: request.product_name,
                price: request.price,
                currency: request.currency,
                stock_quantity: request.stock_quantity,
            }),
            created_at,
        );
        let event_id = event.event_id;

        self.publisher.publish(topic::PRODUCT_CREATED, &event).await?;
        tracing::info!(
            product_id = %product_id,
            event_id = %event_id,
            "Product created and event published"
        );

        Ok(CreateProductResponse {
            product_id,
            event_id,
            status: STATUS_PUBLISHED,
            created_at,
        })
    }
}

fn validate(request: &CreateProductRequest) -> Result<(), ServiceError> {
    if request.product_name.trim().is_empty() {
        return Err(ServiceError::Validation("product_name must not be blank".to_string()));
    }
    if request.price.is_sign_negative() || request.price.is_zero() {
        return Err(ServiceError::Validation("price must be positive".to_string()));
    }
    if request.currency.len() != 3 {
        return Err(ServiceError::Validation(
            "currency must be a 3-letter ISO 4217 code".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use eventline_core::log::PartitionedLog;
    use eventline_testing::{test_clock, InMemoryLog};

    fn service(log: Arc<InMemoryLog>) -> ProductService {
        ProductService::new(
            EventPublisher::new(log as Arc<dyn PartitionedLog>),
            Arc::new(test_clock()),
        )
    }

    fn request() -> CreateProductRequest {
        CreateProductRequest {
            product_name: "Keyboard".to_string(),
            price: Decimal::new(4999, 2),
            currency: "USD".to_string(),
            stock_quantity: 10,
        }
    }

    #[tokio::test]
    async fn create_product_publishes_and_responds_published() {
        let log = Arc::new(InMemoryLog::new(&[(topic::PRODUCT_CREATED, 3)]));
        let response = service(Arc::clone(&log)).create_product(request()).await.unwrap();

        assert_eq!(response.status, "PUBLISHED");
        assert_eq!(log.record_count(topic::PRODUCT_CREATED), 1);
    }

    #[tokio::test]
    async fn invalid_price_publishes_nothing() {
        let log = Arc::new(InMemoryLog::new(&[(topic::PRODUCT_CREATED, 3)]));
        let svc = service(Arc::clone(&log));

        let mut bad = request();
        bad.price = Decimal::ZERO;
        let err = svc.create_product(bad).await.unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(log.record_count(topic::PRODUCT_CREATED), 0);
    }
}
