//! Order service composition root.
//!
//! Wires the Kafka-compatible log and the publisher once at process start
//! and drives a demo request through the service. The HTTP boundary that
//! normally fronts these operations lives outside this repository.

use eventline_core::clock::SystemClock;
use eventline_core::log::PartitionedLog;
use eventline_core::topic;
use eventline_redpanda::RedpandaLog;
use eventline_runtime::EventPublisher;
use order_service::{CreateOrderRequest, OrderService, UpdateOrderStatusRequest};
use rust_decimal::Decimal;
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "order_service=info,eventline_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let brokers = env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
    let partitions: u32 = env::var("TOPIC_PARTITIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3);

    info!(brokers = %brokers, partitions, "Starting order service");

    let log: Arc<dyn PartitionedLog> = Arc::new(
        RedpandaLog::builder()
            .brokers(&brokers)
            .topic(topic::ORDER_CREATED, partitions)
            .topic(topic::ORDER_SHIPPED, partitions)
            .build()?,
    );
    let service = OrderService::new(EventPublisher::new(log), Arc::new(SystemClock));

    // Demo traffic: one order through its full lifecycle.
    let created = service
        .create_order(CreateOrderRequest {
            customer_id: "c1".to_string(),
            customer_email: "c1@example.com".to_string(),
            total_amount: Decimal::new(1000, 2),
            currency: "USD".to_string(),
        })
        .await?;
    info!(order_id = %created.order_id, event_id = %created.event_id, "Order accepted");

    let shipped = service
        .update_order_status(
            &created.order_id,
            UpdateOrderStatusRequest {
                customer_id: "c1".to_string(),
                customer_email: "c1@example.com".to_string(),
                previous_status: 20,
                current_status: 25,
            },
        )
        .await?;
    info!(order_id = %shipped.order_id, event_id = %shipped.event_id, "Order marked as shipping");

    Ok(())
}
