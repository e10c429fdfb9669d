//! Product service composition root.

use eventline_core::clock::SystemClock;
use eventline_core::log::PartitionedLog;
use eventline_core::topic;
use eventline_redpanda::RedpandaLog;
use eventline_runtime::EventPublisher;
use product_service::{CreateProductRequest, ProductService};
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
                .unwrap_or_else(|_| "product_service=info,eventline_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let brokers = env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
    let partitions: u32 = env::var("TOPIC_PARTITIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3);

    info!(brokers = %brokers, partitions, "Starting product service");

    let log: Arc<dyn PartitionedLog> = Arc::new(
        RedpandaLog::builder()
            .brokers(&brokers)
            .topic(topic::PRODUCT_CREATED, partitions)
            .build()?,
    );
    let service = ProductService::new(EventPublisher::new(log), Arc::new(SystemClock));

    let created = service
        .create_product(CreateProductRequest {
            product_name: "Mechanical Keyboard".to_string(),
            price: Decimal::new(12900, 2),
            currency: "USD".to_string(),
            stock_quantity: 25,
        })
        .await?;
    info!(product_id = %created.product_id, event_id = %created.event_id, "Product accepted");

    Ok(())
}
