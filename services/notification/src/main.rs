//! Notification service composition root.
//!
//! Assembles the whole consumer side once at process start: the
//! Kafka-compatible log, the Redis reservation store, the idempotency
//! guard, the business handlers, and one dispatcher per topic: three for
//! the primary topics and three for their dead-letter siblings (under the
//! `-dlq` consumer group, so triage never competes with primary
//! consumption).

use eventline_core::clock::SystemClock;
use eventline_core::log::PartitionedLog;
use eventline_core::topic;
use eventline_redpanda::RedpandaLog;
use eventline_runtime::dispatcher::ConsumerDispatcher;
use eventline_runtime::idempotency::IdempotencyGuard;
use eventline_runtime::supervisor::RetryPolicy;
use notification_service::{
    Config, DeadLetterLogHandler, LogNotificationSender, NotificationService, OrderCreatedHandler,
    OrderShippedHandler, ProductCreatedHandler, RedisReservationStore,
};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notification_service=info,eventline_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        brokers = %config.kafka.brokers,
        group = %config.kafka.group_id,
        partitions = config.kafka.partitions,
        redis = %config.redis.url,
        "Starting notification service"
    );

    // Shared collaborators, assembled once.
    let store = RedisReservationStore::connect(&config.redis.url).await?;
    let guard = IdempotencyGuard::new(Arc::new(store));

    let mut log_builder = RedpandaLog::builder().brokers(&config.kafka.brokers);
    for primary in Config::primary_topics() {
        log_builder = log_builder
            .topic(primary, config.kafka.partitions)
            .topic(topic::dlq_topic(primary), config.kafka.partitions);
    }
    let log: Arc<dyn PartitionedLog> = Arc::new(log_builder.build()?);

    let clock = Arc::new(SystemClock);
    let service = Arc::new(NotificationService::new(
        guard,
        Arc::new(LogNotificationSender),
        clock.clone(),
    ));

    let (shutdown_tx, _) = broadcast::channel(1);
    let mut dispatchers = Vec::new();

    // Primary consumers: guard protocol + retry + dead-letter escalation.
    let group = config.kafka.group_id.clone();
    let policy = config.retry_policy();
    let primaries: [(&str, Arc<dyn eventline_core::handler::EventHandler>); 3] = [
        (topic::ORDER_CREATED, Arc::new(OrderCreatedHandler::new(service.clone()))),
        (topic::ORDER_SHIPPED, Arc::new(OrderShippedHandler::new(service.clone()))),
        (topic::PRODUCT_CREATED, Arc::new(ProductCreatedHandler::new(service.clone()))),
    ];
    for (topic_name, handler) in primaries {
        let dispatcher = ConsumerDispatcher::new(
            group.clone(),
            topic_name,
            Arc::clone(&log),
            handler,
            shutdown_tx.subscribe(),
        )
        .with_policy(policy)
        .with_poll_batch(config.consumer.poll_batch)
        .with_workers(config.consumer.concurrency);
        dispatchers.push(dispatcher.spawn());
    }

    // Dead-letter consumers: log-and-triage only, no retry budget.
    let dlq_group = topic::dlq_group(&config.kafka.group_id);
    for primary in Config::primary_topics() {
        let handler = Arc::new(DeadLetterLogHandler::new(clock.clone()));
        let dispatcher = ConsumerDispatcher::new(
            dlq_group.clone(),
            topic::dlq_topic(primary),
            Arc::clone(&log),
            handler,
            shutdown_tx.subscribe(),
        )
        .with_policy(RetryPolicy { max_retries: 0, ..RetryPolicy::default() })
        .with_workers(1);
        dispatchers.push(dispatcher.spawn());
    }

    info!(dispatchers = dispatchers.len(), "Notification service running");

    signal::ctrl_c().await?;
    info!("Shutdown signal received, draining in-flight work");
    drop(shutdown_tx.send(()));

    for dispatcher in dispatchers {
        if let Err(e) = dispatcher.await {
            tracing::error!(error = %e, "Dispatcher task failed during shutdown");
        }
    }

    info!("Notification service stopped");
    Ok(())
}
