//! Configuration management for the notification service.
//!
//! Loads configuration from environment variables with sensible local
//! defaults; `RUST_LOG` drives log filtering separately.

use eventline_core::topic;
use eventline_runtime::supervisor::RetryPolicy;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Kafka/Redpanda configuration.
    pub kafka: KafkaConfig,
    /// Redis configuration (reservation store).
    pub redis: RedisConfig,
    /// Local retry/backoff configuration.
    pub retry: RetryConfig,
    /// Consumer tuning.
    pub consumer: ConsumerConfig,
}

/// Kafka/Redpanda configuration.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Broker addresses (comma-separated).
    pub brokers: String,
    /// Primary consumer group id; dead-letter consumers use it suffixed
    /// `-dlq`.
    pub group_id: String,
    /// Partition count every topic is provisioned with.
    pub partitions: u32,
}

/// Redis configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
}

/// Local retry/backoff configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Fixed delay between attempts, in milliseconds.
    pub backoff_ms: u64,
}

/// Consumer tuning.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Worker tasks per topic (capped by the partition count).
    pub concurrency: u32,
    /// Records one poll may return.
    pub poll_batch: usize,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            kafka: KafkaConfig {
                brokers: env::var("KAFKA_BROKERS")
                    .unwrap_or_else(|_| "localhost:9092".to_string()),
                group_id: env::var("CONSUMER_GROUP")
                    .unwrap_or_else(|_| "notification-service".to_string()),
                partitions: env::var("TOPIC_PARTITIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            retry: RetryConfig {
                max_retries: env::var("HANDLER_MAX_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3),
                backoff_ms: env::var("HANDLER_BACKOFF_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            },
            consumer: ConsumerConfig {
                concurrency: env::var("CONSUMER_CONCURRENCY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3),
                poll_batch: env::var("POLL_BATCH")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(50),
            },
        }
    }

    /// The retry policy the dispatchers run.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            backoff: Duration::from_millis(self.retry.backoff_ms),
        }
    }

    /// The primary topics this service consumes.
    #[must_use]
    pub const fn primary_topics() -> [&'static str; 3] {
        [topic::ORDER_CREATED, topic::ORDER_SHIPPED, topic::PRODUCT_CREATED]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_pipeline_contract() {
        // Run without the env vars set: defaults apply.
        let config = Config::from_env();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.backoff_ms, 2000);
        assert_eq!(config.retry_policy().total_attempts(), 4);
    }
}
