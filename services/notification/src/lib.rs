//! Notification consumer service.
//!
//! Consumes order and product events and applies notification side effects
//! with exactly-once-effect semantics over the pipeline's at-least-once
//! delivery:
//!
//! - [`handlers`]: per-event-type business handlers built on the
//!   idempotency guard protocol, plus the dead-letter triage handler
//! - [`sender`]: the notification side-effect collaborator
//! - [`redis_store`]: the Redis-backed reservation store shared by all
//!   service instances
//! - [`config`]: environment configuration for the composition root

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod redis_store;
pub mod sender;

pub use config::Config;
pub use handlers::{
    DeadLetterLogHandler, NotificationService, OrderCreatedHandler, OrderShippedHandler,
    ProductCreatedHandler,
};
pub use redis_store::RedisReservationStore;
pub use sender::{LogNotificationSender, NotificationSender};
