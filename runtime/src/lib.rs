//! Runtime for the eventline pipeline.
//!
//! This crate assembles the moving parts of the event delivery and
//! processing pipeline on top of the contracts in `eventline-core`:
//!
//! - [`publisher`]: appends domain events to the partitioned log, keyed for
//!   ordering
//! - [`idempotency`]: the reserve/release guard that makes at-least-once
//!   delivery safe for side effects
//! - [`supervisor`]: bounded local retry with fixed backoff and dead-letter
//!   escalation
//! - [`dispatcher`]: per-partition pull workers that commit progress only
//!   after a record is handled or dead-lettered
//!
//! Everything here is collaborator-injected: a [`PartitionedLog`]
//! (`eventline-redpanda` in production, the in-memory log in tests), a
//! [`ReservationStore`] (Redis in production), and per-event-type
//! [`EventHandler`]s supplied by the consuming service. Binaries wire these
//! once at process start.
//!
//! [`PartitionedLog`]: eventline_core::log::PartitionedLog
//! [`ReservationStore`]: eventline_core::store::ReservationStore
//! [`EventHandler`]: eventline_core::handler::EventHandler

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dispatcher;
pub mod idempotency;
pub mod publisher;
pub mod supervisor;

pub use dispatcher::ConsumerDispatcher;
pub use idempotency::IdempotencyGuard;
pub use publisher::{EventPublisher, PublishError};
pub use supervisor::{DeadLetterRecord, Disposition, RetryPolicy, RetrySupervisor};
