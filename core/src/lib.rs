//! Core types and collaborator contracts for the eventline pipeline.
//!
//! This crate defines everything the pipeline components agree on:
//!
//! - [`event`]: the domain event envelope and its JSON wire format
//! - [`topic`]: topic names and dead-letter naming conventions
//! - [`partition`]: the deterministic key-to-partition function
//! - [`log`]: the [`PartitionedLog`](log::PartitionedLog) contract for the
//!   external partitioned, durable log
//! - [`store`]: the [`ReservationStore`](store::ReservationStore) contract
//!   for the external atomic key-value store
//! - [`handler`]: the [`EventHandler`](handler::EventHandler) trait and the
//!   processing outcome/error taxonomy
//! - [`clock`]: injectable time source
//!
//! The log and the key-value store are *given primitives*: this crate states
//! their contracts, and adapter crates (`eventline-redpanda`,
//! `eventline-testing`, the services' Redis store) provide implementations.
//! Nothing in here performs I/O.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod event;
pub mod handler;
pub mod log;
pub mod partition;
pub mod store;
pub mod topic;

pub use clock::{Clock, SystemClock};
pub use event::{DomainEvent, EnvelopeError, EventPayload, OrderCreated, OrderShipped, ProductCreated};
pub use handler::{EventHandler, HandlerError, ProcessingOutcome, ProcessingReport};
pub use log::{Delivery, DeliveryCoordinate, LogError, PartitionedLog};
pub use store::{ReservationStore, StoreError};
