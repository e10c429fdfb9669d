//! Order producer service.
//!
//! Validates incoming requests, enforces the order status transition
//! allow-list, and publishes `OrderCreated` / `OrderShipped` events through
//! the shared pipeline. Holds no durable order state: the service is
//! reasoned about purely in terms of the events it emits.
//!
//! The operations here map 1:1 onto an HTTP boundary
//! (`POST /api/orders`, `POST /api/orders/{id}/status`) that lives outside
//! this crate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod service;
pub mod types;

pub use service::{OrderService, ServiceError};
pub use types::{
    CreateOrderRequest, CreateOrderResponse, UpdateOrderStatusRequest, UpdateOrderStatusResponse,
};
