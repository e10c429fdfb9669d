//! Product producer service.
//!
//! Validates incoming requests and publishes `ProductCreated` events
//! through the shared pipeline. Like the order service it holds no durable
//! state and maps 1:1 onto an HTTP boundary (`POST /api/products`) that
//! lives outside this repository.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod service;

pub use service::{CreateProductRequest, CreateProductResponse, ProductService, ServiceError};
