//! Contract for the external atomic key-value store.
//!
//! The store is a *given primitive*: the only cross-instance shared mutable
//! resource in the system. The idempotency guard delegates all coordination
//! to its two operations, so implementations carry the whole correctness
//! burden stated here:
//!
//! - [`ReservationStore::set_if_absent`] must be linearizable across every
//!   process sharing the backing store: for a given key, exactly one
//!   concurrent caller observes `true`.
//! - [`ReservationStore::delete`] must be idempotent; deleting an absent
//!   key is a no-op, not an error.
//! - Entries expire after their TTL; expiry makes the key absent again.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Failed to reach the store.
    #[error("store connection failed: {0}")]
    ConnectionFailed(String),

    /// An individual operation failed.
    #[error("store operation failed for key '{key}': {reason}")]
    OperationFailed {
        /// Key the operation targeted.
        key: String,
        /// Why it failed.
        reason: String,
    },
}

/// The atomic key-value store primitive.
pub trait ReservationStore: Send + Sync {
    /// Atomically create `key` with the given TTL iff it is absent.
    ///
    /// Resolves to `true` iff this call created the entry.
    fn set_if_absent(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>>;

    /// Delete `key`. Deleting an absent key succeeds.
    fn delete(&self, key: &str)
        -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}
