//! Idempotency guard: atomic reserve/release of event ids.
//!
//! The guard wraps the shared [`ReservationStore`] and namespaces event ids
//! under a key prefix. Its protocol, followed by every business handler:
//!
//! 1. [`reserve`](IdempotencyGuard::reserve). `false` means another
//!    delivery (possibly on another instance) got here first: short-circuit
//!    with a duplicate outcome and skip the side effect entirely.
//! 2. On `true`, run the side effect.
//! 3. On success, leave the reservation in place. Its TTL bounds the
//!    deduplication window; it is never deleted on success.
//! 4. On *transient* failure, [`release`](IdempotencyGuard::release) before
//!    propagating, so a later redelivery may re-attempt instead of being
//!    suppressed as a duplicate. Terminal failures keep the reservation;
//!    re-running a structurally broken message cannot succeed.
//!
//! # Accepted risk
//!
//! If the process crashes after the side effect executes but before the
//! delivery commits, the reservation survives and the redelivery is
//! classified `Duplicate`, so a legitimately-needed retry is silently
//! dropped. This window is accepted, not guarded against; exactly-once
//! *effect* here means "at most once, and once in the absence of a crash in
//! that window".

use eventline_core::store::{ReservationStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Key namespace for reservations in the shared store.
pub const RESERVATION_KEY_PREFIX: &str = "notification:processed:event:";

/// How long a reservation marks its event id as processed.
pub const RESERVATION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Reserve/release guard over the shared atomic store.
///
/// Cheap to clone; clones share the same store handle.
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn ReservationStore>,
    key_prefix: &'static str,
    ttl: Duration,
}

impl IdempotencyGuard {
    /// Create a guard with the default namespace and 7-day TTL.
    #[must_use]
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self {
            store,
            key_prefix: RESERVATION_KEY_PREFIX,
            ttl: RESERVATION_TTL,
        }
    }

    /// Override the reservation TTL.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn key(&self, event_id: Uuid) -> String {
        format!("{}{}", self.key_prefix, event_id)
    }

    /// Atomically reserve `event_id`.
    ///
    /// Returns `true` iff this call created the reservation. Exactly one
    /// concurrent caller across all instances observes `true` for a given
    /// id; everyone else must treat the event as already processed.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] if the store is unreachable; callers treat
    /// that as a transient handling failure.
    pub async fn reserve(&self, event_id: Uuid) -> Result<bool, StoreError> {
        self.store.set_if_absent(&self.key(event_id), self.ttl).await
    }

    /// Delete the reservation for `event_id` so a redelivery may re-attempt.
    ///
    /// Idempotent: releasing an id that holds no reservation is a no-op.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] if the store is unreachable.
    pub async fn release(&self, event_id: Uuid) -> Result<(), StoreError> {
        self.store.delete(&self.key(event_id)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use eventline_testing::InMemoryReservationStore;

    #[tokio::test]
    async fn first_reserve_wins_second_loses() {
        let guard = IdempotencyGuard::new(Arc::new(InMemoryReservationStore::new()));
        let id = Uuid::new_v4();

        assert!(guard.reserve(id).await.unwrap());
        assert!(!guard.reserve(id).await.unwrap());
    }

    #[tokio::test]
    async fn release_reopens_the_reservation() {
        let guard = IdempotencyGuard::new(Arc::new(InMemoryReservationStore::new()));
        let id = Uuid::new_v4();

        assert!(guard.reserve(id).await.unwrap());
        guard.release(id).await.unwrap();
        assert!(guard.reserve(id).await.unwrap());
    }

    #[tokio::test]
    async fn release_of_absent_id_is_a_no_op() {
        let guard = IdempotencyGuard::new(Arc::new(InMemoryReservationStore::new()));
        guard.release(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_reserves_admit_exactly_one_winner() {
        let guard = IdempotencyGuard::new(Arc::new(InMemoryReservationStore::new()));
        let id = Uuid::new_v4();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let guard = guard.clone();
            tasks.push(tokio::spawn(async move { guard.reserve(id).await.unwrap() }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn expired_reservation_is_absent_again() {
        let guard = IdempotencyGuard::new(Arc::new(InMemoryReservationStore::new()))
            .with_ttl(Duration::from_millis(20));
        let id = Uuid::new_v4();

        assert!(guard.reserve(id).await.unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(guard.reserve(id).await.unwrap());
    }
}
