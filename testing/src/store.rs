//! In-memory atomic key-value store.

use eventline_core::store::{ReservationStore, StoreError};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// In-memory [`ReservationStore`] implementation.
///
/// A single mutex makes `set_if_absent` atomic across every task sharing
/// the instance, which is exactly the linearizability the contract demands
/// of the real store. Entries expire lazily: an expired key counts as
/// absent the next time anything touches it.
#[derive(Default)]
pub struct InMemoryReservationStore {
    entries: Mutex<HashMap<String, Instant>>,
}

impl InMemoryReservationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` currently holds a live reservation.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let entries = self.lock();
        entries.get(key).is_some_and(|expiry| *expiry > Instant::now())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl ReservationStore for InMemoryReservationStore {
    fn set_if_absent(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>> {
        let created = {
            let mut entries = self.lock();
            let now = Instant::now();
            match entries.get(key) {
                Some(expiry) if *expiry > now => false,
                _ => {
                    entries.insert(key.to_string(), now + ttl);
                    true
                }
            }
        };
        Box::pin(async move { Ok(created) })
    }

    fn delete(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        {
            let mut entries = self.lock();
            entries.remove(key);
        }
        Box::pin(async move { Ok(()) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_if_absent_is_first_wins() {
        let store = InMemoryReservationStore::new();
        let ttl = Duration::from_secs(60);
        assert!(store.set_if_absent("k", ttl).await.unwrap());
        assert!(!store.set_if_absent("k", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryReservationStore::new();
        store.delete("absent").await.unwrap();
        assert!(store.set_if_absent("absent", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn expired_entries_count_as_absent() {
        let store = InMemoryReservationStore::new();
        assert!(store.set_if_absent("k", Duration::from_millis(10)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.set_if_absent("k", Duration::from_secs(60)).await.unwrap());
    }
}
