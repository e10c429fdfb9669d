//! Redis-backed reservation store.
//!
//! Reservations are Redis keys written with `SET key 1 NX EX <ttl>`: the
//! `NX` flag makes creation atomic server-side, which gives the
//! linearizable set-if-absent the [`ReservationStore`] contract demands
//! across every consumer instance sharing the store. Release is a plain
//! `DEL`, idempotent by nature.
//!
//! Connections go through [`ConnectionManager`], which multiplexes one
//! connection across tasks and reconnects on failure.

use eventline_core::store::{ReservationStore, StoreError};
use redis::aio::ConnectionManager;
use redis::Client;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Redis implementation of the reservation store.
///
/// Cheap to clone; every clone shares the same multiplexed connection.
#[derive(Clone)]
pub struct RedisReservationStore {
    conn: ConnectionManager,
}

impl RedisReservationStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionFailed`] if the URL is malformed or
    /// the initial connection cannot be established.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url).map_err(|e| {
            StoreError::ConnectionFailed(format!("failed to create Redis client: {e}"))
        })?;
        let conn = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::ConnectionFailed(format!("failed to connect to Redis: {e}"))
        })?;
        tracing::info!(url = %redis_url, "Reservation store connected");
        Ok(Self { conn })
    }
}

impl ReservationStore for RedisReservationStore {
    fn set_if_absent(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>> {
        let key = key.to_string();
        let mut conn = self.conn.clone();
        let ttl_secs = ttl.as_secs().max(1);

        Box::pin(async move {
            // SET NX returns OK when the key was created, nil when it
            // already existed.
            let reply: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg("1")
                .arg("NX")
                .arg("EX")
                .arg(ttl_secs)
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::OperationFailed {
                    key: key.clone(),
                    reason: format!("SET NX failed: {e}"),
                })?;
            Ok(reply.is_some())
        })
    }

    fn delete(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let key = key.to_string();
        let mut conn = self.conn.clone();

        Box::pin(async move {
            let _deleted: u64 = redis::cmd("DEL")
                .arg(&key)
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::OperationFailed {
                    key: key.clone(),
                    reason: format!("DEL failed: {e}"),
                })?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_store_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedisReservationStore>();
        assert_sync::<RedisReservationStore>();
    }
}
