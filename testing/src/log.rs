//! In-memory partitioned log.

use eventline_core::log::{Delivery, DeliveryCoordinate, LogError, PartitionedLog};
use eventline_core::partition::partition_for_key;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

struct StoredRecord {
    key: String,
    payload: Vec<u8>,
}

#[derive(Default)]
struct LogInner {
    /// topic → one record vector per partition; a record's offset is its
    /// index.
    topics: HashMap<String, Vec<Vec<StoredRecord>>>,
    /// (group, topic, partition) → highest committed offset.
    commits: HashMap<(String, String, u32), i64>,
}

/// In-memory [`PartitionedLog`] implementation.
///
/// Topics are provisioned up front with a fixed partition count. Keyed
/// appends place records with the same stable hash every adapter uses, so
/// partition assertions carry over to the broker-backed adapter. Polling
/// returns everything after the group's committed offset, which makes
/// at-least-once redelivery the default behavior: anything handled but not
/// committed comes back on the next poll.
pub struct InMemoryLog {
    inner: Mutex<LogInner>,
}

impl InMemoryLog {
    /// Create a log with the given `(topic, partition_count)` provisioning.
    #[must_use]
    pub fn new(topics: &[(&str, u32)]) -> Self {
        let mut inner = LogInner::default();
        for (topic, partitions) in topics {
            let vecs = (0..*partitions).map(|_| Vec::new()).collect();
            inner.topics.insert((*topic).to_string(), vecs);
        }
        Self { inner: Mutex::new(inner) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogInner> {
        // A poisoned lock only happens if a test thread panicked while
        // holding it; recovering the data is the right move for a double.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Everything appended to one partition, for assertions.
    #[must_use]
    pub fn records(&self, topic: &str, partition: u32) -> Vec<Delivery> {
        let inner = self.lock();
        let Some(partitions) = inner.topics.get(topic) else {
            return Vec::new();
        };
        let Some(records) = partitions.get(partition as usize) else {
            return Vec::new();
        };
        records
            .iter()
            .enumerate()
            .map(|(offset, record)| Delivery {
                coordinate: DeliveryCoordinate {
                    topic: topic.to_string(),
                    partition,
                    offset: offset as i64,
                    key: record.key.clone(),
                },
                payload: record.payload.clone(),
            })
            .collect()
    }

    /// Total records across all partitions of a topic.
    #[must_use]
    pub fn record_count(&self, topic: &str) -> usize {
        let inner = self.lock();
        inner
            .topics
            .get(topic)
            .map_or(0, |partitions| partitions.iter().map(Vec::len).sum())
    }

    /// Forget a group's committed offset for one partition, so the next
    /// poll redelivers the partition from the beginning. Simulates the
    /// replay a crash or rebalance causes.
    pub fn rewind(&self, group: &str, topic: &str, partition: u32) {
        let mut inner = self.lock();
        inner
            .commits
            .remove(&(group.to_string(), topic.to_string(), partition));
    }

    fn do_append(
        &self,
        topic: &str,
        partition: Option<u32>,
        key: &str,
        payload: Vec<u8>,
    ) -> Result<DeliveryCoordinate, LogError> {
        let mut inner = self.lock();
        let partitions = inner
            .topics
            .get_mut(topic)
            .ok_or_else(|| LogError::UnknownTopic(topic.to_string()))?;
        let count = partitions.len() as u32;

        let index = match partition {
            Some(p) if p >= count => {
                return Err(LogError::AppendFailed {
                    topic: topic.to_string(),
                    reason: format!("partition {p} out of range (topic has {count})"),
                });
            }
            Some(p) => p,
            None => partition_for_key(key, count),
        };

        let records = &mut partitions[index as usize];
        records.push(StoredRecord { key: key.to_string(), payload });

        Ok(DeliveryCoordinate {
            topic: topic.to_string(),
            partition: index,
            offset: (records.len() - 1) as i64,
            key: key.to_string(),
        })
    }
}

impl PartitionedLog for InMemoryLog {
    fn partition_count(&self, topic: &str) -> u32 {
        let inner = self.lock();
        inner.topics.get(topic).map_or(0, |p| p.len() as u32)
    }

    fn append(
        &self,
        topic: &str,
        key: &str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryCoordinate, LogError>> + Send + '_>> {
        let result = self.do_append(topic, None, key, payload);
        Box::pin(async move { result })
    }

    fn append_to_partition(
        &self,
        topic: &str,
        partition: u32,
        key: &str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryCoordinate, LogError>> + Send + '_>> {
        let result = self.do_append(topic, Some(partition), key, payload);
        Box::pin(async move { result })
    }

    fn poll(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        max_records: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Delivery>, LogError>> + Send + '_>> {
        let result = (|| {
            let inner = self.lock();
            let partitions = inner
                .topics
                .get(topic)
                .ok_or_else(|| LogError::UnknownTopic(topic.to_string()))?;
            let records = partitions.get(partition as usize).ok_or_else(|| {
                LogError::PollFailed {
                    topic: topic.to_string(),
                    partition,
                    reason: "partition out of range".to_string(),
                }
            })?;

            let committed = inner
                .commits
                .get(&(group.to_string(), topic.to_string(), partition))
                .copied()
                .unwrap_or(-1);

            let start = usize::try_from(committed + 1).unwrap_or(0);
            let batch = records
                .iter()
                .enumerate()
                .skip(start)
                .take(max_records)
                .map(|(offset, record)| Delivery {
                    coordinate: DeliveryCoordinate {
                        topic: topic.to_string(),
                        partition,
                        offset: offset as i64,
                        key: record.key.clone(),
                    },
                    payload: record.payload.clone(),
                })
                .collect();
            Ok(batch)
        })();
        Box::pin(async move { result })
    }

    fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        offset: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogError>> + Send + '_>> {
        let result = (|| {
            let mut inner = self.lock();
            if !inner.topics.contains_key(topic) {
                return Err(LogError::UnknownTopic(topic.to_string()));
            }
            let entry = inner
                .commits
                .entry((group.to_string(), topic.to_string(), partition))
                .or_insert(-1);
            // Commits never move backwards.
            if offset > *entry {
                *entry = offset;
            }
            Ok(())
        })();
        Box::pin(async move { result })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keyed_appends_share_a_partition() {
        let log = InMemoryLog::new(&[("orders", 8)]);
        let a = log.append("orders", "k1", b"a".to_vec()).await.unwrap();
        let b = log.append("orders", "k1", b"b".to_vec()).await.unwrap();
        assert_eq!(a.partition, b.partition);
        assert_eq!(b.offset, a.offset + 1);
    }

    #[tokio::test]
    async fn poll_redelivers_until_commit() {
        let log = InMemoryLog::new(&[("orders", 1)]);
        log.append("orders", "k1", b"a".to_vec()).await.unwrap();

        let first = log.poll("g", "orders", 0, 10).await.unwrap();
        let second = log.poll("g", "orders", 0, 10).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);

        log.commit("g", "orders", 0, 0).await.unwrap();
        let third = log.poll("g", "orders", 0, 10).await.unwrap();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn commits_are_per_group() {
        let log = InMemoryLog::new(&[("orders", 1)]);
        log.append("orders", "k1", b"a".to_vec()).await.unwrap();
        log.commit("g1", "orders", 0, 0).await.unwrap();

        assert!(log.poll("g1", "orders", 0, 10).await.unwrap().is_empty());
        assert_eq!(log.poll("g2", "orders", 0, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rewind_replays_the_partition() {
        let log = InMemoryLog::new(&[("orders", 1)]);
        log.append("orders", "k1", b"a".to_vec()).await.unwrap();
        log.commit("g", "orders", 0, 0).await.unwrap();
        assert!(log.poll("g", "orders", 0, 10).await.unwrap().is_empty());

        log.rewind("g", "orders", 0);
        assert_eq!(log.poll("g", "orders", 0, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn explicit_partition_append_is_pinned() {
        let log = InMemoryLog::new(&[("orders-dlq", 4)]);
        let c = log
            .append_to_partition("orders-dlq", 3, "k1", b"a".to_vec())
            .await
            .unwrap();
        assert_eq!(c.partition, 3);

        let err = log
            .append_to_partition("orders-dlq", 9, "k1", b"a".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, LogError::AppendFailed { .. }));
    }

    #[tokio::test]
    async fn commit_never_moves_backwards() {
        let log = InMemoryLog::new(&[("orders", 1)]);
        for i in 0..3 {
            log.append("orders", "k1", vec![i]).await.unwrap();
        }
        log.commit("g", "orders", 0, 2).await.unwrap();
        log.commit("g", "orders", 0, 0).await.unwrap();
        assert!(log.poll("g", "orders", 0, 10).await.unwrap().is_empty());
    }
}
