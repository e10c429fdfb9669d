//! Deterministic key-to-partition placement.
//!
//! Partition selection is a pure function of the partition key: a stable
//! FNV-1a hash of the key bytes modulo the partition count. Every adapter
//! (in-memory and broker-backed alike) must place keyed appends with this
//! function so that all events sharing an `aggregate_id` land on the same
//! partition, which is the system's only ordering guarantee. Cross-key ordering is
//! unspecified.

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Stable 64-bit FNV-1a hash of a byte slice.
#[must_use]
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Partition index for a key, for a topic with `partition_count` partitions.
///
/// Returns 0 for a degenerate zero-partition count rather than dividing by
/// zero; adapters are expected to provision at least one partition.
#[must_use]
pub fn partition_for_key(key: &str, partition_count: u32) -> u32 {
    if partition_count == 0 {
        return 0;
    }
    // u32 truncation keeps the modulo cheap; the low bits of FNV-1a mix well.
    let hash = fnv1a64(key.as_bytes()) as u32;
    hash % partition_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_hash_values_are_stable() {
        // Reference vectors for the 64-bit FNV-1a parameters.
        assert_eq!(fnv1a64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a64(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn zero_partitions_does_not_divide_by_zero() {
        assert_eq!(partition_for_key("order-1", 0), 0);
    }

    proptest! {
        #[test]
        fn same_key_always_selects_same_partition(key in ".{0,64}", count in 1u32..64) {
            prop_assert_eq!(
                partition_for_key(&key, count),
                partition_for_key(&key, count)
            );
        }

        #[test]
        fn partition_is_always_in_range(key in ".{0,64}", count in 1u32..64) {
            prop_assert!(partition_for_key(&key, count) < count);
        }
    }
}
