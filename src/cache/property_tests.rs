//! Property-Based Tests for the Local Tier
//!
//! Uses proptest to check capacity, eviction order and statistics.

use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;

use crate::cache::LocalTier;

const LONG_TTL: Option<Duration> = Some(Duration::from_secs(300));

// == Strategies ==
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,64}"
}

#[derive(Debug, Clone)]
enum TierOp {
    Put { key: String, value: i64 },
    Get { key: String },
    Invalidate { key: String },
}

fn tier_op_strategy() -> impl Strategy<Value = TierOp> {
    prop_oneof![
        (valid_key_strategy(), any::<i64>()).prop_map(|(key, value)| TierOp::Put { key, value }),
        valid_key_strategy().prop_map(|key| TierOp::Get { key }),
        valid_key_strategy().prop_map(|key| TierOp::Invalidate { key }),
    ]
}

fn unique(keys: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.into_iter().filter(|k| seen.insert(k.clone())).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Hits and misses match what callers observed; entry count matches len()
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(tier_op_strategy(), 1..50)) {
        let tier = LocalTier::with_ttls("prop", 100, LONG_TTL, None);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;
        let mut expected_removals: u64 = 0;

        for op in ops {
            match op {
                TierOp::Put { key, value } => tier.put(&key, json!(value)),
                TierOp::Get { key } => match tier.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                TierOp::Invalidate { key } => {
                    if tier.invalidate(&key) {
                        expected_removals += 1;
                    }
                }
            }
        }

        let stats = tier.stats();
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
        prop_assert_eq!(stats.explicit_removals, expected_removals);
        prop_assert_eq!(stats.total_entries, tier.len());
    }

    // Overwrites return the latest value and never duplicate the key
    #[test]
    fn prop_overwrite_semantics(key in valid_key_strategy(), v1 in any::<i64>(), v2 in any::<i64>()) {
        let tier = LocalTier::with_ttls("prop", 10, LONG_TTL, None);

        tier.put(&key, json!(v1));
        tier.put(&key, json!(v2));

        prop_assert_eq!(tier.get(&key), Some(json!(v2)));
        prop_assert_eq!(tier.len(), 1);
    }

    // The tier never holds more than maximum_size entries
    #[test]
    fn prop_capacity_enforcement(
        keys in prop::collection::vec(valid_key_strategy(), 1..200),
        max in 1usize..50
    ) {
        let tier = LocalTier::with_ttls("prop", max, LONG_TTL, None);

        for key in keys {
            tier.put(&key, json!(1));
            prop_assert!(tier.len() <= max, "size {} exceeds max {}", tier.len(), max);
        }
    }

    // Without access expiry, the oldest write is evicted even if it was read
    #[test]
    fn prop_write_order_eviction(
        keys in prop::collection::vec(valid_key_strategy(), 3..10),
        new_key in valid_key_strategy()
    ) {
        let keys = unique(keys);
        prop_assume!(keys.len() >= 2);
        prop_assume!(!keys.contains(&new_key));

        let tier = LocalTier::with_ttls("prop", keys.len(), LONG_TTL, None);
        for key in &keys {
            tier.put(key, json!(key));
        }
        tier.get(&keys[0]);
        tier.put(&new_key, json!("new"));

        prop_assert!(!tier.contains(&keys[0]));
        prop_assert!(tier.contains(&new_key));
        for key in keys.iter().skip(1) {
            prop_assert!(tier.contains(key));
        }
    }

    // With access expiry, a read protects the key from the next size eviction
    #[test]
    fn prop_access_order_eviction(
        keys in prop::collection::vec(valid_key_strategy(), 3..10),
        new_key in valid_key_strategy()
    ) {
        let keys = unique(keys);
        prop_assume!(keys.len() >= 3);
        prop_assume!(!keys.contains(&new_key));

        let tier = LocalTier::with_ttls("prop", keys.len(), None, LONG_TTL);
        for key in &keys {
            tier.put(key, json!(key));
        }
        tier.get(&keys[0]);
        tier.put(&new_key, json!("new"));

        prop_assert!(tier.contains(&keys[0]));
        prop_assert!(!tier.contains(&keys[1]));
        prop_assert!(tier.contains(&new_key));
    }
}
