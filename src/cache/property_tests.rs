//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check key determinism, TTL boundaries, bounded size, LRU
//! victim selection and route-scoped invalidation.

use proptest::prelude::*;
use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;

use crate::cache::{CacheKey, CacheStore, CachedResponse};
use crate::relay::HeaderBag;

// == Test Configuration ==
const TEST_DEFAULT_TTL: Duration = Duration::from_millis(300_000);

// == Strategies ==
fn route_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["users", "posts", "comments", "todos"]).prop_map(String::from)
}

fn path_strategy() -> impl Strategy<Value = String> {
    "(/[a-z0-9]{1,8}){1,3}"
}

fn query_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(("[a-z]{1,5}", "[a-zA-Z0-9 &=]{0,6}"), 0..6)
}

fn payload() -> CachedResponse {
    CachedResponse {
        status: 200,
        headers: HeaderBag::new(),
        body: Bytes::from_static(b"payload"),
    }
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { route: String, path: String },
    Get { route: String, path: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (route_strategy(), "/[a-e]").prop_map(|(route, path)| CacheOp::Set { route, path }),
        (route_strategy(), "/[a-e]").prop_map(|(route, path)| CacheOp::Get { route, path }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Permuting query parameters never changes the key.
    #[test]
    fn prop_key_determinism(
        route in route_strategy(),
        path in path_strategy(),
        query in query_strategy(),
    ) {
        let mut reversed = query.clone();
        reversed.reverse();

        let a = CacheKey::new(route.clone(), "GET", path.clone(), &query);
        let b = CacheKey::new(route, "GET", path, &reversed);

        prop_assert_eq!(a.to_string(), b.to_string());
        prop_assert_eq!(a, b);
    }

    // Stored at t with ttl T: hit for t' < t+T, miss (and removed) at t' >= t+T.
    #[test]
    fn prop_ttl_correctness(
        stored_at in 0u64..1_000_000,
        ttl in 1u64..100_000,
        offset in 0u64..200_000,
    ) {
        let mut store = CacheStore::new(10, TEST_DEFAULT_TTL);
        let key = CacheKey::new("users", "GET", "/1", &[]);
        store.set_at(&key, payload(), Some(Duration::from_millis(ttl)), stored_at);

        let read_at = stored_at + offset;
        let result = store.get_at(&key.to_string(), read_at);

        if offset < ttl {
            prop_assert!(result.is_some());
        } else {
            prop_assert!(result.is_none());
            prop_assert!(!store.contains(&key.to_string()));
        }
    }

    // Size never exceeds capacity, and counters track every lookup.
    #[test]
    fn prop_bounded_size(
        max in 1usize..8,
        ops in prop::collection::vec(cache_op_strategy(), 1..80),
    ) {
        let mut store = CacheStore::new(max, TEST_DEFAULT_TTL);
        let mut lookups = 0u64;

        for op in ops {
            match op {
                CacheOp::Set { route, path } => {
                    store.set(&CacheKey::new(route, "GET", path, &[]), payload(), None);
                }
                CacheOp::Get { route, path } => {
                    store.get(&CacheKey::new(route, "GET", path, &[]).to_string());
                    lookups += 1;
                }
            }
            prop_assert!(store.len() <= max);
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits + stats.misses, lookups);
        prop_assert_eq!(stats.size, store.len());
    }

    // Inserting at capacity evicts exactly the least recently accessed key.
    #[test]
    fn prop_lru_evicts_least_recent(
        max in 2usize..6,
        reads in prop::collection::vec(0usize..6, 0..20),
    ) {
        let mut store = CacheStore::new(max, TEST_DEFAULT_TTL);
        let keys: Vec<CacheKey> = (0..max)
            .map(|i| CacheKey::new("users", "GET", format!("/{}", i), &[]))
            .collect();

        let mut recency: Vec<usize> = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            store.set(key, payload(), None);
            recency.push(i);
        }
        for read in reads {
            let i = read % max;
            store.get(&keys[i].to_string());
            recency.retain(|&k| k != i);
            recency.push(i);
        }

        let expected_victim = recency[0];
        store.set(&CacheKey::new("users", "GET", "/new", &[]), payload(), None);

        prop_assert_eq!(store.len(), max);
        for (i, key) in keys.iter().enumerate() {
            prop_assert_eq!(store.contains(&key.to_string()), i != expected_victim);
        }
    }

    // Route invalidation removes all and only that route's entries.
    #[test]
    fn prop_invalidation_scope(
        entries in prop::collection::vec((route_strategy(), path_strategy()), 1..30),
        target in route_strategy(),
    ) {
        let mut store = CacheStore::new(1_000, TEST_DEFAULT_TTL);
        let mut survivors = HashSet::new();
        let mut doomed = HashSet::new();

        for (route, path) in &entries {
            let key = CacheKey::new(route.clone(), "GET", path.clone(), &[]);
            store.set(&key, payload(), None);
            if *route == target {
                doomed.insert(key.to_string());
            } else {
                survivors.insert(key.to_string());
            }
        }

        let removed = store.invalidate_route(&target);

        prop_assert_eq!(removed, doomed.len());
        for key in &doomed {
            prop_assert!(!store.contains(key));
        }
        for key in &survivors {
            prop_assert!(store.contains(key));
        }
    }
}
