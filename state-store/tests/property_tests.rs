//! Property-based tests for the registry
//!
//! Covers prefix filtering, read stability and the all-or-nothing batch rule.

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use state_store::{Batch, StateStore, Value, WriteError};

// ============================================================================
// Strategies
// ============================================================================

/// Dotted keys like `pinpad.door`, drawn from a small alphabet so prefixes collide
fn key_strategy() -> impl Strategy<Value = String> {
    "[ab]{1,3}(\\.[ab]{1,3}){0,2}"
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z ]{0,8}".prop_map(Value::from),
    ]
}

fn registry_strategy() -> impl Strategy<Value = BTreeMap<String, (Value, bool)>> {
    prop::collection::btree_map(key_strategy(), (value_strategy(), any::<bool>()), 0..16)
}

fn build_store(entries: &BTreeMap<String, (Value, bool)>, hook_calls: &Arc<AtomicUsize>) -> StateStore {
    let store = StateStore::new();
    for (key, (value, writable)) in entries {
        if *writable {
            let calls = Arc::clone(hook_calls);
            store.set_writable(key.clone(), value.clone(), move |_: &str, _: &Value, _: &Value| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        } else {
            store.set_read_only(key.clone(), value.clone());
        }
    }
    store
}

// ============================================================================
// Snapshots
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A key is in `snapshot(p)` exactly when it starts with `p`
    #[test]
    fn test_prefix_filter_matches_starts_with(
        entries in registry_strategy(),
        prefix in "[ab.]{0,4}",
    ) {
        let store = build_store(&entries, &Arc::new(AtomicUsize::new(0)));
        let snapshot = store.snapshot(&prefix);

        for (key, (value, _)) in &entries {
            prop_assert_eq!(snapshot.contains_key(key), key.starts_with(&prefix));
            if let Some(seen) = snapshot.get(key) {
                prop_assert_eq!(seen, value);
            }
        }
        prop_assert!(snapshot.keys().all(|k| entries.contains_key(k)));
    }

    /// Two reads with no write in between agree
    #[test]
    fn test_snapshot_is_stable(entries in registry_strategy()) {
        let store = build_store(&entries, &Arc::new(AtomicUsize::new(0)));
        prop_assert_eq!(store.snapshot(""), store.snapshot(""));
        prop_assert_eq!(store.render_snapshot("").unwrap(), store.render_snapshot("").unwrap());
    }
}

// ============================================================================
// Batch writes
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A batch with any unknown or read-only key changes nothing and fires no hook
    #[test]
    fn test_invalid_batch_is_all_or_nothing(
        entries in registry_strategy(),
        writes in prop::collection::btree_map(key_strategy(), value_strategy(), 1..8),
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = build_store(&entries, &calls);
        let before = store.snapshot("");

        let batch: Batch = writes.clone();
        let first_bad = writes.keys().find(|k| !matches!(entries.get(*k), Some((_, true))));

        match (store.apply_batch(batch), first_bad) {
            (Err(err), Some(bad)) => {
                prop_assert_eq!(err.key(), bad.as_str());
                match entries.get(bad) {
                    None => prop_assert_eq!(err, WriteError::KeyNotFound(bad.clone())),
                    Some(_) => prop_assert_eq!(err, WriteError::NotWritable(bad.clone())),
                }
                prop_assert_eq!(store.snapshot(""), before);
                prop_assert_eq!(calls.load(Ordering::SeqCst), 0);
            }
            (Ok(outcome), None) => {
                prop_assert_eq!(outcome.len(), writes.len());
                prop_assert_eq!(calls.load(Ordering::SeqCst), writes.len());
                for (key, value) in &writes {
                    let got = store.get(key);
                    prop_assert_eq!(got.as_ref(), Some(value));
                }
            }
            (result, bad) => {
                prop_assert!(false, "unexpected result {:?} for first bad key {:?}", result, bad);
            }
        }
    }
}
