//! Property-based tests for the run store and rerun coordinator
//!
//! - Round-trip and isolation with arbitrary JSON payloads
//! - Id uniqueness across arbitrary save/clear interleavings
//! - Flag merge precedence
//! - Run with ProptestConfig::with_cases(100)

use perfx::audit::merge_flags;
use perfx::experiment::{AuditTarget, Flags, MemoryRunStore, RunStore};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Arbitrary JSON value, nested up to a few levels
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ./*-]{0,12}".prop_map(Value::from),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::from),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_flags() -> impl Strategy<Value = Flags> {
    prop::collection::btree_map("[a-zA-Z]{1,10}", arb_json(), 0..8)
        .prop_map(|m| m.into_iter().collect())
}

/// Results payload with a valid `generatedTime` and arbitrary extra fields
fn arb_results() -> impl Strategy<Value = Value> {
    (
        2000i32..2100,
        1u32..=12,
        1u32..=28,
        0u32..24,
        0u32..60,
        prop::collection::btree_map("[a-z]{1,6}", arb_json(), 0..6),
    )
        .prop_map(|(year, month, day, hour, minute, extra)| {
            let mut object: serde_json::Map<String, Value> = extra.into_iter().collect();
            object.insert(
                "generatedTime".into(),
                json!(format!("{year}-{month:02}-{day:02}T{hour:02}:{minute:02}:00.000Z")),
            );
            Value::Object(object)
        })
}

fn store() -> MemoryRunStore {
    MemoryRunStore::new(AuditTarget::new("http://example.com/", Value::Null))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: whatever is saved is read back unchanged
    #[test]
    fn prop_save_round_trips(flags in arb_flags(), results in arb_results()) {
        runtime().block_on(async {
            let store = store();
            let id = store.save(&flags, &results).await.unwrap();
            prop_assert_eq!(store.flags(&id).await.unwrap(), flags);
            prop_assert_eq!(
                store.generated_time(&id).await.unwrap(),
                results["generatedTime"].as_str().unwrap()
            );
            prop_assert_eq!(store.results(&id).await.unwrap(), results);
            Ok(())
        })?;
    }

    /// Property: mutating a read copy never reaches the store
    #[test]
    fn prop_reads_are_isolated(
        flags in arb_flags(),
        results in arb_results(),
        junk in arb_json(),
    ) {
        runtime().block_on(async {
            let store = store();
            let id = store.save(&flags, &results).await.unwrap();

            let mut copy = store.flags(&id).await.unwrap();
            copy.insert("injected".into(), junk.clone());
            let mut results_copy = store.results(&id).await.unwrap();
            results_copy["generatedTime"] = junk;

            prop_assert_eq!(store.flags(&id).await.unwrap(), flags);
            prop_assert_eq!(store.results(&id).await.unwrap(), results);
            Ok(())
        })?;
    }

    /// Property: ids are never reused, even across clears
    #[test]
    fn prop_ids_unique_across_clears(
        ops in prop::collection::vec(any::<bool>(), 1..40),
        results in arb_results(),
    ) {
        runtime().block_on(async {
            let store = store();
            let mut seen = HashSet::new();
            for clear in ops {
                if clear {
                    store.clear().await.unwrap();
                    prop_assert!(store.is_empty().await);
                } else {
                    let id = store.save(&Flags::new(), &results).await.unwrap();
                    prop_assert!(seen.insert(id));
                }
            }
            Ok(())
        })?;
    }

    /// Property: related runs cover every other run exactly once
    #[test]
    fn prop_related_runs_partition(runs in prop::collection::vec(arb_results(), 1..12)) {
        runtime().block_on(async {
            let store = store();
            let mut ids = Vec::new();
            for results in &runs {
                ids.push(store.save(&Flags::new(), results).await.unwrap());
            }
            for id in &ids {
                let related = store.related_runs(id).await.unwrap();
                prop_assert_eq!(related.len(), ids.len() - 1);
                prop_assert!(related.earlier.iter().chain(&related.later).all(|s| &s.id != id));
            }
            Ok(())
        })?;
    }

    /// Property: merged flags take additional values and keep the rest
    #[test]
    fn prop_merge_flags_precedence(base in arb_flags(), additional in arb_flags()) {
        let merged = merge_flags(&base, additional.clone());
        for (key, value) in &additional {
            prop_assert_eq!(&merged[key], value);
        }
        for (key, value) in &base {
            if !additional.contains_key(key) {
                prop_assert_eq!(&merged[key], value);
            }
        }
        prop_assert!(merged.keys().all(|k| base.contains_key(k) || additional.contains_key(k)));
    }
}
