//! Audit engine seam and the rerun coordinator
//!
//! The audit engine is opaque: given a URL, flags and the session's audit
//! configuration it eventually produces a results object or fails. The
//! coordinator derives a new run from a stored one and persists it.

mod command;

pub use command::CommandAuditEngine;

use std::future::Future;

use serde_json::Value;
use tracing::{debug, info};

use crate::experiment::{Flags, RunId, RunStore};
use crate::{Error, Result};

/// Top-level results key carrying raw engine state that is never persisted.
pub const ARTIFACTS_KEY: &str = "artifacts";

/// Page-auditing engine.
pub trait AuditEngine: Send + Sync {
    /// Audit `url` with `flags` under `config`.
    ///
    /// The results must contain `generatedTime` and `url`.
    fn run(
        &self,
        url: &str,
        flags: &Flags,
        config: &Value,
    ) -> impl Future<Output = Result<Value>> + Send;
}

/// Overlay `additional` onto a copy of `base`.
///
/// Same-named flags are replaced, every other base flag is kept.
#[must_use]
pub fn merge_flags(base: &Flags, additional: Flags) -> Flags {
    let mut merged = base.clone();
    merged.extend(additional);
    merged
}

/// Remove the top-level `artifacts` entry from engine results.
///
/// Returns whether anything was removed.
pub fn strip_artifacts(results: &mut Value) -> bool {
    results
        .as_object_mut()
        .is_some_and(|results| results.remove(ARTIFACTS_KEY).is_some())
}

/// Derives reruns from stored runs.
#[derive(Debug, Clone)]
pub struct RunCoordinator<E> {
    engine: E,
}

impl<E: AuditEngine> RunCoordinator<E> {
    /// Create a coordinator driving `engine`.
    #[must_use]
    pub const fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Get the audit engine.
    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Audit the store's target with `base_id`'s flags overridden by
    /// `additional` and persist the outcome as a new run.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `base_id` is not stored
    /// - `AuditFailed` if the engine fails or returns unusable results;
    ///   the store is left untouched
    pub async fn rerun<S: RunStore>(
        &self,
        store: &S,
        base_id: &RunId,
        additional: Flags,
    ) -> Result<RunId> {
        let base = store.flags(base_id).await?;
        let flags = merge_flags(&base, additional);
        let target = store.target();

        info!(base_id = %base_id, url = target.url(), "rerunning audit");
        let mut results = self
            .engine
            .run(target.url(), &flags, target.config())
            .await
            .map_err(into_audit_failure)?;

        if strip_artifacts(&mut results) {
            debug!(base_id = %base_id, "dropped engine artifacts before saving");
        }

        let id = store
            .save(&flags, &results)
            .await
            .map_err(|e| match e {
                Error::InvalidInput(msg) => {
                    Error::AuditFailed(format!("engine returned unusable results: {msg}"))
                }
                other => other,
            })?;
        info!(base_id = %base_id, run_id = %id, "rerun saved");
        Ok(id)
    }
}

fn into_audit_failure(err: Error) -> Error {
    match err {
        Error::AuditFailed(_) => err,
        other => Error::AuditFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{AuditTarget, MemoryRunStore};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoEngine {
        calls: AtomicUsize,
    }

    impl AuditEngine for EchoEngine {
        async fn run(&self, url: &str, flags: &Flags, config: &Value) -> Result<Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({
                "generatedTime": format!("2024-01-01T00:00:{:02}.000Z", n + 1),
                "url": url,
                "flagsSeen": flags,
                "configSeen": config,
                "artifacts": {"traces": [1, 2, 3]},
            }))
        }
    }

    struct BrokenEngine;

    impl AuditEngine for BrokenEngine {
        async fn run(&self, _url: &str, _flags: &Flags, _config: &Value) -> Result<Value> {
            Err(Error::Io(std::io::Error::other("chrome crashed")))
        }
    }

    fn flags(value: Value) -> Flags {
        value.as_object().cloned().unwrap()
    }

    async fn seeded() -> (MemoryRunStore, RunId) {
        let store =
            MemoryRunStore::new(AuditTarget::new("http://example.com/", json!({"perf": true})));
        let id = store
            .save(
                &flags(json!({"a": 1, "b": 2})),
                &json!({"generatedTime": "2024-01-01T00:00:00.000Z", "url": "http://example.com/"}),
            )
            .await
            .unwrap();
        (store, id)
    }

    #[test]
    fn test_merge_flags_overrides_and_preserves() {
        let base = flags(json!({"a": 1, "b": 2}));
        let merged = merge_flags(&base, flags(json!({"b": 3, "c": 4})));

        assert_eq!(merged, flags(json!({"a": 1, "b": 3, "c": 4})));
        assert_eq!(base, flags(json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_strip_artifacts() {
        let mut results =
            json!({"generatedTime": "2024-01-01T00:00:00Z", "artifacts": {"traces": []}});
        assert!(strip_artifacts(&mut results));
        assert_eq!(results, json!({"generatedTime": "2024-01-01T00:00:00Z"}));
        assert!(!strip_artifacts(&mut results));

        let mut nested = json!({"audits": {"artifacts": 1}});
        assert!(!strip_artifacts(&mut nested));
        assert_eq!(nested["audits"]["artifacts"], json!(1));
        assert!(!strip_artifacts(&mut json!([1, 2])));
    }

    #[tokio::test]
    async fn test_rerun_merges_and_strips_artifacts() {
        let (store, base_id) = seeded().await;
        let coordinator = RunCoordinator::new(EchoEngine {
            calls: AtomicUsize::new(0),
        });

        let id = coordinator
            .rerun(&store, &base_id, flags(json!({"b": 3, "c": 4})))
            .await
            .unwrap();

        assert_eq!(
            store.flags(&id).await.unwrap(),
            flags(json!({"a": 1, "b": 3, "c": 4}))
        );
        assert_eq!(
            store.flags(&base_id).await.unwrap(),
            flags(json!({"a": 1, "b": 2}))
        );

        let results = store.results(&id).await.unwrap();
        assert!(results.get(ARTIFACTS_KEY).is_none());
        assert_eq!(results["configSeen"], json!({"perf": true}));
        assert_eq!(results["url"], json!("http://example.com/"));
        assert_eq!(coordinator.engine().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rerun_unknown_base() {
        let (store, _) = seeded().await;
        let coordinator = RunCoordinator::new(EchoEngine {
            calls: AtomicUsize::new(0),
        });

        let err = coordinator
            .rerun(&store, &RunId::from("missing"), Flags::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(coordinator.engine().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rerun_engine_failure_leaves_store_untouched() {
        let (store, base_id) = seeded().await;
        let coordinator = RunCoordinator::new(BrokenEngine);

        let err = coordinator
            .rerun(&store, &base_id, Flags::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AuditFailed(ref msg) if msg.contains("chrome crashed")));
        assert_eq!(store.len().await, 1);
    }
}
