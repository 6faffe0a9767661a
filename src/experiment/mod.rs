//! Experiment Store - keyed, isolated storage of audit runs
//!
//! Every hosted session owns exactly one store. A store is bound to the
//! audited URL and the audit configuration, which stay fixed across
//! reruns; only the flags change from run to run.
//!
//! ## Isolation
//!
//! `save` takes its payloads by reference and keeps its own copy, and every
//! read hands back an owned copy. Nothing a caller does to its values can
//! reach the stored run, and vice versa.
//!
//! ## Backends
//!
//! - [`MemoryRunStore`]: resident `DashMap`, the default
//! - [`DirectoryRunStore`]: one temp directory per session, one
//!   sub-directory per run holding `flags.json` and `results.json`
//!
//! [`SessionStore`] picks one of them from configuration.
//!
//! ## Usage
//!
//! ```rust
//! use perfx::experiment::{AuditTarget, Flags, MemoryRunStore, RunStore};
//! use serde_json::json;
//!
//! # async fn example() -> perfx::Result<()> {
//! let store = MemoryRunStore::new(AuditTarget::new("http://example.com/", json!(null)));
//!
//! let mut flags = Flags::new();
//! flags.insert("blockedUrlPatterns".into(), json!([".jpg"]));
//! let results = json!({"generatedTime": "2024-01-01T00:00:00.000Z", "url": "http://example.com/"});
//!
//! let id = store.save(&flags, &results).await?;
//! assert_eq!(store.flags(&id).await?, flags);
//!
//! store.clear().await?;
//! assert!(store.results(&id).await.is_err());
//! # Ok(())
//! # }
//! ```

mod directory;
mod id;
mod memory;
mod run_record;
mod store;

pub use directory::DirectoryRunStore;
pub use id::IdScheme;
pub use memory::MemoryRunStore;
pub use run_record::{
    blocked_url_patterns, ExperimentRun, RelatedRuns, RunId, RunSummary,
    BLOCKED_URL_PATTERNS_FLAG,
};
pub use store::{SessionStore, StoreBackend};

use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

/// Audit options of one run, keyed by option name.
pub type Flags = serde_json::Map<String, Value>;

/// The URL and fixed audit configuration a store is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTarget {
    url: String,
    config: Value,
}

impl AuditTarget {
    /// Create a target for `url` audited with `config`.
    #[must_use]
    pub fn new(url: impl Into<String>, config: Value) -> Self {
        Self {
            url: url.into(),
            config,
        }
    }

    /// Get the audited URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the audit configuration.
    #[must_use]
    pub const fn config(&self) -> &Value {
        &self.config
    }
}

/// Storage of experiment runs for one hosted session.
///
/// Implementations must serialize id assignment and make a run visible
/// only once `save` has returned.
pub trait RunStore: Send + Sync {
    /// The URL and audit configuration this store is bound to.
    fn target(&self) -> &AuditTarget;

    /// Copy `flags` and `results` into the store under a fresh id.
    ///
    /// Fails with `InvalidInput` if `results` has no RFC 3339
    /// `generatedTime`. Nothing is recorded on failure.
    fn save(&self, flags: &Flags, results: &Value)
        -> impl Future<Output = Result<RunId>> + Send;

    /// Copy of the flags stored for `id`.
    fn flags(&self, id: &RunId) -> impl Future<Output = Result<Flags>> + Send;

    /// Copy of the results stored for `id`.
    fn results(&self, id: &RunId) -> impl Future<Output = Result<Value>> + Send;

    /// The `generatedTime` recorded for `id`.
    fn generated_time(&self, id: &RunId) -> impl Future<Output = Result<String>> + Send;

    /// Check if a run exists.
    fn contains(&self, id: &RunId) -> impl Future<Output = bool> + Send;

    /// Number of stored runs.
    fn len(&self) -> impl Future<Output = usize> + Send;

    /// Every other run, split into earlier and later than `id`.
    fn related_runs(&self, id: &RunId) -> impl Future<Output = Result<RelatedRuns>> + Send;

    /// Remove every run and release backing storage. Idempotent.
    fn clear(&self) -> impl Future<Output = Result<()>> + Send;

    /// Check if the store holds no runs.
    fn is_empty(&self) -> impl Future<Output = bool> + Send {
        async move { self.len().await == 0 }
    }

    /// Flags, results and timestamp of `id` in one record.
    fn run(&self, id: &RunId) -> impl Future<Output = Result<ExperimentRun>> + Send {
        async move {
            let flags = self.flags(id).await?;
            let results = self.results(id).await?;
            let generated_time = self.generated_time(id).await?;
            Ok(ExperimentRun::new(id.clone(), flags, results, generated_time))
        }
    }
}
