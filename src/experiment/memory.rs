//! In-memory run store using `DashMap`.
//!
//! This is the default backend - runs are lost when the session ends.
//! For bounded memory with large traces, use `DirectoryRunStore`.

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use super::id::{IdAllocator, IdScheme};
use super::run_record::{RelatedRuns, RunEntry, RunId, RunStamp};
use super::{AuditTarget, Flags, RunStore};
use crate::{Error, Result};

/// In-memory run store using a sharded concurrent hashmap.
///
/// # Example
///
/// ```rust
/// use perfx::experiment::{AuditTarget, Flags, MemoryRunStore, RunStore};
/// use serde_json::json;
///
/// # async fn example() -> perfx::Result<()> {
/// let store = MemoryRunStore::new(AuditTarget::new("http://example.com/", json!(null)));
/// let results = json!({"generatedTime": "2024-01-01T00:00:00Z", "url": "http://example.com/"});
/// let id = store.save(&Flags::new(), &results).await?;
/// assert_eq!(store.results(&id).await?, results);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryRunStore {
    target: AuditTarget,
    ids: IdAllocator,
    runs: DashMap<RunId, StoredRun>,
}

#[derive(Debug)]
struct StoredRun {
    entry: RunEntry,
    flags: Flags,
    results: Value,
}

impl MemoryRunStore {
    /// Create an empty store with sequential ids.
    #[must_use]
    pub fn new(target: AuditTarget) -> Self {
        Self::with_id_scheme(target, IdScheme::default())
    }

    /// Create an empty store with the given id scheme.
    #[must_use]
    pub fn with_id_scheme(target: AuditTarget, scheme: IdScheme) -> Self {
        Self {
            target,
            ids: IdAllocator::new(scheme),
            runs: DashMap::new(),
        }
    }

    /// Id scheme used for new runs.
    #[must_use]
    pub const fn id_scheme(&self) -> IdScheme {
        self.ids.scheme()
    }

    fn read<T>(&self, id: &RunId, f: impl FnOnce(&StoredRun) -> T) -> Result<T> {
        self.runs
            .get(id)
            .map(|run| f(run.value()))
            .ok_or_else(|| Error::run_not_found(id))
    }
}

impl RunStore for MemoryRunStore {
    fn target(&self) -> &AuditTarget {
        &self.target
    }

    async fn save(&self, flags: &Flags, results: &Value) -> Result<RunId> {
        let stamp = RunStamp::from_results(results)?;
        let (seq, id) = self.ids.allocate(&stamp);
        let run = StoredRun {
            entry: RunEntry::new(seq, stamp),
            flags: flags.clone(),
            results: results.clone(),
        };
        self.runs.insert(id.clone(), run);
        debug!(run_id = %id, "saved run in memory");
        Ok(id)
    }

    async fn flags(&self, id: &RunId) -> Result<Flags> {
        self.read(id, |run| run.flags.clone())
    }

    async fn results(&self, id: &RunId) -> Result<Value> {
        self.read(id, |run| run.results.clone())
    }

    async fn generated_time(&self, id: &RunId) -> Result<String> {
        self.read(id, |run| run.entry.generated_time().to_string())
    }

    async fn contains(&self, id: &RunId) -> bool {
        self.runs.contains_key(id)
    }

    async fn len(&self) -> usize {
        self.runs.len()
    }

    async fn related_runs(&self, id: &RunId) -> Result<RelatedRuns> {
        let base = self.read(id, |run| run.entry.clone())?;
        let others: Vec<(RunId, RunEntry)> = self
            .runs
            .iter()
            .filter(|run| run.key() != id)
            .map(|run| (run.key().clone(), run.value().entry.clone()))
            .collect();
        Ok(RelatedRuns::partition(&base, others, self.target.url()))
    }

    async fn clear(&self) -> Result<()> {
        self.runs.clear();
        debug!("cleared in-memory runs");
        Ok(())
    }
}
