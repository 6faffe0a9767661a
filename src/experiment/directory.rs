//! Directory-backed run store.
//!
//! Runs live in a per-session temp directory (`experiment-data-XXXXXX`),
//! one sub-directory per run id holding `flags.json` and `results.json`.
//! Only the timestamp index stays resident, so large audit traces do not
//! accumulate in memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::id::{IdAllocator, IdScheme};
use super::run_record::{RelatedRuns, RunEntry, RunId, RunStamp};
use super::{AuditTarget, Flags, RunStore};
use crate::{Error, Result};

const ROOT_PREFIX: &str = "experiment-data-";
const FLAGS_FILE: &str = "flags.json";
const RESULTS_FILE: &str = "results.json";

/// Run store persisting each run to its own directory.
///
/// Saves and clears are serialized by one mutex; reads hold it only long
/// enough to resolve a path.
#[derive(Debug)]
pub struct DirectoryRunStore {
    target: AuditTarget,
    ids: IdAllocator,
    parent: Option<PathBuf>,
    state: Mutex<DirectoryState>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    root: Option<TempDir>,
    index: HashMap<RunId, RunEntry>,
}

impl DirectoryRunStore {
    /// Create a store rooted in a fresh directory under the system temp dir.
    ///
    /// # Errors
    ///
    /// Returns error if the session directory cannot be created
    pub fn create(target: AuditTarget) -> Result<Self> {
        Self::build(target, None, IdScheme::default())
    }

    /// Create a store rooted in a fresh directory under `parent`.
    ///
    /// # Errors
    ///
    /// Returns error if the session directory cannot be created
    pub fn create_in(parent: impl Into<PathBuf>, target: AuditTarget) -> Result<Self> {
        Self::build(target, Some(parent.into()), IdScheme::default())
    }

    /// Create a store with an explicit parent directory and id scheme.
    ///
    /// # Errors
    ///
    /// Returns error if the session directory cannot be created
    pub fn build(target: AuditTarget, parent: Option<PathBuf>, scheme: IdScheme) -> Result<Self> {
        let root = session_root(parent.as_deref())?;
        debug!(root = %root.path().display(), "created experiment directory");
        Ok(Self {
            target,
            ids: IdAllocator::new(scheme),
            parent,
            state: Mutex::new(DirectoryState {
                root: Some(root),
                index: HashMap::new(),
            }),
        })
    }

    /// Id scheme used for new runs.
    #[must_use]
    pub const fn id_scheme(&self) -> IdScheme {
        self.ids.scheme()
    }

    /// Current session directory, `None` once cleared.
    pub async fn root(&self) -> Option<PathBuf> {
        let state = self.state.lock().await;
        state.root.as_ref().map(|root| root.path().to_path_buf())
    }

    async fn run_file(&self, id: &RunId, file: &str) -> Result<PathBuf> {
        let state = self.state.lock().await;
        match (&state.root, state.index.contains_key(id)) {
            (Some(root), true) => Ok(root.path().join(id.as_str()).join(file)),
            _ => Err(Error::run_not_found(id)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, id: &RunId, file: &str) -> Result<T> {
        let path = self.run_file(id, file).await?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            // cleared between resolving the path and reading it
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::run_not_found(id))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn session_root(parent: Option<&Path>) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(ROOT_PREFIX);
    let root = match parent {
        Some(parent) => builder.tempdir_in(parent)?,
        None => builder.tempdir()?,
    };
    Ok(root)
}

async fn write_run(run_dir: &Path, flags: &[u8], results: &[u8]) -> Result<()> {
    tokio::fs::create_dir(run_dir).await?;
    tokio::fs::write(run_dir.join(FLAGS_FILE), flags).await?;
    tokio::fs::write(run_dir.join(RESULTS_FILE), results).await?;
    Ok(())
}

impl RunStore for DirectoryRunStore {
    fn target(&self) -> &AuditTarget {
        &self.target
    }

    async fn save(&self, flags: &Flags, results: &Value) -> Result<RunId> {
        let stamp = RunStamp::from_results(results)?;
        let flags_json = serde_json::to_vec(flags)?;
        let results_json = serde_json::to_vec(results)?;

        let mut state = self.state.lock().await;
        let root = match &state.root {
            Some(root) => root.path().to_path_buf(),
            None => {
                let root = session_root(self.parent.as_deref())?;
                let path = root.path().to_path_buf();
                debug!(root = %path.display(), "recreated experiment directory");
                state.root = Some(root);
                path
            }
        };

        let (seq, id) = self.ids.allocate(&stamp);
        let run_dir = root.join(id.as_str());
        if let Err(err) = write_run(&run_dir, &flags_json, &results_json).await {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&run_dir).await {
                warn!(run_id = %id, error = %cleanup, "failed to remove partial run directory");
            }
            return Err(err);
        }

        state.index.insert(id.clone(), RunEntry::new(seq, stamp));
        debug!(run_id = %id, dir = %run_dir.display(), "saved run to disk");
        Ok(id)
    }

    async fn flags(&self, id: &RunId) -> Result<Flags> {
        self.read_json(id, FLAGS_FILE).await
    }

    async fn results(&self, id: &RunId) -> Result<Value> {
        self.read_json(id, RESULTS_FILE).await
    }

    async fn generated_time(&self, id: &RunId) -> Result<String> {
        let state = self.state.lock().await;
        state
            .index
            .get(id)
            .map(|entry| entry.generated_time().to_string())
            .ok_or_else(|| Error::run_not_found(id))
    }

    async fn contains(&self, id: &RunId) -> bool {
        self.state.lock().await.index.contains_key(id)
    }

    async fn len(&self) -> usize {
        self.state.lock().await.index.len()
    }

    async fn related_runs(&self, id: &RunId) -> Result<RelatedRuns> {
        let state = self.state.lock().await;
        let base = state
            .index
            .get(id)
            .ok_or_else(|| Error::run_not_found(id))?;
        let others = state
            .index
            .iter()
            .filter(|(key, _)| *key != id)
            .map(|(key, entry)| (key.clone(), entry.clone()));
        Ok(RelatedRuns::partition(base, others, self.target.url()))
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.index.clear();
        if let Some(root) = state.root.take() {
            let path = root.path().to_path_buf();
            tokio::task::spawn_blocking(move || root.close())
                .await
                .map_err(|e| Error::Internal(format!("directory cleanup task failed: {e}")))??;
            debug!(root = %path.display(), "removed experiment directory");
        }
        Ok(())
    }
}
