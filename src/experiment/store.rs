//! Session Store - the run store a hosted session is configured with
//!
//! Callers program against [`RunStore`]; the backend is picked once from
//! [`StoreBackend`] when the session starts.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    AuditTarget, DirectoryRunStore, Flags, IdScheme, MemoryRunStore, RelatedRuns, RunId,
    RunStore,
};
use crate::Result;

/// Where a session keeps its runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum StoreBackend {
    /// Resident map (default)
    #[default]
    Memory,
    /// Temp directory per session, optionally under `parent`
    Directory {
        /// Directory the session directory is created in
        parent: Option<PathBuf>,
    },
}

impl StoreBackend {
    /// Get backend name as string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Directory { .. } => "directory",
        }
    }
}

/// Run store chosen by configuration.
#[derive(Debug)]
pub enum SessionStore {
    /// In-memory backend
    Memory(MemoryRunStore),
    /// Directory backend
    Directory(DirectoryRunStore),
}

impl SessionStore {
    /// Create the store described by `backend`, bound to `target`.
    ///
    /// # Errors
    ///
    /// Returns error if a directory backend cannot create its session directory
    pub fn create(target: AuditTarget, backend: &StoreBackend, scheme: IdScheme) -> Result<Self> {
        Ok(match backend {
            StoreBackend::Memory => Self::Memory(MemoryRunStore::with_id_scheme(target, scheme)),
            StoreBackend::Directory { parent } => {
                Self::Directory(DirectoryRunStore::build(target, parent.clone(), scheme)?)
            }
        })
    }

    /// Get backend name as string
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Directory(_) => "directory",
        }
    }

    /// Id scheme used for new runs.
    #[must_use]
    pub const fn id_scheme(&self) -> IdScheme {
        match self {
            Self::Memory(store) => store.id_scheme(),
            Self::Directory(store) => store.id_scheme(),
        }
    }
}

impl RunStore for SessionStore {
    fn target(&self) -> &AuditTarget {
        match self {
            Self::Memory(store) => store.target(),
            Self::Directory(store) => store.target(),
        }
    }

    async fn save(&self, flags: &Flags, results: &Value) -> Result<RunId> {
        match self {
            Self::Memory(store) => store.save(flags, results).await,
            Self::Directory(store) => store.save(flags, results).await,
        }
    }

    async fn flags(&self, id: &RunId) -> Result<Flags> {
        match self {
            Self::Memory(store) => store.flags(id).await,
            Self::Directory(store) => store.flags(id).await,
        }
    }

    async fn results(&self, id: &RunId) -> Result<Value> {
        match self {
            Self::Memory(store) => store.results(id).await,
            Self::Directory(store) => store.results(id).await,
        }
    }

    async fn generated_time(&self, id: &RunId) -> Result<String> {
        match self {
            Self::Memory(store) => store.generated_time(id).await,
            Self::Directory(store) => store.generated_time(id).await,
        }
    }

    async fn contains(&self, id: &RunId) -> bool {
        match self {
            Self::Memory(store) => store.contains(id).await,
            Self::Directory(store) => store.contains(id).await,
        }
    }

    async fn len(&self) -> usize {
        match self {
            Self::Memory(store) => store.len().await,
            Self::Directory(store) => store.len().await,
        }
    }

    async fn related_runs(&self, id: &RunId) -> Result<RelatedRuns> {
        match self {
            Self::Memory(store) => store.related_runs(id).await,
            Self::Directory(store) => store.related_runs(id).await,
        }
    }

    async fn clear(&self) -> Result<()> {
        match self {
            Self::Memory(store) => store.clear().await,
            Self::Directory(store) => store.clear().await,
        }
    }
}
