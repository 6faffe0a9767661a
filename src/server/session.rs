//! Experiment Session - everything the router needs for one hosted session
//!
//! The session owns its store. Handlers reach it through `Arc` state; there
//! is no process-wide store.

use std::sync::Arc;

use tracing::debug;

use crate::audit::{AuditEngine, RunCoordinator};
use crate::experiment::{blocked_url_patterns, Flags, RunId, RunStore};
use crate::report::ReportRenderer;
use crate::{Error, Result};

/// Store, coordinator and renderer of one hosted session.
pub struct ExperimentSession<S, E> {
    store: S,
    coordinator: RunCoordinator<E>,
    renderer: Arc<dyn ReportRenderer>,
    initial_id: RunId,
    report_context: String,
}

impl<S: RunStore, E: AuditEngine> ExperimentSession<S, E> {
    /// Assemble a session whose default run is `initial_id`.
    pub fn new(
        store: S,
        engine: E,
        renderer: Arc<dyn ReportRenderer>,
        initial_id: RunId,
        report_context: impl Into<String>,
    ) -> Self {
        Self {
            store,
            coordinator: RunCoordinator::new(engine),
            renderer,
            initial_id,
            report_context: report_context.into(),
        }
    }

    /// Get the run store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Get the rerun coordinator.
    pub const fn coordinator(&self) -> &RunCoordinator<E> {
        &self.coordinator
    }

    /// Run selected when a request names none: the session's first run.
    pub const fn initial_id(&self) -> &RunId {
        &self.initial_id
    }

    /// Resolve an optional requested id.
    ///
    /// Only an absent id falls back to the initial run; an empty string is
    /// an id like any other.
    #[must_use]
    pub fn resolve_id(&self, requested: Option<String>) -> RunId {
        requested.map_or_else(|| self.initial_id.clone(), RunId::from)
    }

    /// HTML report for `id`, linked to the session's other runs.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is not stored
    pub async fn report_html(&self, id: &RunId) -> Result<String> {
        let run = self.store.run(id).await?;
        let related = self.store.related_runs(id).await?;
        debug!(run_id = %id, related = related.len(), "rendering report");
        self.renderer
            .render(run.results(), &related, &self.report_context)
    }

    /// `blockedUrlPatterns` of `id`, empty when unset.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is not stored
    pub async fn blocked_url_patterns(&self, id: &RunId) -> Result<Vec<String>> {
        let flags = self.store.flags(id).await?;
        Ok(blocked_url_patterns(&flags))
    }

    /// Rerun `base_id` with the JSON flag object in `body`.
    ///
    /// An empty body means no additional flags. The base id is checked
    /// before the body is parsed.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `base_id` is not stored
    /// - `Json` if `body` is not a JSON object
    /// - `AuditFailed` if the engine fails
    pub async fn rerun(&self, base_id: &RunId, body: &[u8]) -> Result<RunId> {
        if !self.store.contains(base_id).await {
            return Err(Error::run_not_found(base_id));
        }
        let additional = parse_flags(body)?;
        self.coordinator
            .rerun(&self.store, base_id, additional)
            .await
    }
}

/// Parse a rerun body into flags.
///
/// # Errors
///
/// `Json` unless `body` is empty or a JSON object
pub fn parse_flags(body: &[u8]) -> Result<Flags> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Flags::new());
    }
    Ok(serde_json::from_slice(body)?)
}
