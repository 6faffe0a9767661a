//! Run Record - one audit execution and the summaries used to link runs

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Flags;
use crate::{Error, Result};

/// Flag holding the URL patterns the audit engine should block.
pub const BLOCKED_URL_PATTERNS_FLAG: &str = "blockedUrlPatterns";

/// Opaque identifier of a stored run.
///
/// Ids issued by a store only contain `[A-Za-z0-9._-]`, so they can be
/// embedded in a query string without escaping. Ids parsed from requests
/// may contain anything; they simply fail to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Wrap a raw identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the report page for this run, relative to the server root.
    #[must_use]
    pub fn report_url(&self) -> String {
        format!("/?id={}", self.0)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RunId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RunId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A complete stored run: the flags it was audited with and its results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRun {
    id: RunId,
    flags: Flags,
    results: Value,
    generated_time: String,
}

impl ExperimentRun {
    /// Assemble a run from its parts.
    #[must_use]
    pub const fn new(id: RunId, flags: Flags, results: Value, generated_time: String) -> Self {
        Self {
            id,
            flags,
            results,
            generated_time,
        }
    }

    /// Get the run ID.
    #[must_use]
    pub const fn id(&self) -> &RunId {
        &self.id
    }

    /// Get the flags the run was audited with.
    #[must_use]
    pub const fn flags(&self) -> &Flags {
        &self.flags
    }

    /// Get the audit results.
    #[must_use]
    pub const fn results(&self) -> &Value {
        &self.results
    }

    /// Consume the run, returning its results.
    #[must_use]
    pub fn into_results(self) -> Value {
        self.results
    }

    /// Get the recorded `generatedTime`.
    #[must_use]
    pub fn generated_time(&self) -> &str {
        &self.generated_time
    }

    /// URL patterns blocked during this run.
    #[must_use]
    pub fn blocked_url_patterns(&self) -> Vec<String> {
        blocked_url_patterns(&self.flags)
    }
}

/// Extract `blockedUrlPatterns` from a flag set.
///
/// Missing or non-array values yield an empty list; non-string entries
/// are skipped.
#[must_use]
pub fn blocked_url_patterns(flags: &Flags) -> Vec<String> {
    flags
        .get(BLOCKED_URL_PATTERNS_FLAG)
        .and_then(Value::as_array)
        .map(|patterns| {
            patterns
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Navigation entry for another run of the same session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Run identifier
    pub id: RunId,
    /// Audited URL
    pub url: String,
    /// `generatedTime` of the run's results
    pub generated_time: String,
    /// Link to the run's report page
    pub report_url: String,
}

/// Other runs of a session, split around a given run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedRuns {
    /// Runs generated before the given run, oldest first
    pub earlier: Vec<RunSummary>,
    /// Runs generated after the given run, oldest first
    pub later: Vec<RunSummary>,
}

impl RelatedRuns {
    /// Partition `others` around `base` by `(generatedTime, sequence)`.
    pub(crate) fn partition(
        base: &RunEntry,
        others: impl IntoIterator<Item = (RunId, RunEntry)>,
        fallback_url: &str,
    ) -> Self {
        let mut others: Vec<(RunId, RunEntry)> = others.into_iter().collect();
        others.sort_by_key(|(_, entry)| entry.order_key());

        let mut related = Self::default();
        for (id, entry) in others {
            let later = entry.order_key() > base.order_key();
            let summary = entry.summary(id, fallback_url);
            if later {
                related.later.push(summary);
            } else {
                related.earlier.push(summary);
            }
        }
        related
    }

    /// Total number of related runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.earlier.len() + self.later.len()
    }

    /// Whether the run has no siblings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.earlier.is_empty() && self.later.is_empty()
    }
}

/// Fields a store denormalizes out of a results payload at save time.
#[derive(Debug, Clone)]
pub(crate) struct RunStamp {
    pub generated_time: String,
    pub timestamp: DateTime<FixedOffset>,
    pub url: Option<String>,
}

impl RunStamp {
    /// Validate a results payload and pull out its timestamp and URL.
    pub fn from_results(results: &Value) -> Result<Self> {
        let object = results
            .as_object()
            .ok_or_else(|| Error::InvalidInput("results must be a JSON object".to_string()))?;
        let generated_time = object
            .get("generatedTime")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::InvalidInput("results are missing a string `generatedTime`".to_string())
            })?;
        let timestamp = DateTime::parse_from_rfc3339(generated_time).map_err(|e| {
            Error::InvalidInput(format!("invalid generatedTime '{generated_time}': {e}"))
        })?;

        Ok(Self {
            generated_time: generated_time.to_string(),
            timestamp,
            url: object.get("url").and_then(Value::as_str).map(str::to_string),
        })
    }
}

/// Index entry kept for every stored run.
#[derive(Debug, Clone)]
pub(crate) struct RunEntry {
    seq: u64,
    stamp: RunStamp,
}

impl RunEntry {
    pub const fn new(seq: u64, stamp: RunStamp) -> Self {
        Self { seq, stamp }
    }

    pub fn generated_time(&self) -> &str {
        &self.stamp.generated_time
    }

    pub fn order_key(&self) -> (DateTime<FixedOffset>, u64) {
        (self.stamp.timestamp, self.seq)
    }

    fn summary(&self, id: RunId, fallback_url: &str) -> RunSummary {
        RunSummary {
            report_url: id.report_url(),
            url: self
                .stamp
                .url
                .clone()
                .unwrap_or_else(|| fallback_url.to_string()),
            generated_time: self.stamp.generated_time.clone(),
            id,
        }
    }
}
