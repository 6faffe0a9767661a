//! Run id assignment

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::run_record::{RunId, RunStamp};
use crate::Error;

/// How a store derives identifiers for new runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdScheme {
    /// Decimal insertion sequence: `0`, `1`, `2`, ...
    #[default]
    Sequence,
    /// `<host>_<YYYY-MM-DD>_<HH-MM-SS>_<sequence>` from the run's results
    Content,
}

impl IdScheme {
    /// Get scheme name as string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::Content => "content",
        }
    }
}

impl fmt::Display for IdScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequence" | "seq" => Ok(Self::Sequence),
            "content" => Ok(Self::Content),
            other => Err(Error::InvalidInput(format!(
                "unknown id scheme '{other}' (expected 'sequence' or 'content')"
            ))),
        }
    }
}

/// Serialized id source shared by every save of one store.
///
/// The counter is never reset, so an id issued before `clear()` can not
/// resolve to a run saved afterwards.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    scheme: IdScheme,
    next: AtomicU64,
}

impl IdAllocator {
    pub const fn new(scheme: IdScheme) -> Self {
        Self {
            scheme,
            next: AtomicU64::new(0),
        }
    }

    pub const fn scheme(&self) -> IdScheme {
        self.scheme
    }

    /// Reserve the next sequence number and build the id for it.
    pub fn allocate(&self, stamp: &RunStamp) -> (u64, RunId) {
        let seq = self.next.fetch_add(1, Ordering::SeqCst);
        let id = match self.scheme {
            IdScheme::Sequence => seq.to_string(),
            IdScheme::Content => format!(
                "{}_{}_{seq}",
                sanitize(host_of(stamp.url.as_deref().unwrap_or_default())),
                stamp.timestamp.format("%Y-%m-%d_%H-%M-%S"),
            ),
        };
        (seq, RunId::new(id))
    }
}

/// Host portion of a URL, or an empty string when there is none.
fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    host.split(':').next().unwrap_or_default()
}

fn sanitize(raw: &str) -> String {
    if raw.is_empty() {
        return "run".to_string();
    }
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}
