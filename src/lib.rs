//! # perfx: Performance Experiment Host
//!
//! perfx runs a page audit once, serves the report over a local HTTP
//! server and lets the user rerun the audit with modified flags (for
//! example blocking URL patterns). Every run of a session is kept in a
//! keyed, isolated store so reports can link to earlier and later runs.
//!
//! ## Components
//!
//! - [`experiment`]: the run store (in-memory or temp-directory backed)
//! - [`audit`]: the audit engine seam and the rerun coordinator
//! - [`server`]: the axum router and its error-to-status mapping
//! - [`host`]: launching, interrupt handling and teardown
//!
//! ## Example
//!
//! ```rust,no_run
//! use perfx::audit::CommandAuditEngine;
//! use perfx::experiment::{AuditTarget, Flags, MemoryRunStore};
//! use perfx::host::ExperimentHost;
//! use perfx::HostConfig;
//! use serde_json::json;
//!
//! # async fn example() -> perfx::Result<()> {
//! let store = MemoryRunStore::new(AuditTarget::new("http://example.com/", json!(null)));
//! let engine = CommandAuditEngine::new("lighthouse", ["--output", "json", "--quiet"]);
//! let results = json!({"generatedTime": "2024-01-01T00:00:00Z", "url": "http://example.com/"});
//!
//! let hosted = ExperimentHost::new(store, engine)
//!     .config(HostConfig::default())
//!     .launch(&Flags::new(), &results)
//!     .await?;
//! println!("report at {}", hosted.report_url());
//! hosted.closed().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod audit;
pub mod browser;
pub mod config;
pub mod error;
pub mod experiment;
pub mod host;
pub mod report;
pub mod server;

pub use config::HostConfig;
pub use error::{Error, Result};
