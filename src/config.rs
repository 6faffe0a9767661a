//! Host configuration
//!
//! Defaults suit an interactive session: ephemeral port on loopback,
//! in-memory runs, sequential ids, browser opened, Ctrl-C handled.
//! `from_env` layers `PERFX_*` variables on top.

use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::experiment::{IdScheme, StoreBackend};
use crate::report::DEFAULT_REPORT_CONTEXT;
use crate::{Error, Result};

/// Settings for one hosted experiment session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Listener address; port `0` lets the OS pick one
    pub bind: SocketAddr,
    /// Where runs are stored
    pub store: StoreBackend,
    /// How run ids are derived
    pub id_scheme: IdScheme,
    /// Open the report in a browser once listening
    pub open_browser: bool,
    /// Tear down on SIGINT/SIGTERM
    pub handle_interrupt: bool,
    /// Context tag passed to the report renderer
    pub report_context: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            store: StoreBackend::Memory,
            id_scheme: IdScheme::Sequence,
            open_browser: true,
            handle_interrupt: true,
            report_context: DEFAULT_REPORT_CONTEXT.to_string(),
        }
    }
}

impl HostConfig {
    /// Defaults overridden by `PERFX_*` environment variables.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `PERFX_BIND` | listener address, e.g. `127.0.0.1:0` |
    /// | `PERFX_STORE` | `memory` or `directory` |
    /// | `PERFX_STORE_DIR` | parent of the session directory (implies `directory`) |
    /// | `PERFX_ID_SCHEME` | `sequence` or `content` |
    /// | `PERFX_OPEN_BROWSER` | `true`/`false` |
    /// | `PERFX_REPORT_CONTEXT` | report context tag |
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for values that do not parse
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for values that do not parse
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(bind) = lookup("PERFX_BIND") {
            config.bind = bind
                .trim()
                .parse()
                .map_err(|e| Error::InvalidInput(format!("invalid PERFX_BIND '{bind}': {e}")))?;
        }

        let store_dir = lookup("PERFX_STORE_DIR").filter(|d| !d.trim().is_empty());
        match lookup("PERFX_STORE").as_deref().map(str::trim) {
            None | Some("") => {
                if let Some(dir) = store_dir {
                    config.store = StoreBackend::Directory {
                        parent: Some(PathBuf::from(dir)),
                    };
                }
            }
            Some("memory") => config.store = StoreBackend::Memory,
            Some("directory") => {
                config.store = StoreBackend::Directory {
                    parent: store_dir.map(PathBuf::from),
                };
            }
            Some(other) => {
                return Err(Error::InvalidInput(format!(
                    "invalid PERFX_STORE '{other}' (expected 'memory' or 'directory')"
                )))
            }
        }

        if let Some(scheme) = lookup("PERFX_ID_SCHEME") {
            config.id_scheme = scheme.parse()?;
        }
        if let Some(open) = lookup("PERFX_OPEN_BROWSER") {
            config.open_browser = parse_bool("PERFX_OPEN_BROWSER", &open)?;
        }
        if let Some(context) = lookup("PERFX_REPORT_CONTEXT") {
            config.report_context = context;
        }
        Ok(config)
    }

    /// Set the listener address.
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Set the store backend.
    #[must_use]
    pub fn with_store(mut self, store: StoreBackend) -> Self {
        self.store = store;
        self
    }

    /// Set the id scheme.
    #[must_use]
    pub fn with_id_scheme(mut self, scheme: IdScheme) -> Self {
        self.id_scheme = scheme;
        self
    }

    /// Enable or disable opening the browser.
    #[must_use]
    pub fn with_open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    /// Enable or disable SIGINT/SIGTERM teardown.
    #[must_use]
    pub fn with_interrupt_handler(mut self, handle: bool) -> Self {
        self.handle_interrupt = handle;
        self
    }

    /// Set the report context tag.
    #[must_use]
    pub fn with_report_context(mut self, context: impl Into<String>) -> Self {
        self.report_context = context.into();
        self
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Ok(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Ok(false),
        other => Err(Error::InvalidInput(format!(
            "invalid {name} '{other}' (expected true or false)"
        ))),
    }
}
