#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use perfx::audit::{AuditEngine, CommandAuditEngine};
use perfx::experiment::{Flags, IdScheme, StoreBackend, BLOCKED_URL_PATTERNS_FLAG};
use perfx::host::{host_experiment, ExperimentParams};
use perfx::HostConfig;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Host a performance experiment: audit a page once, serve the report and
/// accept reruns with modified flags.
#[derive(Parser, Debug)]
#[command(name = "perfx", version, about)]
struct Cli {
    /// URL to audit
    url: String,

    /// Auditing command; invoked with the URL and flags, must print JSON results
    #[arg(long, default_value = "lighthouse")]
    engine: String,

    /// Leading argument for the auditing command (repeatable)
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// URL patterns to block in the initial run
    #[arg(long = "blocked-url-patterns", num_args = 1..)]
    blocked_url_patterns: Vec<String>,

    /// Additional initial flags as a JSON object
    #[arg(long)]
    flags: Option<String>,

    /// Audit configuration file (JSON), fixed for every run
    #[arg(long)]
    config_path: Option<PathBuf>,

    /// Listener address [default: 127.0.0.1:0]
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Run store backend: memory or directory
    #[arg(long)]
    store: Option<String>,

    /// Parent directory of the session directory (directory store)
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Run id scheme: sequence or content
    #[arg(long)]
    id_scheme: Option<String>,

    /// Do not open the report in a browser
    #[arg(long)]
    no_open: bool,
}

impl Cli {
    fn host_config(&self) -> Result<HostConfig> {
        let mut config = HostConfig::from_env()?;
        if let Some(bind) = self.bind {
            config = config.with_bind(bind);
        }
        match self.store.as_deref() {
            None => {
                if let Some(dir) = &self.store_dir {
                    config = config.with_store(StoreBackend::Directory {
                        parent: Some(dir.clone()),
                    });
                }
            }
            Some("memory") => config = config.with_store(StoreBackend::Memory),
            Some("directory") => {
                config = config.with_store(StoreBackend::Directory {
                    parent: self.store_dir.clone(),
                });
            }
            Some(other) => bail!("unknown store backend '{other}' (expected memory or directory)"),
        }
        if let Some(scheme) = &self.id_scheme {
            config = config.with_id_scheme(scheme.parse::<IdScheme>()?);
        }
        if self.no_open {
            config = config.with_open_browser(false);
        }
        Ok(config)
    }

    fn experiment_params(&self) -> Result<ExperimentParams> {
        let mut flags = match &self.flags {
            Some(raw) => serde_json::from_str::<Flags>(raw).context("--flags must be a JSON object")?,
            None => Flags::new(),
        };
        if !self.blocked_url_patterns.is_empty() {
            flags.insert(
                BLOCKED_URL_PATTERNS_FLAG.to_string(),
                Value::from(self.blocked_url_patterns.clone()),
            );
        }

        let config = match &self.config_path {
            Some(path) => {
                let raw = std::fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_slice(&raw)
                    .with_context(|| format!("{} is not valid JSON", path.display()))?
            }
            None => Value::Null,
        };

        Ok(ExperimentParams {
            url: self.url.clone(),
            flags,
            config,
        })
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.host_config()?;
    let params = cli.experiment_params()?;
    let engine = CommandAuditEngine::new(&cli.engine, &cli.engine_args);

    info!(url = %params.url, engine = %cli.engine, "running initial audit");
    let results = engine
        .run(&params.url, &params.flags, &params.config)
        .await
        .context("initial audit failed")?;

    host_experiment(params, &results, engine, config)
        .await
        .context("experiment host failed")?;
    Ok(())
}
