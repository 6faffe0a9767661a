//! Audit engine backed by an external command-line auditor.
//!
//! The command is invoked as `<program> <args..> <url> <flag options..>`
//! and must print the results as JSON on stdout.

use std::ffi::OsString;
use std::process::Stdio;

use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use super::AuditEngine;
use crate::experiment::Flags;
use crate::{Error, Result};

/// Runs an auditing CLI per audit.
///
/// Flags become command-line options: `true` → `--name`,
/// `false` → `--name=false`, strings and numbers → `--name=value`,
/// arrays → `--name v1 v2 ..`, objects → `--name=<json>`; nulls are
/// skipped. camelCase flag names are passed in kebab-case.
#[derive(Debug, Clone)]
pub struct CommandAuditEngine {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandAuditEngine {
    /// Create an engine running `program` with leading `args`.
    #[must_use]
    pub fn new<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Full argument list for one audit, excluding the program.
    #[must_use]
    pub fn command_args(&self, url: &str, flags: &Flags, config: &Value) -> Vec<OsString> {
        let mut args = self.args.clone();
        args.push(url.into());
        args.extend(flag_args(flags).into_iter().map(OsString::from));
        if !config.is_null() {
            args.push(format!("--config-json={config}").into());
        }
        args
    }
}

impl AuditEngine for CommandAuditEngine {
    async fn run(&self, url: &str, flags: &Flags, config: &Value) -> Result<Value> {
        let args = self.command_args(url, flags, config);
        debug!(program = ?self.program, ?args, "spawning audit command");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                Error::AuditFailed(format!("failed to start {:?}: {e}", self.program))
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(Error::AuditFailed(format!(
                "{:?} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        if !stderr.trim().is_empty() {
            warn!(stderr = %stderr.trim(), "audit command wrote to stderr");
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::AuditFailed(format!("audit output is not JSON: {e}")))
    }
}

/// Render flags as command-line options.
fn flag_args(flags: &Flags) -> Vec<String> {
    let mut args = Vec::new();
    for (name, value) in flags {
        let option = format!("--{}", kebab_case(name));
        match value {
            Value::Null => {}
            Value::Bool(true) => args.push(option),
            Value::Bool(false) => args.push(format!("{option}=false")),
            Value::String(s) => args.push(format!("{option}={s}")),
            Value::Number(n) => args.push(format!("{option}={n}")),
            Value::Array(items) => {
                args.push(option);
                args.extend(items.iter().map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }));
            }
            Value::Object(_) => args.push(format!("{option}={value}")),
        }
    }
    args
}

fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
