//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use perfx::audit::AuditEngine;
use perfx::browser::NoBrowser;
use perfx::experiment::{Flags, RunStore};
use perfx::host::{ExperimentHost, HostedExperiment};
use perfx::{Error, HostConfig, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Engine that echoes its inputs back as results.
///
/// Each call gets a `generatedTime` one second after the previous one.
#[derive(Debug, Default)]
pub struct FakeEngine {
    calls: AtomicUsize,
}

impl FakeEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AuditEngine for FakeEngine {
    async fn run(&self, url: &str, flags: &Flags, config: &Value) -> Result<Value> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({
            "generatedTime": format!("2024-01-01T00:{:02}:{:02}.000Z", n / 60, n % 60),
            "url": url,
            "flags": flags,
            "config": config,
            "artifacts": {"devtoolsLogs": ["large"]},
        }))
    }
}

/// Engine that always fails.
#[derive(Debug, Default)]
pub struct FailingEngine;

impl AuditEngine for FailingEngine {
    async fn run(&self, _url: &str, _flags: &Flags, _config: &Value) -> Result<Value> {
        Err(Error::AuditFailed("page never loaded".to_string()))
    }
}

pub fn flags(value: Value) -> Flags {
    value.as_object().cloned().expect("flags fixture must be an object")
}

pub fn results(time: &str, url: &str) -> Value {
    json!({"generatedTime": time, "url": url})
}

/// Initial results modelled on a full audit report.
pub fn sample_results() -> Value {
    json!({
        "generatedTime": "2017-02-22T16:47:36.512Z",
        "initialUrl": "https://www.example.com/",
        "url": "https://www.example.com/",
        "audits": {
            "first-meaningful-paint": {"score": 78, "rawValue": 2135.2},
            "is-on-https": {"score": true},
        },
        "aggregations": [{"name": "Progressive Web App", "total": 0.8}],
    })
}

pub fn host_config() -> HostConfig {
    HostConfig::default()
        .with_open_browser(false)
        .with_interrupt_handler(false)
}

pub async fn launch<S, E>(store: S, engine: E, initial_flags: &Flags) -> HostedExperiment<S, E>
where
    S: RunStore + 'static,
    E: AuditEngine + 'static,
{
    ExperimentHost::new(store, engine)
        .browser(Arc::new(NoBrowser))
        .config(host_config())
        .launch(initial_flags, &sample_results())
        .await
        .expect("launch experiment host")
}

/// Send one HTTP/1.1 request and return `(status, content-type, body)`.
pub async fn send_raw(
    addr: SocketAddr,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    let body = body.unwrap_or_default();
    req.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
    req.push_str(body);
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");

    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .expect("status code");
    let content_type = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-type")
                .then(|| value.trim().to_string())
        })
        .unwrap_or_default();
    (status, content_type, body.to_string())
}

pub async fn get(addr: SocketAddr, path: &str) -> (u16, String, String) {
    send_raw(addr, "GET", path, None).await
}

pub async fn post(addr: SocketAddr, path: &str, body: &str) -> (u16, String, String) {
    send_raw(addr, "POST", path, Some(body)).await
}
