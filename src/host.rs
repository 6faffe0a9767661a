//! Lifecycle Manager - hosting one experiment session
//!
//! Launching saves the initial run, binds the listener, opens the report
//! and serves until interrupted. Teardown clears the store, closes the
//! listener after in-flight requests drain, then clears once more so runs
//! saved by drained reruns do not outlive the session.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audit::{strip_artifacts, AuditEngine};
use crate::browser::{BrowserOpener, SystemBrowser};
use crate::config::HostConfig;
use crate::experiment::{AuditTarget, Flags, RunStore, SessionStore};
use crate::report::{BasicReportRenderer, ReportRenderer};
use crate::server::{build_router, ExperimentSession};
use crate::{Error, Result};

/// Parameters of the initial audit of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentParams {
    /// Audited URL
    pub url: String,
    /// Flags of the initial run
    #[serde(default)]
    pub flags: Flags,
    /// Audit configuration shared by every run
    #[serde(default)]
    pub config: Value,
}

/// Builder for a hosted session.
pub struct ExperimentHost<S, E> {
    store: S,
    engine: E,
    renderer: Arc<dyn ReportRenderer>,
    browser: Arc<dyn BrowserOpener>,
    config: HostConfig,
}

impl<S, E> ExperimentHost<S, E>
where
    S: RunStore + 'static,
    E: AuditEngine + 'static,
{
    /// Host `store` with reruns audited by `engine`.
    ///
    /// Uses [`BasicReportRenderer`], [`SystemBrowser`] and the default
    /// [`HostConfig`] unless overridden.
    pub fn new(store: S, engine: E) -> Self {
        Self {
            store,
            engine,
            renderer: Arc::new(BasicReportRenderer),
            browser: Arc::new(SystemBrowser),
            config: HostConfig::default(),
        }
    }

    /// Set the report renderer.
    #[must_use]
    pub fn renderer(mut self, renderer: Arc<dyn ReportRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Set the browser opener.
    #[must_use]
    pub fn browser(mut self, browser: Arc<dyn BrowserOpener>) -> Self {
        self.browser = browser;
        self
    }

    /// Set the host configuration.
    #[must_use]
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed the store with the initial run and start serving.
    ///
    /// Engine `artifacts` are dropped from `results` before saving, as for
    /// every rerun.
    ///
    /// # Errors
    ///
    /// Returns error if the initial run is rejected by the store or the
    /// listener cannot be bound
    pub async fn launch(self, flags: &Flags, results: &Value) -> Result<HostedExperiment<S, E>> {
        let Self {
            store,
            engine,
            renderer,
            browser,
            config,
        } = self;

        let mut results = results.clone();
        if strip_artifacts(&mut results) {
            debug!("dropped engine artifacts from the initial run");
        }
        let initial_id = store.save(flags, &results).await?;
        let session = Arc::new(ExperimentSession::new(
            store,
            engine,
            renderer,
            initial_id.clone(),
            config.report_context.clone(),
        ));

        let listener = TcpListener::bind(config.bind).await?;
        let addr = listener.local_addr()?;
        let report_url = format!("http://{addr}{}", initial_id.report_url());
        info!(%addr, url = %report_url, "experiment host listening");

        if config.open_browser {
            if let Err(err) = browser.open(&report_url) {
                warn!(error = %err, url = %report_url, "could not open browser");
            }
        }

        let (trigger, shutdown) = oneshot::channel();
        let task = tokio::spawn(serve_session(
            listener,
            Arc::clone(&session),
            shutdown,
            config.handle_interrupt,
        ));

        Ok(HostedExperiment {
            addr,
            report_url,
            session,
            trigger: Some(trigger),
            task,
        })
    }
}

/// A running session.
///
/// Dropping the handle shuts the session down.
pub struct HostedExperiment<S, E> {
    addr: SocketAddr,
    report_url: String,
    session: Arc<ExperimentSession<S, E>>,
    trigger: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl<S, E> HostedExperiment<S, E> {
    /// Address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Absolute URL of the initial run's report.
    #[must_use]
    pub fn report_url(&self) -> &str {
        &self.report_url
    }

    /// The served session.
    #[must_use]
    pub const fn session(&self) -> &Arc<ExperimentSession<S, E>> {
        &self.session
    }

    /// Start teardown, as an interrupt would.
    pub fn shutdown(&mut self) {
        if let Some(trigger) = self.trigger.take() {
            // the receiver is gone only if the server already stopped
            let _ = trigger.send(());
        }
    }

    /// Wait until the listener has fully closed.
    ///
    /// # Errors
    ///
    /// Returns error if serving or the final store clear failed
    pub async fn closed(self) -> Result<()> {
        let Self { trigger, task, .. } = self;
        let outcome = task
            .await
            .map_err(|e| Error::Internal(format!("server task failed: {e}")))?;
        drop(trigger);
        outcome
    }
}

async fn serve_session<S, E>(
    listener: TcpListener,
    session: Arc<ExperimentSession<S, E>>,
    shutdown: oneshot::Receiver<()>,
    handle_interrupt: bool,
) -> Result<()>
where
    S: RunStore + 'static,
    E: AuditEngine + 'static,
{
    let router = build_router(Arc::clone(&session));
    let teardown = Arc::clone(&session);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            wait_for_shutdown(shutdown, handle_interrupt).await;
            info!("shutting down experiment host");
            if let Err(err) = teardown.store().clear().await {
                error!(error = %err, "failed to clear experiment store");
            }
        })
        .await?;

    session.store().clear().await?;
    info!("experiment host closed");
    Ok(())
}

async fn wait_for_shutdown(trigger: oneshot::Receiver<()>, handle_interrupt: bool) {
    if handle_interrupt {
        tokio::select! {
            _ = trigger => {}
            () = interrupt_signal() => info!("interrupt received"),
        }
    } else {
        // a dropped handle counts as a shutdown request
        let _ = trigger.await;
    }
}

async fn interrupt_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {}
                    _ = sigterm.recv() => {}
                }
            }
            (Err(err), _) | (_, Err(err)) => {
                warn!(error = %err, "could not install signal handlers");
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "could not install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    }
}

/// Host a session with the configured store, the default renderer and the
/// system browser, and wait until it closes.
///
/// # Errors
///
/// Returns error if the store cannot be created, the initial run is
/// rejected, or serving fails
pub async fn host_experiment<E>(
    params: ExperimentParams,
    results: &Value,
    engine: E,
    config: HostConfig,
) -> Result<()>
where
    E: AuditEngine + 'static,
{
    let target = AuditTarget::new(params.url, params.config);
    let store = SessionStore::create(target, &config.store, config.id_scheme)?;
    info!(
        backend = store.backend_name(),
        id_scheme = %store.id_scheme(),
        "created session store"
    );

    let hosted = ExperimentHost::new(store, engine)
        .config(config)
        .launch(&params.flags, results)
        .await?;
    hosted.closed().await
}
