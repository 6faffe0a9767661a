//! Request Router - the HTTP surface of a hosted session
//!
//! | Method | Path | Success |
//! |---|---|---|
//! | GET | `/?id=<id>` | 200 `text/html` report |
//! | GET | `/blocked-url-patterns?id=<id>` | 200 `text/json` array |
//! | POST | `/rerun?id=<id>` | 200 `text/plain` `/?id=<newId>` |
//!
//! Unknown runs and unknown paths are 404, other methods on a known path
//! are 405, failures inside the host are 500. All error bodies are short
//! plain text. A query string that does not parse (e.g. a repeated `id`)
//! is an unusable run reference and gets 404. Rerun bodies are read to the
//! end with no size cap.

mod response;
mod session;

pub use response::error_status;
pub use session::{parse_flags, ExperimentSession};

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tracing::debug;

use crate::audit::AuditEngine;
use crate::experiment::RunStore;
use crate::Error;

/// Query string accepted by every endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct RunQuery {
    /// Run to act on; the session's initial run when absent
    pub id: Option<String>,
}

type SharedSession<S, E> = Arc<ExperimentSession<S, E>>;

/// Requested run id, or the error the request resolves to.
fn requested_id(
    query: Result<Query<RunQuery>, QueryRejection>,
) -> Result<Option<String>, Error> {
    query.map(|Query(query)| query.id).map_err(|rejection| {
        Error::InvalidInput(format!("bad query string: {}", rejection.body_text()))
    })
}

/// Build the router for `session`.
pub fn build_router<S, E>(session: SharedSession<S, E>) -> Router
where
    S: RunStore + 'static,
    E: AuditEngine + 'static,
{
    Router::new()
        .route(
            "/",
            get(report_handler::<S, E>).fallback(method_not_supported_handler),
        )
        .route(
            "/blocked-url-patterns",
            get(blocked_url_patterns_handler::<S, E>).fallback(method_not_supported_handler),
        )
        .route(
            "/rerun",
            post(rerun_handler::<S, E>)
                .fallback(method_not_supported_handler)
                .layer(DefaultBodyLimit::disable()),
        )
        .fallback(not_found_handler)
        .with_state(session)
}

async fn report_handler<S, E>(
    State(session): State<SharedSession<S, E>>,
    query: Result<Query<RunQuery>, QueryRejection>,
) -> Response
where
    S: RunStore + 'static,
    E: AuditEngine + 'static,
{
    let id = match requested_id(query) {
        Ok(requested) => session.resolve_id(requested),
        Err(err) => return response::error_response(&err),
    };
    match session.report_html(&id).await {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            debug!(run_id = %id, error = %err, "report request failed");
            response::error_response(&err)
        }
    }
}

async fn blocked_url_patterns_handler<S, E>(
    State(session): State<SharedSession<S, E>>,
    query: Result<Query<RunQuery>, QueryRejection>,
) -> Response
where
    S: RunStore + 'static,
    E: AuditEngine + 'static,
{
    let id = match requested_id(query) {
        Ok(requested) => session.resolve_id(requested),
        Err(err) => return response::error_response(&err),
    };
    let body = session
        .blocked_url_patterns(&id)
        .await
        .and_then(|patterns| Ok(serde_json::to_string(&patterns)?));
    match body {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/json")],
            body,
        )
            .into_response(),
        Err(err) => response::error_response(&err),
    }
}

async fn rerun_handler<S, E>(
    State(session): State<SharedSession<S, E>>,
    query: Result<Query<RunQuery>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Response
where
    S: RunStore + 'static,
    E: AuditEngine + 'static,
{
    let base_id = match requested_id(query) {
        Ok(requested) => session.resolve_id(requested),
        Err(err) => return response::error_response(&err),
    };
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            let err = Error::Internal(format!(
                "failed to read rerun body: {}",
                rejection.body_text()
            ));
            return response::error_response(&err);
        }
    };
    debug!(base_id = %base_id, bytes = body.len(), "rerun requested");

    // A spawned task keeps the audit running if the client goes away.
    let task = tokio::spawn(async move { session.rerun(&base_id, &body).await });
    let outcome = task
        .await
        .map_err(|e| Error::Internal(format!("rerun task failed: {e}")))
        .and_then(|result| result);

    match outcome {
        Ok(id) => response::plain(StatusCode::OK, id.report_url()),
        Err(err) => response::error_response(&err),
    }
}

async fn method_not_supported_handler() -> Response {
    response::method_not_supported()
}

async fn not_found_handler() -> Response {
    response::not_found()
}
