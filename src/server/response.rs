//! Status codes and plain-text bodies of the experiment endpoints

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::Error;

pub(crate) const NOT_FOUND_BODY: &str = "404: Resource Not Found";
pub(crate) const METHOD_NOT_SUPPORTED_BODY: &str = "405: Method Not Supported";
pub(crate) const INTERNAL_ERROR_BODY: &str = "500: Internal Server Error";

/// Status an error surfaces as.
///
/// Missing runs and unusable run references are 404; everything that goes
/// wrong inside the host is 500.
#[must_use]
pub fn error_status(err: &Error) -> StatusCode {
    if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

pub(crate) fn plain(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body.into(),
    )
        .into_response()
}

pub(crate) fn not_found() -> Response {
    plain(StatusCode::NOT_FOUND, NOT_FOUND_BODY)
}

pub(crate) fn method_not_supported() -> Response {
    plain(StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_SUPPORTED_BODY)
}

pub(crate) fn error_response(err: &Error) -> Response {
    let status = error_status(err);
    if status == StatusCode::NOT_FOUND {
        not_found()
    } else {
        error!(error = %err, "request failed");
        plain(status, INTERNAL_ERROR_BODY)
    }
}
