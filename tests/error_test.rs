//! Tests for error types and their HTTP status mapping

use axum::http::StatusCode;
use perfx::server::error_status;
use perfx::Error;

#[test]
fn test_not_found_error() {
    let error = Error::run_not_found("42");
    let error_str = format!("{error}");
    assert!(error_str.contains("Run not found"));
    assert!(error_str.contains("'42'"));
    assert!(error.is_not_found());
}

#[test]
fn test_invalid_input_error() {
    let error = Error::InvalidInput("results are missing generatedTime".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Invalid input"));
    assert!(error_str.contains("generatedTime"));
    assert!(error.is_not_found());
}

#[test]
fn test_audit_failed_error() {
    let error = Error::AuditFailed("chrome crashed".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Audit failed"));
    assert!(error_str.contains("chrome crashed"));
    assert!(!error.is_not_found());
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
    let error: Error = io_error.into();
    assert!(format!("{error}").contains("IO error"));
    assert!(matches!(error, Error::Io(_)));
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
    let error: Error = json_error.into();
    assert!(format!("{error}").contains("JSON error"));
}

#[test]
fn test_error_status_mapping() {
    assert_eq!(error_status(&Error::run_not_found("x")), StatusCode::NOT_FOUND);
    assert_eq!(
        error_status(&Error::InvalidInput("x".into())),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        error_status(&Error::AuditFailed("x".into())),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
        error_status(&Error::Internal("x".into())),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert_eq!(
        error_status(&Error::Json(json_error)),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_error_debug() {
    let error = Error::Internal("server task failed".to_string());
    let debug_str = format!("{error:?}");
    assert!(debug_str.contains("Internal"));
}
