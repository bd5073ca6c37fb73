//! Shared HTTP utilities for the resource locator workspace.
//!
//! Framework-agnostic pieces of the HTTP surface: the error envelope, the
//! `CoreError` to status mapping, public URL building and time formatting.

use chrono::{DateTime, SecondsFormat, Utc};
use domain::{CascadeFailure, CoreError};
use std::time::SystemTime;

// ============================================================================
// JSON Response Helpers
// ============================================================================

/// Create a structured error JSON with a default message based on the code.
///
/// Returns: `{"error": {"code": "<code>", "message": "<default message>"}}`
pub fn json_err(code: &str) -> serde_json::Value {
    let message = match code {
        "not_found" => "Resource not found",
        "bad_request" => "Bad request",
        "invalid_resource_locator" => "Invalid resource locator",
        "parent_not_found" => "Parent has no resource locator",
        "conflict" => "Resource locator already exists",
        "tree_cycle" => "Node cannot be placed below itself",
        "cascade_failed" => "Some descendants could not be adapted",
        "error" | "internal" => "Internal server error",
        _ => code, // Fallback to code as message for unknown codes
    };
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create a structured error JSON with a custom message.
///
/// Returns: `{"error": {"code": "<code>", "message": "<message>"}}`
pub fn json_error_with_message(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// HTTP status and envelope code for a domain error.
pub fn status_for(err: &CoreError) -> (u16, &'static str) {
    match err {
        CoreError::ResourceLocatorNotValid(_) => (400, "invalid_resource_locator"),
        CoreError::InvalidContentId | CoreError::InvalidUserId => (400, "bad_request"),
        CoreError::TreeCycle(_) => (400, "tree_cycle"),
        CoreError::ResourceLocatorAlreadyExists { .. } => (409, "conflict"),
        CoreError::ParentPathNotFound(_) => (404, "parent_not_found"),
        CoreError::NotFound => (404, "not_found"),
        CoreError::CascadeAdaptationFailed { .. } => (207, "cascade_failed"),
        CoreError::InvalidConfig(_) | CoreError::Repository(_) => (500, "internal"),
    }
}

/// Error envelope for `err`.
///
/// Internal failures keep their detail out of the body; cascade failures
/// list every descendant that kept a stale path.
pub fn error_body(err: &CoreError) -> serde_json::Value {
    let (_, code) = status_for(err);
    match err {
        CoreError::InvalidConfig(_) | CoreError::Repository(_) => json_err(code),
        CoreError::CascadeAdaptationFailed { path, failures } => {
            let mut body = json_error_with_message(code, &err.to_string());
            body["resource_locator"] = serde_json::json!(path);
            body["failures"] = failures.iter().map(failure_json).collect();
            body
        }
        _ => json_error_with_message(code, &err.to_string()),
    }
}

fn failure_json(f: &CascadeFailure) -> serde_json::Value {
    serde_json::json!({
        "content_id": f.content_id.as_str(),
        "attempted_path": f.attempted_path,
        "message": f.error.to_string(),
    })
}

// ============================================================================
// URL Building
// ============================================================================

/// Build the public URL of a resource locator.
///
/// A configured `base` wins; otherwise falls back to `https://{host}{path}`
/// or the bare `path` if host is empty.
pub fn build_public_url(base: Option<&str>, host: &str, path: &str) -> String {
    if let Some(base) = base.filter(|b| !b.is_empty()) {
        return format!("{}{}", base.trim_end_matches('/'), path);
    }
    if host.is_empty() {
        path.to_string()
    } else {
        format!("https://{}{}", host, path)
    }
}

// ============================================================================
// Time Utilities
// ============================================================================

/// Convert SystemTime to RFC3339 string (seconds precision, UTC).
pub fn system_time_to_rfc3339(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
