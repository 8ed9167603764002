//! Demo handlers for the example server.

use axum::{
    Form,
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::collections::BTreeMap;

use crate::context::LoggedError;

/// `GET /`
pub async fn index() -> &'static str {
    "ok"
}

/// `GET /status/{code}` answers with the requested status.
pub async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, status.to_string()).into_response(),
        Err(err) => (StatusCode::BAD_REQUEST, LoggedError::new(&err), err.to_string()).into_response(),
    }
}

/// `POST /echo` answers with the submitted form fields, one `key=value` per line.
pub async fn echo(Form(fields): Form<BTreeMap<String, String>>) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}={value}\n"))
        .collect()
}

/// `GET /fail` always fails, attaching the failure for the access log.
pub async fn fail() -> Result<&'static str, (StatusCode, LoggedError, &'static str)> {
    Err((
        StatusCode::INTERNAL_SERVER_ERROR,
        LoggedError::new("database \"primary\" unreachable"),
        "internal error",
    ))
}

/// Fallback for unknown routes.
pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found")
}
