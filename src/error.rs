//! # error
//!
//! Centralised error types.
//!
//! - [`AppError`]: returned by every HTTP handler. Axum's `IntoResponse` impl
//!   converts it into a structured JSON body so UI clients always get a
//!   machine-readable response even on failure.
//! - [`FeedError`]: failures inside the streaming subsystem (frame decoding,
//!   transport, stopped actor tasks). None of them is fatal to the process.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// ─── FeedError ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FeedError {
    /// The frame was not valid JSON at all.
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Valid JSON, but not the `{ feed_id: "price" }` object shape.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// A price value was not a string-encoded decimal.
    #[error("price for '{asset}' is not a string")]
    NotAString { asset: String },

    /// A price string could not be parsed into a finite number.
    #[error("price for '{asset}' is not a finite decimal: {raw:?}")]
    BadPrice { asset: String, raw: String },

    #[error("websocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// An actor task (connection or dispatcher) is no longer running.
    #[error("{0} task has stopped")]
    Stopped(&'static str),
}

// ─── AppError ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AppError {
    /// The request payload was syntactically correct but semantically invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The requested resource (e.g. a notification id) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The streaming subsystem could not serve the request.
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    /// Catch-all for unexpected failures.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Feed(err) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
            AppError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {err}"),
            ),
        };

        let body = Json(json!({
            "ok":    false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
