//! # routes::stream
//!
//! Control of the price feed connection.

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use tracing::info;

use crate::{error::AppError, state::SharedState};

// ─── GET /health ──────────────────────────────────────────────────────────────

pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "ok":         true,
        "service":    "tickwatch",
        "connection": state.connection.state(),
    }))
}

// ─── POST /api/stream/connect ─────────────────────────────────────────────────

/// No-op when the feed is already connecting or open.
pub async fn connect(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    state.connection.connect().await?;
    info!("▶️ Connect requested");

    Ok(Json(json!({
        "ok":      true,
        "message": "Connect requested",
    })))
}

// ─── POST /api/stream/disconnect ──────────────────────────────────────────────

pub async fn disconnect(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    state.connection.disconnect().await?;
    info!("⏹️ Disconnect requested");

    Ok(Json(json!({
        "ok":      true,
        "message": "Disconnect requested, reconnects and simulated alerts stopped",
    })))
}

// ─── GET /api/stream/status ───────────────────────────────────────────────────

pub async fn status(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "ok":    true,
        "state": state.connection.state(),
    }))
}
