//! # routes::notifications
//!
//! The notification list as seen by a UI: list, mark as displayed (which
//! starts the auto-dismiss timer), dismiss, clear.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::{error::AppError, state::SharedState};

// ─── GET /api/notifications ───────────────────────────────────────────────────

pub async fn list_notifications(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let notifications = state.dispatcher.notifications().await?;
    Ok(Json(json!({
        "ok":            true,
        "count":         notifications.len(),
        "notifications": notifications,
    })))
}

// ─── POST /api/notifications/:id/displayed ────────────────────────────────────

/// `displayed: false` in the response means the notification was already
/// displayed or no longer exists; no second timer is started either way.
pub async fn mark_displayed(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    let flipped = state.dispatcher.mark_displayed(id).await?;
    Ok(Json(json!({
        "ok":        true,
        "id":        id,
        "displayed": flipped,
    })))
}

// ─── DELETE /api/notifications/:id ────────────────────────────────────────────

pub async fn dismiss_notification(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    if !state.dispatcher.dismiss(id).await? {
        return Err(AppError::NotFound(format!("Notification {id} does not exist")));
    }
    Ok(Json(json!({ "ok": true, "id": id })))
}

// ─── DELETE /api/notifications ────────────────────────────────────────────────

pub async fn clear_notifications(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let cleared = state.dispatcher.clear_notifications().await?;
    Ok(Json(json!({ "ok": true, "cleared": cleared })))
}
