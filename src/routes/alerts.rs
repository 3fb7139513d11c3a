//! # routes::alerts
//!
//! Price and weather alert history kept by the dispatcher.

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::{error::AppError, state::SharedState};

// ─── /api/alerts/price ────────────────────────────────────────────────────────

pub async fn list_price_alerts(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let alerts = state.dispatcher.price_alerts().await?;
    Ok(Json(json!({
        "ok":     true,
        "count":  alerts.len(),
        "alerts": alerts,
    })))
}

pub async fn clear_price_alerts(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let cleared = state.dispatcher.clear_price_alerts().await?;
    Ok(Json(json!({ "ok": true, "cleared": cleared })))
}

// ─── /api/alerts/weather ──────────────────────────────────────────────────────

pub async fn list_weather_alerts(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let alerts = state.dispatcher.weather_alerts().await?;
    Ok(Json(json!({
        "ok":     true,
        "count":  alerts.len(),
        "alerts": alerts,
    })))
}

pub async fn clear_weather_alerts(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let cleared = state.dispatcher.clear_weather_alerts().await?;
    Ok(Json(json!({ "ok": true, "cleared": cleared })))
}
