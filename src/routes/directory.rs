//! # routes::directory
//!
//! Reference data: baseline prices (with display names) and the known-city
//! list the weather simulator draws from.

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use tracing::info;

use crate::{error::AppError, state::SharedState, store::BaselineEntry};

// ─── GET /api/baselines ───────────────────────────────────────────────────────

pub async fn list_baselines(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let baselines = state.dispatcher.baselines().await?;
    Ok(Json(json!({
        "ok":        true,
        "count":     baselines.len(),
        "baselines": baselines,
    })))
}

// ─── PUT /api/baselines ───────────────────────────────────────────────────────

/// Merge entries into the baseline map. Entries with a negative or
/// non-finite price are skipped.
pub async fn seed_baselines(
    State(state): State<SharedState>,
    Json(entries): Json<Vec<BaselineEntry>>,
) -> Result<impl IntoResponse, AppError> {
    if entries.is_empty() {
        return Err(AppError::BadRequest("Expected at least one baseline entry".into()));
    }
    let submitted = entries.len();
    let accepted = state.dispatcher.seed_baselines(entries).await?;

    Ok(Json(json!({
        "ok":       true,
        "accepted": accepted,
        "skipped":  submitted - accepted,
    })))
}

// ─── GET /api/cities ──────────────────────────────────────────────────────────

pub async fn list_cities(State(state): State<SharedState>) -> impl IntoResponse {
    let cities = state.cities.list_known_cities().await;
    Json(json!({
        "ok":     true,
        "count":  cities.len(),
        "cities": cities,
    }))
}

// ─── PUT /api/cities ──────────────────────────────────────────────────────────

/// Replace the known-city list. An empty list is allowed and pauses weather
/// alerts until cities are added again.
pub async fn replace_cities(
    State(state): State<SharedState>,
    Json(cities): Json<Vec<String>>,
) -> impl IntoResponse {
    let count = state.cities.replace(cities).await;
    info!(count, "🏙️ Known cities replaced");
    Json(json!({ "ok": true, "count": count }))
}
