//! # auth: API key middleware
//!
//! Protects every endpoint with an `X-API-Key` header.
//!
//! ## Modes
//! - `API_KEY` unset or empty → **allow all** (dev mode)
//! - `API_KEY` set → every request must carry `X-API-Key: <key>`
//!
//! `/health` is always reachable.
//!
//! ```bash
//! curl -H "X-API-Key: super-secret" http://localhost:3000/api/notifications
//! ```

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use crate::state::SharedState;

pub async fn require_api_key(
    State(state): State<SharedState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if path == "/health" {
        return next.run(request).await;
    }

    // dev mode: no key configured
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if provided == expected {
        next.run(request).await
    } else {
        warn!(path, "❌ Unauthorized request, invalid or missing X-API-Key");
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "ok":    false,
                "error": "Unauthorized: invalid or missing X-API-Key header",
                "hint":  "Set X-API-Key header with your API key"
            })),
        )
            .into_response()
    }
}
