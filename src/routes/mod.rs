//! # routes
//!
//! | Method   | Path                               | Handler                  |
//! |----------|------------------------------------|--------------------------|
//! | GET      | `/health`                          | liveness, no auth        |
//! | POST     | `/api/stream/connect`              | open the price feed      |
//! | POST     | `/api/stream/disconnect`           | stop feed and simulator  |
//! | GET      | `/api/stream/status`               | current connection state |
//! | GET      | `/api/notifications`               | list                     |
//! | DELETE   | `/api/notifications`               | clear all                |
//! | POST     | `/api/notifications/:id/displayed` | start auto-dismiss       |
//! | DELETE   | `/api/notifications/:id`           | dismiss one              |
//! | GET/DEL  | `/api/alerts/price`                | price alert history      |
//! | GET/DEL  | `/api/alerts/weather`              | weather alert history    |
//! | GET/PUT  | `/api/baselines`                   | baseline prices          |
//! | GET/PUT  | `/api/cities`                      | known cities             |
//! | GET (WS) | `/ws/notifications`                | live UI events           |

pub mod alerts;
pub mod directory;
pub mod monitor;
pub mod notifications;
pub mod stream;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth::require_api_key, state::SharedState};

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health",                           get(stream::health_check))
        // ── Feed connection ───────────────────────────────────────────────────
        .route("/api/stream/connect",               post(stream::connect))
        .route("/api/stream/disconnect",            post(stream::disconnect))
        .route("/api/stream/status",                get(stream::status))
        // ── Notifications ─────────────────────────────────────────────────────
        .route("/api/notifications",                get(notifications::list_notifications)
                                                    .delete(notifications::clear_notifications))
        .route("/api/notifications/:id/displayed",  post(notifications::mark_displayed))
        .route("/api/notifications/:id",            delete(notifications::dismiss_notification))
        // ── Alert history ─────────────────────────────────────────────────────
        .route("/api/alerts/price",                 get(alerts::list_price_alerts)
                                                    .delete(alerts::clear_price_alerts))
        .route("/api/alerts/weather",               get(alerts::list_weather_alerts)
                                                    .delete(alerts::clear_weather_alerts))
        // ── Reference data ────────────────────────────────────────────────────
        .route("/api/baselines",                    get(directory::list_baselines)
                                                    .put(directory::seed_baselines))
        .route("/api/cities",                       get(directory::list_cities)
                                                    .put(directory::replace_cities))
        // ── UI stream ─────────────────────────────────────────────────────────
        .route("/ws/notifications",                 get(monitor::ws_notifications))
        // ── Middleware ────────────────────────────────────────────────────────
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
