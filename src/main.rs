//! # tickwatch: live price alerts and notifications
//!
//! ```text
//!  ┌──────────────┐  wss ?assets=…   ┌──────────────────────────┐
//!  │  Price feed  │ ───────────────▶ │ StreamConnection (task)  │
//!  └──────────────┘   ◀ reconnect ── │ ├─ state machine         │
//!                                    │ ├─ reconnect timer       │
//!                                    │ └─ weather simulator ⛈️  │
//!                                    └────────────┬─────────────┘
//!                                                 │ FeedEvent
//!                                    ┌────────────▼─────────────┐
//!  ┌──────────────┐  REST /api/*     │ Dispatcher (task)        │
//!  │  HTTP client │ ───────────────▶ │ ├─ baselines + detector  │
//!  └──────────────┘                  │ ├─ notifications         │
//!                                    │ └─ broadcast_tx ───────┐ │
//!  ┌──────────────┐                  └────────────────────────┼─┘
//!  │  UI          │ ◀── ws://host/ws/notifications ───────────┘
//!  └──────────────┘
//! ```
//!
//! Configuration: see [`config`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod auth;
mod config;
mod engine;
mod error;
mod events;
mod models;
mod routes;
mod seed;
mod state;
mod store;
mod stream;

use config::Config;
use engine::dispatcher::Dispatcher;
use engine::simulator::AlertSimulator;
use state::{AppState, BROADCAST_CAPACITY};
use store::CityDirectory;
use stream::{StreamConnection, WsTransport};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env ──────────────────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Structured logging ─────────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("tickwatch=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!(r#"

  ╔═══════════════════════════════════════════════════════╗
  ║              TICKWATCH · Live Alerts                  ║
  ║  Feed · Detector · Weather · Notifications            ║
  ╚═══════════════════════════════════════════════════════╝"#);

    // ── 3. Config ─────────────────────────────────────────────────────────────
    let config = Config::from_env()?;
    info!(
        feed_url  = %config.feed_url,
        assets    = ?config.assets,
        cities    = ?config.cities,
        threshold = config.threshold_pct,
        auth      = config.api_key.is_some(),
        "⚙️ Configuration loaded"
    );

    // ── 4. Dispatcher ─────────────────────────────────────────────────────────
    let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
    let (dispatcher, feed_tx, dispatcher_task) =
        Dispatcher::new(config.dispatcher(), broadcast_tx.clone()).spawn();

    // ── 5. Optional baseline snapshot ─────────────────────────────────────────
    if let Some(url) = &config.seed_url {
        let client = reqwest::Client::new();
        seed::seed_baselines(&client, url, &dispatcher).await;
    }

    // ── 6. Feed connection ────────────────────────────────────────────────────
    let cities = CityDirectory::new(config.cities.clone());
    let connection = StreamConnection::new(
        config.stream(),
        WsTransport,
        AlertSimulator::new(config.simulator.clone()),
        cities.clone(),
        feed_tx,
    );
    let (connection, connection_task) = connection.spawn();
    connection.connect().await?;

    // ── 7. Router ─────────────────────────────────────────────────────────────
    let state = Arc::new(AppState {
        connection:   connection.clone(),
        dispatcher,
        cities,
        broadcast_tx,
        api_key:      config.api_key.clone(),
    });
    let app = routes::router(state);

    // ── 8. Bind & Serve ───────────────────────────────────────────────────────
    info!(addr = ?config.bind_addr, "🚀 tickwatch server starting");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // ── 9. Teardown ───────────────────────────────────────────────────────────
    // resolves once the session is dropped and every timer is cancelled
    match tokio::time::timeout(SHUTDOWN_GRACE, connection.disconnect()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Disconnect on shutdown failed"),
        Err(_) => warn!("Connection did not reach idle in time"),
    }
    connection_task.abort();
    dispatcher_task.abort();

    info!("👋 tickwatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received");
}
