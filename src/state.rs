//! # state
//!
//! Shared application state handed to every Axum handler.
//!
//! Nothing in here is mutated directly by handlers. The connection and the
//! dispatcher each run on their own task and are reached through handles;
//! the city list is the only shared collection and sits behind an async
//! `RwLock` inside [`CityDirectory`].

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::engine::dispatcher::DispatcherHandle;
use crate::store::CityDirectory;
use crate::stream::ConnectionHandle;

/// Buffered UI events per lagging WebSocket client.
pub const BROADCAST_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub connection:   ConnectionHandle,
    pub dispatcher:   DispatcherHandle,
    pub cities:       CityDirectory,
    /// Serialized [`UiEvent`](crate::events::UiEvent)s for `/ws/notifications`.
    pub broadcast_tx: broadcast::Sender<String>,
    pub api_key:      Option<String>,
}

pub type SharedState = Arc<AppState>;
