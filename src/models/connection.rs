//! # models::connection

use serde::{Deserialize, Serialize};

/// Lifecycle of the single feed connection.
///
/// ```text
/// Idle ──connect()──▶ Connecting ──open──▶ Open ──close/error──▶ Closed
///                         ▲                                        │
///                         └──────────── after reconnect delay ─────┘
/// ```
///
/// `disconnect()` returns the machine to `Idle` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    /// `connect()` is a no-op in these states.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Idle       => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open       => "open",
            ConnectionState::Closed     => "closed",
        };
        f.write_str(name)
    }
}
