//! # events
//!
//! Defines [`UiEvent`]: every event the dispatcher broadcasts to UI clients
//! connected on `/ws/notifications`.
//!
//! Uses `tokio::sync::broadcast::Sender<String>`: the event is serialised to
//! JSON once before sending, which avoids `Clone` constraints on receivers.

use serde::Serialize;

use crate::models::{ConnectionState, Notification, PriceAlert, WeatherAlert};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UiEvent {
    /// A new toast to render.
    NotificationCreated {
        notification: Box<Notification>,
    },

    /// Dismissed manually or by the auto-dismiss timer.
    NotificationRemoved {
        id: u64,
    },

    NotificationsCleared,

    PriceAlert {
        alert: Box<PriceAlert>,
    },

    WeatherAlert {
        alert: Box<WeatherAlert>,
    },

    /// Drives the UI's connection status indicator.
    ConnectionChanged {
        state: ConnectionState,
    },
}

impl UiEvent {
    #[inline]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"event":"SERIALIZATION_ERROR"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_tagged() {
        let json = UiEvent::ConnectionChanged { state: ConnectionState::Open }.to_json();
        assert_eq!(json, r#"{"event":"CONNECTION_CHANGED","state":"open"}"#);

        let json = UiEvent::NotificationRemoved { id: 7 }.to_json();
        assert_eq!(json, r#"{"event":"NOTIFICATION_REMOVED","id":7}"#);
    }
}
