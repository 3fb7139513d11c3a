//! # engine::notifier
//!
//! [`NotificationFactory`] turns alerts and connectivity changes into
//! [`Notification`]s; [`NotificationStore`] holds them until they are dismissed.
//!
//! The factory only creates. Flipping `displayed` and removing belong to the
//! store, driven by UI clients (render / dismiss) and the dispatcher's
//! auto-dismiss timers.

use std::collections::VecDeque;

use chrono::Utc;

use crate::models::{
    ConnectionState, Notification, NotificationKind, PriceAlert, Severity, WeatherAlert,
};

// ─── Store ────────────────────────────────────────────────────────────────────

pub const DEFAULT_MAX_NOTIFICATIONS: usize = 100;

/// Bounded: once `capacity` is reached each append evicts the oldest entry.
/// Evicted ids are queued until [`NotificationStore::take_evicted`] so the
/// owner can tell UI clients about them.
#[derive(Debug)]
pub struct NotificationStore {
    items:    VecDeque<Notification>,
    capacity: usize,
    evicted:  Vec<u64>,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_NOTIFICATIONS)
    }
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            evicted: Vec::new(),
        }
    }

    pub fn append(&mut self, notification: Notification) {
        while self.items.len() >= self.capacity {
            if let Some(oldest) = self.items.pop_front() {
                self.evicted.push(oldest.id);
            }
        }
        self.items.push_back(notification);
    }

    /// Ids evicted by `append` since the last call.
    pub fn take_evicted(&mut self) -> Vec<u64> {
        std::mem::take(&mut self.evicted)
    }

    /// Oldest first.
    pub fn list(&self) -> Vec<Notification> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    /// Returns `true` only on the false → true transition.
    pub fn mark_displayed(&mut self, id: u64) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(n) if !n.displayed => {
                n.displayed = true;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        count
    }
}

// ─── Factory ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct NotificationFactory {
    last_id: u64,
}

impl NotificationFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next `create` will assign.
    pub fn next_id(&self) -> u64 {
        self.last_id + 1
    }

    pub fn create(
        &mut self,
        store:    &mut NotificationStore,
        kind:     NotificationKind,
        title:    impl Into<String>,
        message:  impl Into<String>,
        severity: Severity,
    ) -> Notification {
        let notification = Notification {
            id:         self.next_id(),
            kind,
            title:      title.into(),
            message:    message.into(),
            severity,
            created_at: Utc::now(),
            displayed:  false,
        };
        self.last_id = notification.id;
        store.append(notification.clone());
        notification
    }
}

// ─── Content ──────────────────────────────────────────────────────────────────

pub fn price_alert_title(asset_name: &str) -> String {
    format!("{asset_name} Price Alert")
}

pub fn price_alert_message(alert: &PriceAlert) -> String {
    let direction = if alert.is_increase() { "increased" } else { "decreased" };
    format!(
        "Price {direction} by {:.2}% to ${}",
        alert.percent_change.abs(),
        format_usd(alert.new_price)
    )
}

pub fn weather_alert_title(alert: &WeatherAlert) -> String {
    format!("Weather Alert for {}", alert.city)
}

/// Title and message for a connectivity change, or `None` when the change is
/// not worth telling the user about (e.g. a retry that never opened).
pub fn connectivity_content(
    from: ConnectionState,
    to:   ConnectionState,
) -> Option<(&'static str, &'static str)> {
    use ConnectionState::*;
    match (from, to) {
        (_, Open) => Some(("WebSocket Connected", "Real-time updates are now active")),
        (Open, Closed) => Some(("WebSocket Disconnected", "Real-time updates paused, reconnecting")),
        (Open, Idle) => Some(("WebSocket Closed", "Real-time updates stopped")),
        _ => None,
    }
}

/// Grouped thousands, up to three fraction digits, trailing zeros dropped:
/// `50300.0` → `"50,300"`, `0.004567` → `"0.005"`.
pub fn format_usd(value: f64) -> String {
    let fixed = format!("{:.3}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && (int_part != "0" || !frac_part.is_empty()) { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac_part}")
    }
}
