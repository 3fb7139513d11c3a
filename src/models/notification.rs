//! # models::notification
//!
//! Defines [`Notification`]: the user-facing, auto-expiring message that UI
//! clients render as a toast.
//!
//! The JSON surface is what the UI consumes:
//! `{ id, kind, title, message, severity, timestamp, displayed }`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Severity ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
    PriceAlert,
    WeatherAlert,
}

// ─── NotificationKind ─────────────────────────────────────────────────────────

/// Which producer the notification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Connectivity,
    PriceAlert,
    WeatherAlert,
}

// ─── Notification ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Strictly increasing for the lifetime of the process, never reused.
    pub id: u64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Flips false → true once, when a UI client first renders it.
    pub displayed: bool,
}
