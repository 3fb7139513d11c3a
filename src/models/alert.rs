//! # models::alert
//!
//! The two alert shapes the service produces:
//!
//! - [`PriceAlert`]: raised by the price-change detector when a tick moves
//!   more than the threshold away from the asset's baseline.
//! - [`WeatherAlert`]: fabricated by the alert simulator for a known city.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── PriceAlert ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub asset_id: String,
    pub old_price: f64,
    pub new_price: f64,
    /// Signed change in percent, `(new - old) / old * 100`.
    pub percent_change: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl PriceAlert {
    #[inline]
    pub fn is_increase(&self) -> bool {
        self.percent_change > 0.0
    }
}

// ─── WeatherKind ──────────────────────────────────────────────────────────────

/// Fixed catalog of simulated weather conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherKind {
    Rain,
    Snow,
    Wind,
    Temp,
    Storm,
}

impl WeatherKind {
    pub const ALL: [WeatherKind; 5] = [
        WeatherKind::Rain,
        WeatherKind::Snow,
        WeatherKind::Wind,
        WeatherKind::Temp,
        WeatherKind::Storm,
    ];

    /// Human-readable message carried by every alert of this kind.
    pub fn message(self) -> &'static str {
        match self {
            WeatherKind::Rain  => "Heavy rain expected",
            WeatherKind::Snow  => "Snow showers expected",
            WeatherKind::Wind  => "Strong winds expected",
            WeatherKind::Temp  => "Temperature drop expected",
            WeatherKind::Storm => "Thunderstorm warnings",
        }
    }
}

impl std::fmt::Display for WeatherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WeatherKind::Rain  => "rain",
            WeatherKind::Snow  => "snow",
            WeatherKind::Wind  => "wind",
            WeatherKind::Temp  => "temp",
            WeatherKind::Storm => "storm",
        };
        f.write_str(name)
    }
}

// ─── WeatherAlert ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub city: String,
    pub kind: WeatherKind,
    pub message: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl WeatherAlert {
    pub fn new(city: impl Into<String>, kind: WeatherKind) -> Self {
        Self {
            city:      city.into(),
            kind,
            message:   kind.message().to_string(),
            timestamp: Utc::now(),
        }
    }
}
