//! # models::tick
//!
//! Defines [`Tick`], one asset's price observation decoded from the push feed.
//!
//! A tick is ephemeral: the dispatcher uses it to update the baseline and maybe
//! raise a [`PriceAlert`](super::PriceAlert), then drops it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single price observation for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Internal asset id, already normalized from the feed id, e.g. `"bitcoin"`.
    pub asset_id: String,

    /// Last traded price in USD.
    pub price: f64,

    /// When the frame carrying this tick was decoded.
    pub received_at: DateTime<Utc>,
}

impl Tick {
    pub fn new(asset_id: impl Into<String>, price: f64) -> Self {
        Self {
            asset_id:    asset_id.into(),
            price,
            received_at: Utc::now(),
        }
    }
}
