//! # store
//!
//! Collaborator state the core reads and writes:
//!
//! - [`BaselineStore`] / [`Baselines`]: last known price (and display name)
//!   per asset. Owned exclusively by the dispatcher task.
//! - [`CityDirectory`]: the list of known cities the alert simulator draws
//!   from. Shared between the connection task (reader) and the HTTP surface
//!   (writer).

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

// ─── BaselineStore ────────────────────────────────────────────────────────────

/// `getBaselinePrice` / `setBaselinePrice` as consumed by the detector.
pub trait BaselineStore {
    fn baseline_price(&self, asset_id: &str) -> Option<f64>;
    fn set_baseline_price(&mut self, asset_id: &str, price: f64);
}

/// One row of the baseline table, as exposed over HTTP and used for seeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineEntry {
    pub asset_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub price: f64,
}

#[derive(Debug, Default, Clone)]
pub struct Baselines {
    prices: HashMap<String, f64>,
    names:  HashMap<String, String>,
}

impl Baselines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display name for titles: the seeded name when known, else the id
    /// with its first letter upper-cased (`bitcoin` → `Bitcoin`).
    pub fn display_name(&self, asset_id: &str) -> String {
        if let Some(name) = self.names.get(asset_id) {
            return name.clone();
        }
        let mut chars = asset_id.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn set_name(&mut self, asset_id: &str, name: impl Into<String>) {
        self.names.insert(asset_id.to_string(), name.into());
    }

    /// Apply seed rows; returns how many were accepted.
    /// Rows with a non-finite or negative price are skipped.
    pub fn seed(&mut self, entries: Vec<BaselineEntry>) -> usize {
        let mut accepted = 0;
        for entry in entries {
            if !entry.price.is_finite() || entry.price < 0.0 {
                continue;
            }
            if let Some(name) = entry.name {
                self.set_name(&entry.asset_id, name);
            }
            self.prices.insert(entry.asset_id, entry.price);
            accepted += 1;
        }
        accepted
    }

    /// Sorted by asset id so the HTTP output is stable.
    pub fn snapshot(&self) -> Vec<BaselineEntry> {
        let mut rows: Vec<BaselineEntry> = self
            .prices
            .iter()
            .map(|(asset_id, &price)| BaselineEntry {
                asset_id: asset_id.clone(),
                name:     self.names.get(asset_id).cloned(),
                price,
            })
            .collect();
        rows.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));
        rows
    }
}

impl BaselineStore for Baselines {
    fn baseline_price(&self, asset_id: &str) -> Option<f64> {
        self.prices.get(asset_id).copied()
    }

    fn set_baseline_price(&mut self, asset_id: &str, price: f64) {
        self.prices.insert(asset_id.to_string(), price);
    }
}

// ─── CityDirectory ────────────────────────────────────────────────────────────

/// Known cities. Cheap to clone, every clone sees the same list.
#[derive(Debug, Clone, Default)]
pub struct CityDirectory {
    cities: Arc<RwLock<Vec<String>>>,
}

impl CityDirectory {
    pub fn new(cities: Vec<String>) -> Self {
        Self { cities: Arc::new(RwLock::new(cities)) }
    }

    pub async fn list_known_cities(&self) -> Vec<String> {
        self.cities.read().await.clone()
    }

    /// Replace the whole list. Blank names are dropped.
    pub async fn replace(&self, cities: Vec<String>) -> usize {
        let cleaned: Vec<String> = cities
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        let count = cleaned.len();
        *self.cities.write().await = cleaned;
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_capitalized_id() {
        let mut baselines = Baselines::new();
        assert_eq!(baselines.display_name("bitcoin"), "Bitcoin");
        baselines.set_name("ripple", "XRP");
        assert_eq!(baselines.display_name("ripple"), "XRP");
    }

    #[test]
    fn test_seed_skips_unusable_prices() {
        let mut baselines = Baselines::new();
        let accepted = baselines.seed(vec![
            BaselineEntry { asset_id: "bitcoin".into(), name: Some("Bitcoin".into()), price: 50_000.0 },
            BaselineEntry { asset_id: "ethereum".into(), name: None, price: f64::NAN },
            BaselineEntry { asset_id: "ripple".into(), name: None, price: -1.0 },
        ]);
        assert_eq!(accepted, 1);
        assert_eq!(baselines.baseline_price("bitcoin"), Some(50_000.0));
        assert_eq!(baselines.baseline_price("ethereum"), None);
        assert_eq!(baselines.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_city_directory_replace_drops_blank_names() {
        let cities = CityDirectory::new(vec!["Tokyo".into()]);
        let shared = cities.clone();
        let count = shared.replace(vec![" London ".into(), "".into(), "Oslo".into()]).await;
        assert_eq!(count, 2);
        assert_eq!(cities.list_known_cities().await, vec!["London", "Oslo"]);
    }
}
