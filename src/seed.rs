//! # seed: baseline snapshot
//!
//! Optionally loads one REST snapshot of current prices before the feed is
//! opened, so the first tick of each asset can already be compared.
//!
//! Expected response (CoinGecko `/coins/markets` shape):
//! ```json
//! [ { "id": "bitcoin", "name": "Bitcoin", "current_price": 50000.0 } ]
//! ```

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::{info, warn};

use crate::engine::dispatcher::DispatcherHandle;
use crate::store::BaselineEntry;

const SEED_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct MarketRow {
    id:            String,
    name:          Option<String>,
    current_price: Option<f64>,
}

impl MarketRow {
    fn into_entry(self) -> Option<BaselineEntry> {
        Some(BaselineEntry {
            asset_id: self.id.replace('-', ""),
            name:     self.name,
            price:    self.current_price?,
        })
    }
}

pub async fn fetch_baselines(client: &reqwest::Client, url: &str) -> anyhow::Result<Vec<BaselineEntry>> {
    let rows: Vec<MarketRow> = client
        .get(url)
        .timeout(SEED_TIMEOUT)
        .send()
        .await
        .context("Seed API unreachable")?
        .error_for_status()
        .context("Seed API returned an error status")?
        .json()
        .await
        .context("Failed to parse seed response")?;

    Ok(parse_rows(rows))
}

fn parse_rows(rows: Vec<MarketRow>) -> Vec<BaselineEntry> {
    rows.into_iter().filter_map(MarketRow::into_entry).collect()
}

/// Fetch and hand the snapshot to the dispatcher. Never fatal: on failure the
/// service starts with empty baselines.
pub async fn seed_baselines(client: &reqwest::Client, url: &str, dispatcher: &DispatcherHandle) {
    let entries = match fetch_baselines(client, url).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, url, "⚠️ Baseline seeding failed, starting empty");
            return;
        }
    };

    match dispatcher.seed_baselines(entries).await {
        Ok(accepted) => info!(accepted, url, "🌱 Baselines seeded"),
        Err(e) => warn!(error = %e, "Baseline seeding dropped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_without_price_are_skipped() {
        let rows: Vec<MarketRow> = serde_json::from_str(
            r#"[
                {"id":"bitcoin","name":"Bitcoin","current_price":50000.0,"symbol":"btc"},
                {"id":"bitcoin-cash","name":"Bitcoin Cash","current_price":301.5},
                {"id":"ghost","name":"Ghost","current_price":null}
            ]"#,
        )
        .unwrap();

        let entries = parse_rows(rows);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].asset_id, "bitcoin");
        assert_eq!(entries[0].name.as_deref(), Some("Bitcoin"));
        assert_eq!(entries[1].asset_id, "bitcoincash");
        assert_eq!(entries[1].price, 301.5);
    }
}
