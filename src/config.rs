//! # config
//!
//! Reads the service configuration from environment variables (after
//! `dotenvy` has loaded an optional `.env`).
//!
//! | Variable                    | Default                       |
//! |-----------------------------|-------------------------------|
//! | `FEED_URL`                  | `wss://ws.coincap.io/prices`  |
//! | `TRACKED_ASSETS`            | `bitcoin,ethereum,ripple`     |
//! | `ASSET_ALIASES`             | *(none)* `feed-id=internal,…` |
//! | `CITIES`                    | `New York,London,Tokyo`       |
//! | `RECONNECT_DELAY_MS`        | `5000`                        |
//! | `RECONNECT_MAX_DELAY_MS`    | same as `RECONNECT_DELAY_MS`  |
//! | `ALERT_MIN_DELAY_MS`        | `30000`                       |
//! | `ALERT_MAX_DELAY_MS`        | `90000`                       |
//! | `PRICE_ALERT_THRESHOLD_PCT` | `0.5`                         |
//! | `NOTIFICATION_TTL_MS`       | `5000`                        |
//! | `NOTIFICATION_LIMIT`        | `100`                         |
//! | `ALERT_HISTORY_LIMIT`       | `500`                         |
//! | `SEED_URL`                  | *(none)*                      |
//! | `BIND_ADDR`                 | `0.0.0.0:3000`                |
//! | `API_KEY`                   | *(none)* auth disabled        |

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::engine::dispatcher::{DispatcherConfig, DEFAULT_MAX_ALERT_HISTORY};
use crate::engine::notifier::DEFAULT_MAX_NOTIFICATIONS;
use crate::engine::simulator::SimulatorConfig;
use crate::stream::{ReconnectPolicy, StreamConfig};

const DEFAULT_FEED_URL: &str = "wss://ws.coincap.io/prices";
const DEFAULT_ASSETS: &str = "bitcoin,ethereum,ripple";
const DEFAULT_CITIES: &str = "New York,London,Tokyo";

#[derive(Debug, Clone)]
pub struct Config {
    pub feed_url:             String,
    pub assets:               Vec<String>,
    pub aliases:              HashMap<String, String>,
    pub cities:               Vec<String>,
    pub reconnect:            ReconnectPolicy,
    pub simulator:            SimulatorConfig,
    pub threshold_pct:        f64,
    /// Display time of a notification before it is auto-dismissed.
    pub notification_ttl:     Duration,
    pub notification_limit:   usize,
    pub alert_history_limit:  usize,
    /// REST snapshot used to seed baselines at startup.
    pub seed_url:             Option<String>,
    pub bind_addr:            SocketAddr,
    /// `None` → every request is allowed (dev mode).
    pub api_key:              Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but reads from any key → value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let assets = split_list(&get("TRACKED_ASSETS").unwrap_or_else(|| DEFAULT_ASSETS.to_string()));
        if assets.is_empty() {
            bail!("TRACKED_ASSETS must name at least one asset");
        }

        let aliases = match get("ASSET_ALIASES") {
            Some(raw) => parse_aliases(&raw)?,
            None => HashMap::new(),
        };

        let reconnect_base = Duration::from_millis(parse_or(&get, "RECONNECT_DELAY_MS", 5_000_u64)?);
        let reconnect_max = match get("RECONNECT_MAX_DELAY_MS") {
            Some(raw) => Duration::from_millis(
                raw.parse().context("RECONNECT_MAX_DELAY_MS must be a number of milliseconds")?,
            ),
            None => reconnect_base,
        };

        let simulator = SimulatorConfig {
            min_delay: Duration::from_millis(parse_or(&get, "ALERT_MIN_DELAY_MS", 30_000_u64)?),
            max_delay: Duration::from_millis(parse_or(&get, "ALERT_MAX_DELAY_MS", 90_000_u64)?),
        };
        if simulator.max_delay < simulator.min_delay {
            bail!("ALERT_MAX_DELAY_MS must not be smaller than ALERT_MIN_DELAY_MS");
        }

        let threshold_pct: f64 = parse_or(&get, "PRICE_ALERT_THRESHOLD_PCT", 0.5)?;
        if !threshold_pct.is_finite() || threshold_pct < 0.0 {
            bail!("PRICE_ALERT_THRESHOLD_PCT must be a non-negative number");
        }

        let bind_addr: SocketAddr = get("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse()
            .context("BIND_ADDR must be a socket address like 0.0.0.0:3000")?;

        Ok(Self {
            feed_url:             get("FEED_URL").unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            assets,
            aliases,
            cities:               split_list(&get("CITIES").unwrap_or_else(|| DEFAULT_CITIES.to_string())),
            reconnect:            ReconnectPolicy { base: reconnect_base, max: reconnect_max },
            simulator,
            threshold_pct,
            notification_ttl:     Duration::from_millis(parse_or(&get, "NOTIFICATION_TTL_MS", 5_000_u64)?),
            notification_limit:   parse_or(&get, "NOTIFICATION_LIMIT", DEFAULT_MAX_NOTIFICATIONS)?,
            alert_history_limit:  parse_or(&get, "ALERT_HISTORY_LIMIT", DEFAULT_MAX_ALERT_HISTORY)?,
            seed_url:             get("SEED_URL"),
            bind_addr,
            api_key:              get("API_KEY"),
        })
    }

    pub fn stream(&self) -> StreamConfig {
        StreamConfig {
            feed_url:  self.feed_url.clone(),
            assets:    self.assets.clone(),
            aliases:   self.aliases.clone(),
            reconnect: self.reconnect.clone(),
        }
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            threshold_pct:     self.threshold_pct,
            display_timeout:   self.notification_ttl,
            max_notifications: self.notification_limit,
            max_alert_history: self.alert_history_limit,
        }
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw.parse().with_context(|| format!("{key} must be a number, got '{raw}'")),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `bitcoin-cash=bitcoincash,usd-coin=usdc`
fn parse_aliases(raw: &str) -> anyhow::Result<HashMap<String, String>> {
    split_list(raw)
        .into_iter()
        .map(|pair| match pair.split_once('=') {
            Some((feed, internal)) if !feed.trim().is_empty() && !internal.trim().is_empty() => {
                Ok((feed.trim().to_string(), internal.trim().to_string()))
            }
            _ => bail!("ASSET_ALIASES entry '{pair}' must look like feed-id=internal-id"),
        })
        .collect()
}
