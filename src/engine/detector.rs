//! # engine::detector
//!
//! **Price-Change Detector**: hot path, runs for every decoded tick.
//!
//! ## Per-tick steps
//! ```text
//! 1. Read baseline for asset
//! 2. Overwrite baseline with the new price (always, freshest price wins)
//! 3. No baseline yet           → first observation, never alerts
//! 4. Baseline 0 / ratio not finite → cannot evaluate, no alert
//! 5. |percent change| > threshold → PriceAlert
//! ```

use chrono::Utc;
use tracing::debug;

use crate::models::{PriceAlert, Severity};
use crate::store::BaselineStore;

/// Absolute percent move above which a tick raises an alert.
pub const DEFAULT_THRESHOLD_PCT: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct PriceChangeDetector {
    threshold_pct: f64,
}

impl Default for PriceChangeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_PCT)
    }
}

impl PriceChangeDetector {
    pub fn new(threshold_pct: f64) -> Self {
        Self { threshold_pct: threshold_pct.abs() }
    }

    pub fn threshold_pct(&self) -> f64 {
        self.threshold_pct
    }

    /// Compare `new_price` against the stored baseline, update the baseline,
    /// and return an alert when the move is strictly above the threshold.
    pub fn observe<S>(&self, store: &mut S, asset_id: &str, new_price: f64) -> Option<PriceAlert>
    where
        S: BaselineStore + ?Sized,
    {
        let previous = store.baseline_price(asset_id);
        store.set_baseline_price(asset_id, new_price);

        let old_price = match previous {
            Some(p) => p,
            None => {
                debug!(asset_id, new_price, "First observation, baseline recorded");
                return None;
            }
        };

        let percent_change = (new_price - old_price) / old_price * 100.0;
        if old_price == 0.0 || !percent_change.is_finite() {
            debug!(asset_id, old_price, new_price, "Baseline unusable, change not evaluated");
            return None;
        }

        if percent_change.abs() <= self.threshold_pct {
            return None;
        }

        debug!(asset_id, old_price, new_price, percent_change, "Significant price move");
        Some(PriceAlert {
            asset_id: asset_id.to_string(),
            old_price,
            new_price,
            percent_change,
            timestamp: Utc::now(),
        })
    }
}

/// Rising prices are good news, falling ones are shown as errors.
pub fn severity_for(alert: &PriceAlert) -> Severity {
    if alert.is_increase() {
        Severity::Success
    } else {
        Severity::Error
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Baselines;

    fn store_with(asset: &str, price: f64) -> Baselines {
        let mut store = Baselines::new();
        store.set_baseline_price(asset, price);
        store
    }

    #[test]
    fn test_first_observation_records_baseline() {
        let mut store = Baselines::new();
        let detector = PriceChangeDetector::default();

        assert_eq!(detector.observe(&mut store, "ethereum", 2_000.0), None);
        assert_eq!(store.baseline_price("ethereum"), Some(2_000.0));
    }

    #[test]
    fn test_threshold_boundary_and_baseline_update() {
        let detector = PriceChangeDetector::default();
        // (old, new, expect alert)
        let cases = [
            (100.0, 100.5, false),  // exactly 0.5% is not above
            (100.0, 100.51, true),
            (100.0, 99.49, true),
            (100.0, 99.6, false),
            (1.0, 1.02, true),
            (20_000.0, 20_000.0, false),
        ];

        for (old, new, expect_alert) in cases {
            let mut store = store_with("asset", old);
            let alert = detector.observe(&mut store, "asset", new);
            assert_eq!(alert.is_some(), expect_alert, "old={old} new={new}");
            assert_eq!(store.baseline_price("asset"), Some(new));

            if let Some(alert) = alert {
                let expected = (new - old) / old * 100.0;
                assert!((alert.percent_change - expected).abs() < 1e-9);
                assert_eq!(alert.old_price, old);
                assert_eq!(alert.new_price, new);
            }
        }
    }

    #[test]
    fn test_zero_baseline_is_guarded() {
        let mut store = store_with("dust", 0.0);
        let detector = PriceChangeDetector::default();

        assert_eq!(detector.observe(&mut store, "dust", 12.0), None);
        assert_eq!(store.baseline_price("dust"), Some(12.0));
    }

    #[test]
    fn test_bitcoin_scenario() {
        let mut store = store_with("bitcoin", 50_000.0);
        let detector = PriceChangeDetector::default();

        let alert = detector
            .observe(&mut store, "bitcoin", 50_300.0)
            .expect("0.6% move should alert");
        assert!((alert.percent_change - 0.6).abs() < 1e-9);
        assert_eq!(alert.new_price, 50_300.0);
        assert_eq!(severity_for(&alert), Severity::Success);

        assert_eq!(detector.observe(&mut store, "bitcoin", 50_310.0), None);
        assert_eq!(store.baseline_price("bitcoin"), Some(50_310.0));
    }

    #[test]
    fn test_drop_maps_to_error_severity() {
        let mut store = store_with("ripple", 0.60);
        let alert = PriceChangeDetector::default()
            .observe(&mut store, "ripple", 0.57)
            .unwrap();
        assert!(alert.percent_change < 0.0);
        assert_eq!(severity_for(&alert), Severity::Error);
    }
}
