//! # engine::simulator
//!
//! **Alert Simulator**: fabricates [`WeatherAlert`]s while the feed is open.
//!
//! The simulator itself holds no timer. The connection task owns the single
//! timer slot and asks [`AlertSimulator::next_delay`] for a fresh delay after
//! every firing, so each cycle's length is drawn independently from
//! `Uniform[min_delay, max_delay)`.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use crate::models::{WeatherAlert, WeatherKind};

pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(30_000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(90_000);

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Inclusive lower bound of the firing delay.
    pub min_delay: Duration,
    /// Exclusive upper bound of the firing delay.
    pub max_delay: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

pub struct AlertSimulator {
    rng:    StdRng,
    config: SimulatorConfig,
}

impl AlertSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            config,
        }
    }

    /// Deterministic variant for tests and replays.
    pub fn with_seed(config: SimulatorConfig, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    /// Draw the delay until the next firing.
    pub fn next_delay(&mut self) -> Duration {
        let min = self.config.min_delay.as_millis() as u64;
        let max = self.config.max_delay.as_millis() as u64;
        if max <= min {
            return self.config.min_delay;
        }
        Duration::from_millis(self.rng.random_range(min..max))
    }

    /// One firing: pick a city and a kind uniformly at random.
    /// Returns `None` when no city is known.
    pub fn fire(&mut self, cities: &[String]) -> Option<WeatherAlert> {
        let city = cities.choose(&mut self.rng)?;
        let kind = *WeatherKind::ALL.choose(&mut self.rng)?;
        Some(WeatherAlert::new(city.clone(), kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_single_city_is_always_selected() {
        let mut sim = AlertSimulator::with_seed(SimulatorConfig::default(), 42);
        let cities = vec!["Tokyo".to_string()];

        let mut kinds = HashSet::new();
        for _ in 0..200 {
            let alert = sim.fire(&cities).expect("city list is not empty");
            assert_eq!(alert.city, "Tokyo");
            assert_eq!(alert.message, alert.kind.message());
            kinds.insert(alert.kind);
        }
        assert!(kinds.iter().all(|k| WeatherKind::ALL.contains(k)));
        assert_eq!(kinds.len(), WeatherKind::ALL.len());
    }

    #[test]
    fn test_empty_city_list_skips() {
        let mut sim = AlertSimulator::with_seed(SimulatorConfig::default(), 1);
        assert!(sim.fire(&[]).is_none());
    }

    #[test]
    fn test_delays_are_redrawn_within_range() {
        let mut sim = AlertSimulator::with_seed(SimulatorConfig::default(), 7);
        let delays: Vec<Duration> = (0..500).map(|_| sim.next_delay()).collect();

        assert!(delays.iter().all(|d| *d >= DEFAULT_MIN_DELAY && *d < DEFAULT_MAX_DELAY));
        let distinct: HashSet<_> = delays.iter().collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn test_degenerate_range_uses_min_delay() {
        let config = SimulatorConfig {
            min_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(5),
        };
        let mut sim = AlertSimulator::with_seed(config, 3);
        assert_eq!(sim.next_delay(), Duration::from_secs(5));
    }
}
