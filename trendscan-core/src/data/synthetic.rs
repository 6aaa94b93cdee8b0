//! Seeded synthetic bars for development runs and tests.
//!
//! Each symbol gets its own deterministic random walk: the RNG is seeded from
//! a BLAKE3 hash of the symbol (and the source's salt), weekends are skipped,
//! and daily returns are drawn uniformly around a configurable drift.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{non_empty, BarSource, DataUnavailable, HistoryWindow};
use crate::domain::{Bar, BarSeries};

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    /// Mixed into every symbol's seed so separate sources can disagree.
    salt: u64,
    /// Mean daily return added to the ±3% uniform draw.
    drift: f64,
    start_price: f64,
}

impl SyntheticSource {
    pub fn new(salt: u64) -> Self {
        Self {
            salt,
            drift: 0.0,
            start_price: 100.0,
        }
    }

    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    pub fn with_start_price(mut self, price: f64) -> Self {
        self.start_price = price;
        self
    }

    fn rng_for(&self, symbol: &str) -> StdRng {
        let mut hasher = blake3::Hasher::new();
        hasher.update(symbol.as_bytes());
        hasher.update(&self.salt.to_le_bytes());
        StdRng::from_seed(*hasher.finalize().as_bytes())
    }

    /// Generate weekday bars for `symbol` across `window`.
    pub fn generate(&self, symbol: &str, window: &HistoryWindow) -> Vec<Bar> {
        let mut rng = self.rng_for(symbol);
        let mut bars = Vec::new();
        let mut price = self.start_price;
        let mut current = window.start;

        while current <= window.end {
            if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
                current += chrono::Duration::days(1);
                continue;
            }

            let daily_return: f64 = self.drift + rng.gen_range(-0.03..0.03);
            let open = price;
            let close = (price * (1.0 + daily_return)).max(0.01);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(500_000..5_000_000u64);

            bars.push(Bar {
                symbol: symbol.to_string(),
                date: current,
                open,
                high,
                low,
                close,
                volume,
            });

            price = close;
            current += chrono::Duration::days(1);
        }

        bars
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(0)
    }
}

impl BarSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, symbol: &str, window: &HistoryWindow) -> Result<BarSeries, DataUnavailable> {
        let bars = self.generate(symbol, window);
        non_empty(BarSeries::new(symbol, bars)?, window)
    }
}
