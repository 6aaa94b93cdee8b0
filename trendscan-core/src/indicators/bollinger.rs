//! Bollinger Bands: SMA(close) ± k × sample standard deviation of close.
//!
//! Each band is its own indicator instance so the single-series trait holds.
//! Lookback: period - 1.

use super::{mean, sample_std, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    k: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, k: f64, band: BollingerBand) -> Self {
        assert!(period >= 2, "Bollinger period must be >= 2");
        let label = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
        };
        Self {
            period,
            k,
            band,
            name: format!("bb_{label}"),
        }
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let mut result = vec![f64::NAN; closes.len()];
        for end in self.lookback()..closes.len() {
            let window = &closes[end + 1 - self.period..=end];
            let mid = mean(window);
            result[end] = match self.band {
                BollingerBand::Middle => mid,
                BollingerBand::Upper => mid + self.k * sample_std(window),
                BollingerBand::Lower => mid - self.k * sample_std(window),
            };
        }
        result
    }
}
