//! Exponential Moving Average of close.
//!
//! EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1).
//! Seeded with the SMA of the first `period` closes. Lookback: period - 1.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period {
            return result;
        }

        let seed_window = &bars[..self.period];
        if seed_window.iter().any(|b| b.close.is_nan()) {
            return result;
        }
        let mut prev = seed_window.iter().map(|b| b.close).sum::<f64>() / self.period as f64;
        result[self.period - 1] = prev;

        let alpha = 2.0 / (self.period as f64 + 1.0);
        for (i, bar) in bars.iter().enumerate().skip(self.period) {
            // A gap in closes ends the recursion; everything after stays NaN.
            if bar.close.is_nan() {
                break;
            }
            prev = alpha * bar.close + (1.0 - alpha) * prev;
            result[i] = prev;
        }
        result
    }
}
