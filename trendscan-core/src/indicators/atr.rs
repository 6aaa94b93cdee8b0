//! Average True Range as a simple rolling mean of true range.
//!
//! TR[0] = high - low; TR[t] = max(high - low, |high - close[t-1]|, |low - close[t-1]|).
//! Lookback: period - 1.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// True range per bar. The first bar has no previous close and uses its own range.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let range = bar.high - bar.low;
            match i.checked_sub(1).map(|p| bars[p].close) {
                Some(pc) if !pc.is_nan() => range
                    .max((bar.high - pc).abs())
                    .max((bar.low - pc).abs()),
                _ => range,
            }
        })
        .collect()
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let tr = true_range(bars);
        let mut result = vec![f64::NAN; tr.len()];
        for end in self.lookback()..tr.len() {
            let window = &tr[end + 1 - self.period..=end];
            result[end] = super::mean(window);
        }
        result
    }
}
