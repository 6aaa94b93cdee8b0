//! Daily percentage return and rolling volatility of those returns.

use super::{sample_std, Indicator};
use crate::domain::Bar;

/// close[t] / close[t-1] - 1. Lookback: 1.
#[derive(Debug, Clone, Default)]
pub struct DailyReturn;

impl Indicator for DailyReturn {
    fn name(&self) -> &str {
        "daily_return"
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut result = vec![f64::NAN; bars.len()];
        for i in 1..bars.len() {
            let prev = bars[i - 1].close;
            if prev != 0.0 {
                result[i] = bars[i].close / prev - 1.0;
            }
        }
        result
    }
}

/// Rolling sample standard deviation of daily returns. Lookback: period.
#[derive(Debug, Clone)]
pub struct Volatility {
    period: usize,
    name: String,
}

impl Volatility {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "volatility period must be >= 2");
        Self {
            period,
            name: format!("volatility_{period}"),
        }
    }
}

impl Indicator for Volatility {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let returns = DailyReturn.compute(bars);
        let mut result = vec![f64::NAN; returns.len()];
        for end in self.lookback()..returns.len() {
            result[end] = sample_std(&returns[end + 1 - self.period..=end]);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn daily_return_values() {
        let out = DailyReturn.compute(&make_bars(&[100.0, 110.0, 99.0]));
        assert!(out[0].is_nan());
        assert_approx(out[1], 0.10, DEFAULT_EPSILON);
        assert_approx(out[2], -0.10, DEFAULT_EPSILON);
    }

    #[test]
    fn constant_growth_has_zero_volatility() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let out = Volatility::new(20).compute(&make_bars(&closes));
        assert!(out[19].is_nan());
        assert_approx(out[20], 0.0, 1e-9);
    }
}
