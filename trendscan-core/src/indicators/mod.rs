//! Indicator engine.
//!
//! Every indicator is a pure function of a bar history: a slice in, a series of
//! the same length out, `f64::NAN` until the warm-up window is satisfied. The
//! full set is computed once per symbol by [`augment`] and read back through
//! [`AugmentedSeries`] columns.

pub mod atr;
pub mod augment;
pub mod bollinger;
pub mod ema;
pub mod returns;
pub mod rs_line;
pub mod sma;

pub use atr::{true_range, Atr};
pub use augment::{augment, standard_indicators, AugmentedSeries, Column, SeriesView};
pub use bollinger::{Bollinger, BollingerBand};
pub use ema::Ema;
pub use returns::{DailyReturn, Volatility};
pub use rs_line::rs_line;
pub use sma::{Sma, Source};

use crate::domain::Bar;

/// A derived series computed from bar history.
///
/// # Look-ahead contamination guard
/// No value at bar t may depend on bars t+1 or later. Every indicator must give
/// identical output on a truncated prefix and on the full series.
pub trait Indicator: Send + Sync {
    /// Column-style name, e.g. "sma_50", "atr_14".
    fn name(&self) -> &str;

    /// Number of leading NaN values before the first valid output.
    fn lookback(&self) -> usize;

    /// Compute for the whole slice. Output length equals `bars.len()`.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Mean of a slice, NaN when empty or when any element is NaN.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1), NaN below two elements.
pub(crate) fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Synthetic bars from close prices for tests.
///
/// open = prev close, high/low = max/min(open, close) ± 1.0, volume = 1_000_000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                symbol: "TEST".to_string(),
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1_000_000,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
