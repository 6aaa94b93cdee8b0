//! Relative-strength line: symbol close divided by benchmark close on the same date.

use crate::domain::Bar;

/// Values are NaN on dates the benchmark has no bar for, or when the benchmark close is zero.
/// `benchmark` must be date-ordered.
pub fn rs_line(bars: &[Bar], benchmark: &[Bar]) -> Vec<f64> {
    bars.iter()
        .map(|bar| {
            match benchmark.binary_search_by_key(&bar.date, |b| b.date) {
                Ok(j) if benchmark[j].close != 0.0 => bar.close / benchmark[j].close,
                _ => f64::NAN,
            }
        })
        .collect()
}
