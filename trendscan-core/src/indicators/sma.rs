//! Simple Moving Average over close or volume.
//!
//! Lookback: period - 1 (first valid value at index period-1).

use super::Indicator;
use crate::domain::Bar;

/// Bar field an average is taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Close,
    Volume,
}

impl Source {
    pub fn of(&self, bar: &Bar) -> f64 {
        match self {
            Source::Close => bar.close,
            Source::Volume => bar.volume as f64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    source: Source,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            source: Source::Close,
            name: format!("sma_{period}"),
        }
    }

    /// Moving average of share volume.
    pub fn volume(period: usize) -> Self {
        assert!(period >= 1, "volume MA period must be >= 1");
        Self {
            period,
            source: Source::Volume,
            name: format!("volume_ma_{period}"),
        }
    }
}

impl Indicator for Sma {
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

        let values: Vec<f64> = bars.iter().map(|b| self.source.of(b)).collect();
        let mut sum = 0.0;
        let mut nan_count = 0usize;
        for (i, &v) in values.iter().enumerate() {
            if v.is_nan() {
                nan_count += 1;
            } else {
                sum += v;
            }
            if i >= self.period {
                let leaving = values[i - self.period];
                if leaving.is_nan() {
                    nan_count -= 1;
                } else {
                    sum -= leaving;
                }
            }
            if i + 1 >= self.period && nan_count == 0 {
                result[i] = sum / self.period as f64;
            }
        }
        result
    }
}
