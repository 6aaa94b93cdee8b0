//! Bar source trait and structured error types.
//!
//! The BarSource trait abstracts over where daily bars come from (a CSV
//! directory, a seeded generator, or anything a caller plugs in) so the runner
//! can swap implementations and tests can mock them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{BarSeries, BarSeriesError};

/// Inclusive date range requested from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl HistoryWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Window for a backtest over `[start, end]` that also loads
    /// `warmup_days` calendar days before `start` for indicator warm-up.
    /// A warm-up reaching past the calendar's range saturates at `NaiveDate::MIN`.
    pub fn with_warmup(start: NaiveDate, end: NaiveDate, warmup_days: i64) -> Self {
        let start = chrono::Duration::try_days(warmup_days)
            .and_then(|warmup| start.checked_sub_signed(warmup))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Why a symbol could not be supplied. The symbol is excluded, never fatal.
#[derive(Debug, Error)]
pub enum DataUnavailable {
    #[error("no data for '{symbol}'")]
    NotFound { symbol: String },

    #[error("no bars for '{symbol}' between {start} and {end}")]
    Empty {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("'{symbol}' has {bars} bars, {required} required")]
    TooShort {
        symbol: String,
        bars: usize,
        required: usize,
    },

    #[error("failed to read data for '{symbol}': {reason}")]
    Unreadable { symbol: String, reason: String },

    #[error(transparent)]
    Invalid(#[from] BarSeriesError),
}

impl DataUnavailable {
    pub fn symbol(&self) -> Option<&str> {
        match self {
            DataUnavailable::NotFound { symbol }
            | DataUnavailable::Empty { symbol, .. }
            | DataUnavailable::TooShort { symbol, .. }
            | DataUnavailable::Unreadable { symbol, .. } => Some(symbol),
            DataUnavailable::Invalid(_) => None,
        }
    }
}

/// Anything that can hand out daily bars for a symbol.
pub trait BarSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Daily bars for `symbol` dated inside `window`, ordered by date.
    fn fetch(&self, symbol: &str, window: &HistoryWindow) -> Result<BarSeries, DataUnavailable>;

    /// Bars for the benchmark index. Sources that store the benchmark like any
    /// other symbol can keep the default.
    fn fetch_benchmark(
        &self,
        symbol: &str,
        window: &HistoryWindow,
    ) -> Result<BarSeries, DataUnavailable> {
        self.fetch(symbol, window)
    }
}

/// Reject an empty fetch result with the requested window in the error.
pub(crate) fn non_empty(
    series: BarSeries,
    window: &HistoryWindow,
) -> Result<BarSeries, DataUnavailable> {
    if series.is_empty() {
        Err(DataUnavailable::Empty {
            symbol: series.symbol().to_string(),
            start: window.start,
            end: window.end,
        })
    } else {
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn warmup_window_extends_backwards() {
        let w = HistoryWindow::with_warmup(d(2024, 1, 1), d(2024, 6, 30), 400);
        assert_eq!(w.start, d(2022, 11, 27));
        assert!(w.contains(d(2023, 5, 1)));
        assert!(!w.contains(d(2024, 7, 1)));
    }

    #[test]
    fn oversized_warmup_saturates_instead_of_panicking() {
        let w = HistoryWindow::with_warmup(d(2024, 1, 1), d(2024, 6, 30), 4_000_000_000);
        assert_eq!(w.start, NaiveDate::MIN);
        assert!(w.contains(d(1900, 1, 1)));
    }

    #[test]
    fn error_carries_symbol() {
        let err = DataUnavailable::TooShort {
            symbol: "XYZ".into(),
            bars: 100,
            required: 252,
        };
        assert_eq!(err.symbol(), Some("XYZ"));
        assert_eq!(err.to_string(), "'XYZ' has 100 bars, 252 required");
    }
}
