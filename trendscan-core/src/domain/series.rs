//! BarSeries — a per-symbol, strictly date-ordered run of bars.

use chrono::NaiveDate;
use thiserror::Error;

use super::bar::Bar;

/// Rejections raised while building a [`BarSeries`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarSeriesError {
    #[error("{symbol}: bar dated {date} is not after {previous}")]
    OutOfOrder {
        symbol: String,
        previous: NaiveDate,
        date: NaiveDate,
    },

    #[error("{symbol}: bar belongs to '{found}'")]
    MixedSymbols { symbol: String, found: String },
}

/// Date-ordered bars for one symbol. Dates are strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Validate ordering and symbol ownership. Duplicated dates are rejected as out of order.
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, BarSeriesError> {
        let symbol = symbol.into();
        for bar in &bars {
            if bar.symbol != symbol {
                return Err(BarSeriesError::MixedSymbols {
                    symbol,
                    found: bar.symbol.clone(),
                });
            }
        }
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(BarSeriesError::OutOfOrder {
                    symbol,
                    previous: pair[0].date,
                    date: pair[1].date,
                });
            }
        }
        Ok(Self { symbol, bars })
    }

    /// Sort by date and drop duplicate dates (first occurrence wins) before validating.
    pub fn from_unsorted(
        symbol: impl Into<String>,
        mut bars: Vec<Bar>,
    ) -> Result<Self, BarSeriesError> {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Self::new(symbol, bars)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Index of the bar dated exactly `date`.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.bars.binary_search_by_key(&date, |b| b.date).ok()
    }

    /// Index of the latest bar dated on or before `date`.
    pub fn index_at_or_before(&self, date: NaiveDate) -> Option<usize> {
        let count = self.bars.partition_point(|b| b.date <= date);
        count.checked_sub(1)
    }

    /// Number of bars dated on or before `date`.
    pub fn depth_at(&self, date: NaiveDate) -> usize {
        self.bars.partition_point(|b| b.date <= date)
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32) -> Bar {
        Bar {
            symbol: "MSFT".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: 10.0,
            high: 11.0,
            low: 9.0,
            close: 10.5,
            volume: 1_000,
        }
    }

    #[test]
    fn accepts_strictly_increasing_dates() {
        let series = BarSeries::new("MSFT", vec![bar(2), bar(3), bar(5)]).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.last_date(), NaiveDate::from_ymd_opt(2024, 1, 5));
    }

    #[test]
    fn rejects_duplicate_date() {
        let err = BarSeries::new("MSFT", vec![bar(2), bar(2)]).unwrap_err();
        assert!(matches!(err, BarSeriesError::OutOfOrder { .. }));
    }

    #[test]
    fn rejects_foreign_symbol() {
        let mut other = bar(3);
        other.symbol = "AAPL".into();
        let err = BarSeries::new("MSFT", vec![bar(2), other]).unwrap_err();
        assert!(matches!(err, BarSeriesError::MixedSymbols { .. }));
    }

    #[test]
    fn from_unsorted_sorts_and_dedups() {
        let series = BarSeries::from_unsorted("MSFT", vec![bar(5), bar(2), bar(5), bar(3)]).unwrap();
        let days: Vec<u32> = series
            .bars()
            .iter()
            .map(|b| chrono::Datelike::day(&b.date))
            .collect();
        assert_eq!(days, vec![2, 3, 5]);
    }

    #[test]
    fn date_lookups() {
        let series = BarSeries::new("MSFT", vec![bar(2), bar(3), bar(5)]).unwrap();
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        assert_eq!(series.index_of(d(3)), Some(1));
        assert_eq!(series.index_of(d(4)), None);
        assert_eq!(series.index_at_or_before(d(4)), Some(1));
        assert_eq!(series.index_at_or_before(d(1)), None);
        assert_eq!(series.depth_at(d(5)), 3);
        assert_eq!(series.depth_at(d(1)), 0);
    }
}
