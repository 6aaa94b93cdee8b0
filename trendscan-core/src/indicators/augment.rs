//! Indicator-augmented series and no-look-ahead views over it.
//!
//! All columns are computed once per symbol before the day loop. During the
//! loop, detectors only ever see a [`SeriesView`], a prefix ending at the
//! current simulated day, so nothing past that day is reachable.

use chrono::NaiveDate;

use super::{Atr, Bollinger, BollingerBand, DailyReturn, Ema, Indicator, Sma, Volatility};
use crate::domain::{Bar, BarSeries};

/// Derived columns carried by every [`AugmentedSeries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Sma50,
    Sma150,
    Sma200,
    Ema21,
    Atr14,
    BbUpper,
    BbMiddle,
    BbLower,
    VolumeMa10,
    VolumeMa50,
    RsLine,
    DailyReturn,
    Volatility20,
}

impl Column {
    pub const ALL: [Column; 13] = [
        Column::Sma50,
        Column::Sma150,
        Column::Sma200,
        Column::Ema21,
        Column::Atr14,
        Column::BbUpper,
        Column::BbMiddle,
        Column::BbLower,
        Column::VolumeMa10,
        Column::VolumeMa50,
        Column::RsLine,
        Column::DailyReturn,
        Column::Volatility20,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Sma50 => "sma_50",
            Column::Sma150 => "sma_150",
            Column::Sma200 => "sma_200",
            Column::Ema21 => "ema_21",
            Column::Atr14 => "atr_14",
            Column::BbUpper => "bb_upper",
            Column::BbMiddle => "bb_middle",
            Column::BbLower => "bb_lower",
            Column::VolumeMa10 => "volume_ma_10",
            Column::VolumeMa50 => "volume_ma_50",
            Column::RsLine => "rs_line",
            Column::DailyReturn => "daily_return",
            Column::Volatility20 => "volatility_20",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

fn boxed(indicator: impl Indicator + 'static) -> Box<dyn Indicator> {
    Box::new(indicator)
}

/// Bar-only indicators, paired with the column they fill. The RS line needs a
/// benchmark and is computed separately.
pub fn standard_indicators() -> Vec<(Column, Box<dyn Indicator>)> {
    vec![
        (Column::Sma50, boxed(Sma::new(50))),
        (Column::Sma150, boxed(Sma::new(150))),
        (Column::Sma200, boxed(Sma::new(200))),
        (Column::Ema21, boxed(Ema::new(21))),
        (Column::Atr14, boxed(Atr::new(14))),
        (Column::BbUpper, boxed(Bollinger::new(20, 2.0, BollingerBand::Upper))),
        (Column::BbMiddle, boxed(Bollinger::new(20, 2.0, BollingerBand::Middle))),
        (Column::BbLower, boxed(Bollinger::new(20, 2.0, BollingerBand::Lower))),
        (Column::VolumeMa10, boxed(Sma::volume(10))),
        (Column::VolumeMa50, boxed(Sma::volume(50))),
        (Column::DailyReturn, boxed(DailyReturn)),
        (Column::Volatility20, boxed(Volatility::new(20))),
    ]
}

/// A bar series plus every derived column, all of the same length.
#[derive(Debug, Clone)]
pub struct AugmentedSeries {
    series: BarSeries,
    columns: Vec<Vec<f64>>,
    has_benchmark: bool,
}

/// Compute all derived columns. Without a benchmark the RS column is all NaN.
pub fn augment(series: BarSeries, benchmark: Option<&BarSeries>) -> AugmentedSeries {
    let n = series.len();
    let mut columns = vec![Vec::new(); Column::ALL.len()];
    for (column, indicator) in standard_indicators() {
        let values = indicator.compute(series.bars());
        debug_assert_eq!(
            values.len(),
            n,
            "indicator '{}' produced {} values for {} bars (symbol={})",
            indicator.name(),
            values.len(),
            n,
            series.symbol()
        );
        columns[column.slot()] = values;
    }
    columns[Column::RsLine.slot()] = match benchmark {
        Some(bench) => super::rs_line(series.bars(), bench.bars()),
        None => vec![f64::NAN; n],
    };
    AugmentedSeries {
        series,
        columns,
        has_benchmark: benchmark.is_some(),
    }
}

impl AugmentedSeries {
    pub fn symbol(&self) -> &str {
        self.series.symbol()
    }

    pub fn series(&self) -> &BarSeries {
        &self.series
    }

    pub fn bars(&self) -> &[Bar] {
        self.series.bars()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// True when the RS column was computed against a benchmark.
    pub fn has_benchmark(&self) -> bool {
        self.has_benchmark
    }

    pub fn column(&self, column: Column) -> &[f64] {
        &self.columns[column.slot()]
    }

    /// The whole history as a view.
    pub fn view(&self) -> SeriesView<'_> {
        SeriesView {
            series: self,
            len: self.len(),
        }
    }

    /// The first `len` bars (clamped to the series length).
    pub fn view_len(&self, len: usize) -> SeriesView<'_> {
        SeriesView {
            series: self,
            len: len.min(self.len()),
        }
    }

    /// Every bar dated on or before `date`.
    pub fn view_through(&self, date: NaiveDate) -> SeriesView<'_> {
        self.view_len(self.series.depth_at(date))
    }
}

/// Read-only prefix of an [`AugmentedSeries`]. Bars and columns beyond `len` are not reachable.
#[derive(Debug, Clone, Copy)]
pub struct SeriesView<'a> {
    series: &'a AugmentedSeries,
    len: usize,
}

impl<'a> SeriesView<'a> {
    pub fn symbol(&self) -> &'a str {
        self.series.symbol()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn has_benchmark(&self) -> bool {
        self.series.has_benchmark()
    }

    pub fn bars(&self) -> &'a [Bar] {
        &self.series.bars()[..self.len]
    }

    pub fn column(&self, column: Column) -> &'a [f64] {
        &self.series.column(column)[..self.len]
    }

    pub fn last_bar(&self) -> Option<&'a Bar> {
        self.bars().last()
    }

    /// Latest value of a column, NaN when the view is empty.
    pub fn latest(&self, column: Column) -> f64 {
        self.column(column).last().copied().unwrap_or(f64::NAN)
    }

    /// Latest close, NaN when the view is empty.
    pub fn close(&self) -> f64 {
        self.last_bar().map_or(f64::NAN, |b| b.close)
    }
}
