//! Market-phase classification with the 9-condition trend template.
//!
//! Stage 2 (advancing) requires every condition to hold on the latest bar.
//! Otherwise the series is stage 4 (declining) when it trades below a falling
//! SMA-200, stage 3 (topping) when the SMA-200 is flat, and stage 1 (basing).

use serde::{Deserialize, Serialize};

use super::state_conditions::has_recent_rs_new_high;
use crate::config::{ConfigError, StageConfig};
use crate::fallback::FilterMode;
use crate::indicators::{Column, SeriesView};

/// Bars needed before any condition is evaluated (one trading year).
pub const MIN_STAGE_BARS: usize = 252;

/// SMA-200 moves smaller than this fraction of its level count as flat.
const FLAT_SLOPE_FRACTION: f64 = 0.01;

/// Outcome of each trend-template condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConditions {
    pub price_above_sma50: bool,
    pub sma50_above_sma150: bool,
    pub sma150_above_sma200: bool,
    pub ma200_uptrend: bool,
    pub above_52w_low: bool,
    pub near_52w_high: bool,
    pub ma50_above_ma150_200: bool,
    pub rs_new_high: bool,
    pub sufficient_volume: bool,
}

impl StageConditions {
    /// (name, passed) pairs in template order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> {
        [
            ("price_above_sma50", self.price_above_sma50),
            ("sma50_above_sma150", self.sma50_above_sma150),
            ("sma150_above_sma200", self.sma150_above_sma200),
            ("ma200_uptrend", self.ma200_uptrend),
            ("above_52w_low", self.above_52w_low),
            ("near_52w_high", self.near_52w_high),
            ("ma50_above_ma150_200", self.ma50_above_ma150_200),
            ("rs_new_high", self.rs_new_high),
            ("sufficient_volume", self.sufficient_volume),
        ]
        .into_iter()
    }

    pub fn all_passed(&self) -> bool {
        self.iter().all(|(_, passed)| passed)
    }
}

/// Result of one classification. Recomputed on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    /// 1 basing, 2 advancing, 3 topping, 4 declining.
    pub stage: u8,
    pub meets_criteria: bool,
    pub conditions: StageConditions,
}

impl StageResult {
    fn basing(conditions: StageConditions) -> Self {
        Self {
            stage: 1,
            meets_criteria: false,
            conditions,
        }
    }
}

/// Stateless classifier over an immutable [`StageConfig`].
#[derive(Debug, Clone)]
pub struct StageDetector {
    config: StageConfig,
}

impl StageDetector {
    pub fn new(config: StageConfig) -> Result<Self, ConfigError> {
        config.profile(FilterMode::Strict)?.validate()?;
        if let Some(relaxed) = &config.relaxed {
            relaxed.validate()?;
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Classify the latest bar of `view`.
    ///
    /// `rs_line` is only consulted when `use_benchmark` is set; without it the
    /// RS condition passes automatically.
    pub fn detect_stage(
        &self,
        view: &SeriesView<'_>,
        rs_line: Option<&[f64]>,
        mode: FilterMode,
        use_benchmark: bool,
    ) -> Result<StageResult, ConfigError> {
        let thresholds = self.config.profile(mode)?;
        if view.len() < MIN_STAGE_BARS {
            return Ok(StageResult::basing(StageConditions::default()));
        }

        let close = view.close();
        let sma50 = view.latest(Column::Sma50);
        let sma150 = view.latest(Column::Sma150);
        let sma200 = view.latest(Column::Sma200);
        let volume_ma50 = view.latest(Column::VolumeMa50);
        let (high_52w, low_52w) = high_low_52w(view);
        let slope = self.ma200_slope(view);

        let rs_new_high = match rs_line {
            Some(rs) if use_benchmark => has_recent_rs_new_high(
                rs,
                self.config.rs_lookback_window,
                thresholds.rs_new_high_threshold,
            ),
            _ => true,
        };

        // NaN comparisons are false, so missing indicators fail their condition.
        let conditions = StageConditions {
            price_above_sma50: close > sma50,
            sma50_above_sma150: sma50 > sma150,
            sma150_above_sma200: sma150 > sma200,
            ma200_uptrend: slope > 0.0,
            above_52w_low: close >= low_52w * thresholds.min_price_above_52w_low,
            near_52w_high: close >= high_52w * thresholds.max_distance_from_52w_high,
            ma50_above_ma150_200: sma50 > sma150 && sma50 > sma200,
            rs_new_high,
            sufficient_volume: volume_ma50 >= thresholds.min_volume,
        };

        if conditions.all_passed() {
            return Ok(StageResult {
                stage: 2,
                meets_criteria: true,
                conditions,
            });
        }

        let stage = if sma200.is_nan() {
            1
        } else if close < sma200 && slope < 0.0 {
            4
        } else if slope.abs() < sma200 * FLAT_SLOPE_FRACTION {
            3
        } else {
            1
        };
        Ok(StageResult {
            stage,
            meets_criteria: false,
            conditions,
        })
    }

    /// SMA-200 change over `min_slope_200_days` bars, 0 when either end is missing.
    pub fn ma200_slope(&self, view: &SeriesView<'_>) -> f64 {
        let sma200 = view.column(Column::Sma200);
        let n = self.config.min_slope_200_days;
        if sma200.len() < n + 1 {
            return 0.0;
        }
        let now = sma200[sma200.len() - 1];
        let past = sma200[sma200.len() - 1 - n];
        if now.is_nan() || past.is_nan() {
            return 0.0;
        }
        now - past
    }
}

/// Highest high and lowest low over the trailing 252 bars (or all bars if fewer).
pub fn high_low_52w(view: &SeriesView<'_>) -> (f64, f64) {
    let bars = view.bars();
    let start = bars.len().saturating_sub(MIN_STAGE_BARS);
    bars[start..].iter().fold(
        (f64::NEG_INFINITY, f64::INFINITY),
        |(hi, lo), b| (hi.max(b.high), lo.min(b.low)),
    )
}
