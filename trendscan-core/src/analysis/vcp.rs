//! Volatility Contraction Pattern detection.
//!
//! A VCP is a trailing base (35–65 bars) whose successive pullbacks shrink,
//! ending in a tight final contraction near the 52-week high. The pivot is the
//! base high; entry sits just above it and the stop just below.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::stage::high_low_52w;
use crate::config::{ConfigError, VcpConfig};
use crate::domain::Bar;
use crate::indicators::{mean, Column, SeriesView};

/// Bars of the base tail used for the final-contraction low.
const STOP_LOOKBACK: usize = 10;
/// Volume windows for the dry-up ratio.
const DRYUP_SHORT: usize = 10;
const DRYUP_LONG: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwingKind {
    High,
    Low,
}

/// A local extreme inside the base. `index` is relative to the bars it was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Swing {
    pub kind: SwingKind,
    pub price: f64,
    pub index: usize,
}

/// A detected pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VcpPattern {
    pub pivot: f64,
    pub base_start: NaiveDate,
    pub base_end: NaiveDate,
    /// Index distance between the first and last base bar.
    pub base_length: usize,
    /// Pullback fractions, oldest first.
    pub contractions: Vec<f64>,
    pub dryup_confirmed: bool,
    pub entry_price: f64,
    pub stop_price: f64,
    pub risk_pct: f64,
}

/// Why no pattern was found.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VcpRejection {
    #[error("no base with an acceptable range and volume")]
    NoBase,

    #[error("only {found} alternating swings in the base")]
    TooFewSwings { found: usize },

    #[error("only {found} high-low-high pullbacks")]
    TooFewPullbacks { found: usize },

    #[error("pullback {next:.3} is not contracting from {previous:.3}")]
    NotContracting { previous: f64, next: f64 },

    #[error("final pullback {last:.3} exceeds {max:.3}")]
    WideFinalPullback { last: f64, max: f64 },

    #[error("pivot {pivot:.2} too far below 52-week high {high_52w:.2}")]
    PivotBelowHigh { pivot: f64, high_52w: f64 },
}

impl VcpRejection {
    /// Stable key for diagnostics counters.
    pub fn name(&self) -> &'static str {
        match self {
            VcpRejection::NoBase => "vcp_no_base",
            VcpRejection::TooFewSwings { .. } => "vcp_too_few_swings",
            VcpRejection::TooFewPullbacks { .. } => "vcp_too_few_pullbacks",
            VcpRejection::NotContracting { .. } => "vcp_not_contracting",
            VcpRejection::WideFinalPullback { .. } => "vcp_wide_final_pullback",
            VcpRejection::PivotBelowHigh { .. } => "vcp_pivot_below_high",
        }
    }
}

/// Stateless detector over an immutable [`VcpConfig`].
#[derive(Debug, Clone)]
pub struct VcpDetector {
    config: VcpConfig,
}

impl VcpDetector {
    pub fn new(config: VcpConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &VcpConfig {
        &self.config
    }

    /// Pattern ending on the latest bar of `view`, if any.
    pub fn detect_vcp(&self, view: &SeriesView<'_>) -> Option<VcpPattern> {
        match self.evaluate(view) {
            Ok(pattern) => Some(pattern),
            Err(reason) => {
                tracing::debug!(symbol = view.symbol(), %reason, "no VCP");
                None
            }
        }
    }

    /// Same as [`detect_vcp`](Self::detect_vcp) but reports the rejection.
    pub fn evaluate(&self, view: &SeriesView<'_>) -> Result<VcpPattern, VcpRejection> {
        let bars = view.bars();
        let (start, end) = self.find_base(bars).ok_or(VcpRejection::NoBase)?;
        let base = &bars[start..=end];

        let swings = extract_swings(base, self.config.swing_window);
        if swings.len() < 4 {
            return Err(VcpRejection::TooFewSwings {
                found: swings.len(),
            });
        }
        let contractions = self.check_contractions(&swings)?;
        let dryup_confirmed = self.check_dryup(bars, end);

        let pivot = base.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let (high_52w, _) = high_low_52w(view);
        if pivot < high_52w * self.config.pivot_min_high_52w_ratio {
            return Err(VcpRejection::PivotBelowHigh { pivot, high_52w });
        }

        let atr = view.column(Column::Atr14)[end];
        let stop_price = self.stop_price(base, pivot, atr);
        let entry_price = pivot * (1.0 + self.config.entry_buffer);

        Ok(VcpPattern {
            pivot,
            base_start: base[0].date,
            base_end: base[base.len() - 1].date,
            base_length: end - start,
            contractions,
            dryup_confirmed,
            entry_price,
            stop_price,
            risk_pct: (entry_price - stop_price) / entry_price,
        })
    }

    /// Longest qualifying trailing window, searched from `base_period_max` down.
    pub fn find_base(&self, bars: &[Bar]) -> Option<(usize, usize)> {
        let cfg = &self.config;
        (cfg.base_period_min..=cfg.base_period_max)
            .rev()
            .filter(|&period| period <= bars.len())
            .find(|&period| self.is_valid_base(&bars[bars.len() - period..]))
            .map(|period| (bars.len() - period, bars.len() - 1))
    }

    fn is_valid_base(&self, base: &[Bar]) -> bool {
        let high = base.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let low = base.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let closes: Vec<f64> = base.iter().map(|b| b.close).collect();
        let volumes: Vec<f64> = base.iter().map(|b| b.volume as f64).collect();
        let range = (high - low) / mean(&closes);
        range >= self.config.base_range_min
            && range <= self.config.base_range_max
            && mean(&volumes) >= self.config.base_min_volume
    }

    /// Pullback fractions from high-low-high triples, validated as contracting.
    pub fn check_contractions(&self, swings: &[Swing]) -> Result<Vec<f64>, VcpRejection> {
        let pullbacks: Vec<f64> = swings
            .windows(3)
            .filter(|w| {
                w[0].kind == SwingKind::High
                    && w[1].kind == SwingKind::Low
                    && w[2].kind == SwingKind::High
            })
            .map(|w| (w[0].price - w[1].price) / w[0].price)
            .collect();

        if pullbacks.len() < self.config.min_contractions {
            return Err(VcpRejection::TooFewPullbacks {
                found: pullbacks.len(),
            });
        }
        for pair in pullbacks.windows(2) {
            if pair[1] > pair[0] * self.config.contraction_tolerance {
                return Err(VcpRejection::NotContracting {
                    previous: pair[0],
                    next: pair[1],
                });
            }
        }
        let last = pullbacks[pullbacks.len() - 1];
        if last > self.config.last_contraction_max {
            return Err(VcpRejection::WideFinalPullback {
                last,
                max: self.config.last_contraction_max,
            });
        }
        Ok(pullbacks)
    }

    /// Short-window volume over long-window volume at `end`, at or below the ratio.
    /// Needs at least 50 bars before `end`.
    pub fn check_dryup(&self, bars: &[Bar], end: usize) -> bool {
        if end < DRYUP_LONG || end >= bars.len() {
            return false;
        }
        let avg = |from: usize| {
            let v: Vec<f64> = bars[from..=end].iter().map(|b| b.volume as f64).collect();
            mean(&v)
        };
        let long = avg(end - DRYUP_LONG);
        if long <= 0.0 {
            return false;
        }
        avg(end - DRYUP_SHORT) / long <= self.config.dryup_vol_ratio
    }

    fn stop_price(&self, base: &[Bar], pivot: f64, atr: f64) -> f64 {
        let floor = pivot * (1.0 - self.config.max_stop_distance);
        let tail_start = base.len().saturating_sub(STOP_LOOKBACK);
        let last_low = base[tail_start..]
            .iter()
            .map(|b| b.low)
            .fold(f64::INFINITY, f64::min);
        let atr = if atr.is_nan() { 0.0 } else { atr };
        floor.max(last_low - self.config.pivot_buffer_atr * atr)
    }
}

/// Alternating swing highs and lows.
///
/// Bar i is a swing high (low) when its high (low) equals the max (min) over
/// i ± `window`. Only bars with a full window on both sides qualify. At the
/// same index a high is recorded before a low, and runs of the same kind keep
/// their first swing.
pub fn extract_swings(bars: &[Bar], window: usize) -> Vec<Swing> {
    let mut swings: Vec<Swing> = Vec::new();
    if bars.len() <= 2 * window {
        return swings;
    }
    let mut push = |swing: Swing| {
        if swings.last().map_or(true, |last| last.kind != swing.kind) {
            swings.push(swing);
        }
    };
    for i in window..bars.len() - window {
        let around = &bars[i - window..=i + window];
        let high = bars[i].high;
        if around.iter().all(|b| b.high <= high) {
            push(Swing {
                kind: SwingKind::High,
                price: high,
                index: i,
            });
        }
        let low = bars[i].low;
        if around.iter().all(|b| b.low >= low) {
            push(Swing {
                kind: SwingKind::Low,
                price: low,
                index: i,
            });
        }
    }
    swings
}
