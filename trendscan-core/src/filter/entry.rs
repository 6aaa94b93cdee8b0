//! EntryCondition — the reduced trend check applied on every simulated day.
//!
//! Both modes: close > SMA50, SMA50 > SMA150, 50-day average volume at or above
//! the mode's floor. Strict adds SMA50 > SMA200. RS new highs and 52-week
//! distances are deliberately absent: those describe history, not today.

use serde::{Deserialize, Serialize};

use crate::config::{EntryConfig, StageConfig};
use crate::fallback::FilterMode;
use crate::indicators::{Column, SeriesView};

/// Volume floor when neither the mode's profile nor the entry section sets one.
pub const DEFAULT_MIN_VOLUME: f64 = 500_000.0;

/// Bars needed before the filter looks at anything.
pub const MIN_ENTRY_BARS: usize = 50;

/// Why an evaluation was skipped rather than judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InsufficientData,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::InsufficientData => "insufficient_data",
        }
    }
}

/// Per-condition outcomes. `sma50_above_sma200` is only evaluated in strict mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryConditions {
    pub price_above_sma50: bool,
    pub sma50_above_sma150: bool,
    pub sma50_above_sma200: Option<bool>,
    pub sufficient_volume: bool,
}

impl EntryConditions {
    fn all_false(mode: FilterMode) -> Self {
        Self {
            sma50_above_sma200: (mode == FilterMode::Strict).then_some(false),
            ..Self::default()
        }
    }

    /// (name, passed) for every condition evaluated in this mode.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> {
        [
            Some(("price_above_sma50", self.price_above_sma50)),
            Some(("sma50_above_sma150", self.sma50_above_sma150)),
            self.sma50_above_sma200.map(|p| ("sma50_above_sma200", p)),
            Some(("sufficient_volume", self.sufficient_volume)),
        ]
        .into_iter()
        .flatten()
    }

    pub fn all_passed(&self) -> bool {
        self.iter().all(|(_, passed)| passed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryEvaluation {
    pub passed: bool,
    pub conditions: EntryConditions,
    pub mode: FilterMode,
    pub reason: Option<SkipReason>,
}

impl EntryEvaluation {
    /// Names of the conditions that failed.
    pub fn failed(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.conditions
            .iter()
            .filter(|(_, passed)| !passed)
            .map(|(name, _)| name)
    }
}

/// Stateless daily filter. Volume floors for both modes are resolved at construction.
#[derive(Debug, Clone)]
pub struct EntryCondition {
    strict_min_volume: f64,
    relaxed_min_volume: f64,
}

impl EntryCondition {
    pub fn new(stage: &StageConfig, entry: &EntryConfig) -> Self {
        let fallback = entry.min_volume.unwrap_or(DEFAULT_MIN_VOLUME);
        let strict = stage
            .strict
            .map(|p| p.min_volume)
            .or(stage.min_volume)
            .unwrap_or(fallback);
        let relaxed = stage.relaxed.map(|p| p.min_volume).unwrap_or(fallback);
        tracing::debug!(strict, relaxed, "entry volume floors");
        Self {
            strict_min_volume: strict,
            relaxed_min_volume: relaxed,
        }
    }

    pub fn volume_threshold(&self, mode: FilterMode) -> f64 {
        match mode {
            FilterMode::Strict => self.strict_min_volume,
            FilterMode::Relaxed => self.relaxed_min_volume,
        }
    }

    /// Condition names evaluated in `mode`, in evaluation order.
    pub fn condition_names(mode: FilterMode) -> &'static [&'static str] {
        match mode {
            FilterMode::Strict => &[
                "price_above_sma50",
                "sma50_above_sma150",
                "sma50_above_sma200",
                "sufficient_volume",
            ],
            FilterMode::Relaxed => &["price_above_sma50", "sma50_above_sma150", "sufficient_volume"],
        }
    }

    /// Judge the latest bar of `view`. Missing indicator values fail their condition.
    pub fn evaluate(&self, view: &SeriesView<'_>, mode: FilterMode) -> EntryEvaluation {
        if view.len() < MIN_ENTRY_BARS {
            return EntryEvaluation {
                passed: false,
                conditions: EntryConditions::all_false(mode),
                mode,
                reason: Some(SkipReason::InsufficientData),
            };
        }

        let close = view.close();
        let sma50 = view.latest(Column::Sma50);
        let sma150 = view.latest(Column::Sma150);
        let sma200 = view.latest(Column::Sma200);
        let volume_ma50 = view.latest(Column::VolumeMa50);

        let conditions = EntryConditions {
            price_above_sma50: close > sma50,
            sma50_above_sma150: sma50 > sma150,
            sma50_above_sma200: (mode == FilterMode::Strict).then_some(sma50 > sma200),
            sufficient_volume: volume_ma50 >= self.volume_threshold(mode),
        };
        EntryEvaluation {
            passed: conditions.all_passed(),
            conditions,
            mode,
            reason: None,
        }
    }
}
