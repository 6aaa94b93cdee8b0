//! Detector, filter, and exit configuration.
//!
//! Every detector takes an immutable copy of its section at construction and
//! validates it there, so a bad threshold fails before any data is touched.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::fallback::FilterMode;

/// Configuration failures. Always fatal at construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown filter mode '{0}' (expected 'strict' or 'relaxed')")]
    UnknownMode(String),

    #[error("no threshold profile configured for {0} mode")]
    MissingProfile(FilterMode),

    #[error("invalid value for {field}: {value} ({reason})")]
    InvalidThreshold {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("start date {start} is not before end date {end}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Fail with [`ConfigError::InvalidThreshold`] unless `ok` holds and `value` is finite.
pub fn require(field: &'static str, value: f64, ok: bool, reason: &'static str) -> Result<(), ConfigError> {
    if ok && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold {
            field,
            value,
            reason,
        })
    }
}

// ─── Stage ──────────────────────────────────────────────────────────

/// One threshold profile of the trend template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageThresholds {
    /// Close must be at least this multiple of the 52-week low.
    pub min_price_above_52w_low: f64,
    /// Close must be at least this fraction of the 52-week high.
    pub max_distance_from_52w_high: f64,
    /// RS line must reach this fraction of its trailing-year high.
    pub rs_new_high_threshold: f64,
    /// Minimum 50-day average volume.
    pub min_volume: f64,
}

impl StageThresholds {
    pub fn strict() -> Self {
        Self {
            min_price_above_52w_low: 1.30,
            max_distance_from_52w_high: 0.75,
            rs_new_high_threshold: 0.95,
            min_volume: 500_000.0,
        }
    }

    pub fn relaxed() -> Self {
        Self {
            min_price_above_52w_low: 1.20,
            max_distance_from_52w_high: 0.60,
            rs_new_high_threshold: 0.90,
            min_volume: 300_000.0,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require(
            "min_price_above_52w_low",
            self.min_price_above_52w_low,
            self.min_price_above_52w_low > 0.0,
            "must be positive",
        )?;
        require(
            "max_distance_from_52w_high",
            self.max_distance_from_52w_high,
            self.max_distance_from_52w_high > 0.0 && self.max_distance_from_52w_high <= 1.0,
            "must be in (0, 1]",
        )?;
        require(
            "rs_new_high_threshold",
            self.rs_new_high_threshold,
            self.rs_new_high_threshold > 0.0 && self.rs_new_high_threshold <= 1.0,
            "must be in (0, 1]",
        )?;
        require(
            "min_volume",
            self.min_volume,
            self.min_volume >= 0.0,
            "must be non-negative",
        )
    }
}

impl Default for StageThresholds {
    fn default() -> Self {
        Self::strict()
    }
}

/// Trend-template settings plus the strict/relaxed profiles.
///
/// When neither `[stage.strict]` nor `[stage.relaxed]` is present, the
/// thresholds written directly under `[stage]` form a single implicit strict
/// profile and relaxed mode is unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Bars between the two SMA-200 samples used for the slope.
    pub min_slope_200_days: usize,
    /// Trailing window scanned for an RS new high.
    pub rs_lookback_window: usize,
    pub auto_fallback_enabled: bool,
    /// Fallback fires when a strict run closes fewer trades than this.
    pub min_trades_threshold: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<StageThresholds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relaxed: Option<StageThresholds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price_above_52w_low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_distance_from_52w_high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rs_new_high_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_volume: Option<f64>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            min_slope_200_days: 20,
            rs_lookback_window: 20,
            auto_fallback_enabled: true,
            min_trades_threshold: 1,
            strict: Some(StageThresholds::strict()),
            relaxed: Some(StageThresholds::relaxed()),
            min_price_above_52w_low: None,
            max_distance_from_52w_high: None,
            rs_new_high_threshold: None,
            min_volume: None,
        }
    }
}

impl StageConfig {
    fn has_implicit_thresholds(&self) -> bool {
        self.min_price_above_52w_low.is_some()
            || self.max_distance_from_52w_high.is_some()
            || self.rs_new_high_threshold.is_some()
            || self.min_volume.is_some()
    }

    fn implicit_profile(&self) -> StageThresholds {
        let base = StageThresholds::strict();
        StageThresholds {
            min_price_above_52w_low: self
                .min_price_above_52w_low
                .unwrap_or(base.min_price_above_52w_low),
            max_distance_from_52w_high: self
                .max_distance_from_52w_high
                .unwrap_or(base.max_distance_from_52w_high),
            rs_new_high_threshold: self
                .rs_new_high_threshold
                .unwrap_or(base.rs_new_high_threshold),
            min_volume: self.min_volume.unwrap_or(base.min_volume),
        }
    }

    /// Fill in both default profiles when a parsed `[stage]` section named no
    /// thresholds at all.
    pub fn normalize(&mut self) {
        if self.strict.is_none() && self.relaxed.is_none() && !self.has_implicit_thresholds() {
            self.strict = Some(StageThresholds::strict());
            self.relaxed = Some(StageThresholds::relaxed());
        }
    }

    /// Threshold profile for a mode.
    pub fn profile(&self, mode: FilterMode) -> Result<StageThresholds, ConfigError> {
        match mode {
            FilterMode::Strict => Ok(self.strict.unwrap_or_else(|| self.implicit_profile())),
            FilterMode::Relaxed => self.relaxed.ok_or(ConfigError::MissingProfile(mode)),
        }
    }

    /// Same as [`profile`](Self::profile) but from a mode string.
    pub fn profile_named(&self, mode: &str) -> Result<StageThresholds, ConfigError> {
        self.profile(mode.parse()?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require(
            "min_slope_200_days",
            self.min_slope_200_days as f64,
            self.min_slope_200_days >= 1,
            "must be at least 1",
        )?;
        require(
            "rs_lookback_window",
            self.rs_lookback_window as f64,
            self.rs_lookback_window >= 1,
            "must be at least 1",
        )?;
        self.profile(FilterMode::Strict)?.validate()?;
        if let Some(relaxed) = &self.relaxed {
            relaxed.validate()?;
        }
        if self.auto_fallback_enabled && self.relaxed.is_none() {
            return Err(ConfigError::MissingProfile(FilterMode::Relaxed));
        }
        Ok(())
    }
}

// ─── VCP ────────────────────────────────────────────────────────────

/// Volatility-contraction-pattern detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VcpConfig {
    pub base_period_min: usize,
    pub base_period_max: usize,
    /// Accepted (max high - min low) / mean close of a base.
    pub base_range_min: f64,
    pub base_range_max: f64,
    pub base_min_volume: f64,
    /// Bars on each side a swing must dominate.
    pub swing_window: usize,
    pub min_contractions: usize,
    /// Each pullback may be at most this multiple of the previous one.
    pub contraction_tolerance: f64,
    pub last_contraction_max: f64,
    pub dryup_vol_ratio: f64,
    pub pivot_min_high_52w_ratio: f64,
    pub pivot_buffer_atr: f64,
    /// Stop never sits further below the pivot than this fraction.
    pub max_stop_distance: f64,
    /// Entry sits this fraction above the pivot.
    pub entry_buffer: f64,
}

impl Default for VcpConfig {
    fn default() -> Self {
        Self {
            base_period_min: 35,
            base_period_max: 65,
            base_range_min: 0.10,
            base_range_max: 0.40,
            base_min_volume: 100_000.0,
            swing_window: 5,
            min_contractions: 2,
            contraction_tolerance: 1.1,
            last_contraction_max: 0.10,
            dryup_vol_ratio: 0.6,
            pivot_min_high_52w_ratio: 0.95,
            pivot_buffer_atr: 0.5,
            max_stop_distance: 0.03,
            entry_buffer: 0.01,
        }
    }
}

impl VcpConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(
            "base_period_min",
            self.base_period_min as f64,
            self.base_period_min >= 2 * self.swing_window + 1,
            "must fit at least one full swing window",
        )?;
        require(
            "base_period_max",
            self.base_period_max as f64,
            self.base_period_max >= self.base_period_min,
            "must not be below base_period_min",
        )?;
        require(
            "base_range_max",
            self.base_range_max,
            self.base_range_min >= 0.0 && self.base_range_max >= self.base_range_min,
            "range bounds must be ordered and non-negative",
        )?;
        require(
            "contraction_tolerance",
            self.contraction_tolerance,
            self.contraction_tolerance > 0.0,
            "must be positive",
        )?;
        require(
            "last_contraction_max",
            self.last_contraction_max,
            self.last_contraction_max > 0.0,
            "must be positive",
        )?;
        require(
            "dryup_vol_ratio",
            self.dryup_vol_ratio,
            self.dryup_vol_ratio > 0.0,
            "must be positive",
        )?;
        require(
            "max_stop_distance",
            self.max_stop_distance,
            self.max_stop_distance > 0.0 && self.max_stop_distance < 1.0,
            "must be in (0, 1)",
        )
    }
}

// ─── Entry / exit ───────────────────────────────────────────────────

/// Daily entry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Require a confirmed VCP breakout on top of the entry filter.
    pub use_vcp: bool,
    /// Breakout-day volume over its 50-day average.
    pub breakout_vol_ratio: f64,
    /// Volume floor used when a mode's profile carries none.
    pub min_volume: Option<f64>,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            use_vcp: false,
            breakout_vol_ratio: 1.5,
            min_volume: None,
        }
    }
}

/// Fixed exit levels relative to the entry price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    pub stop_loss_pct: f64,
    pub target_gain_pct: f64,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            stop_loss_pct: 0.03,
            target_gain_pct: 0.25,
        }
    }
}

impl ExitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(
            "stop_loss_pct",
            self.stop_loss_pct,
            self.stop_loss_pct > 0.0 && self.stop_loss_pct < 1.0,
            "must be in (0, 1)",
        )?;
        require(
            "target_gain_pct",
            self.target_gain_pct,
            self.target_gain_pct > 0.0,
            "must be positive",
        )
    }
}
