//! Adaptive strictness: a one-way switch from strict to relaxed thresholds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// Threshold profile in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Strict,
    Relaxed,
}

impl FilterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::Strict => "strict",
            FilterMode::Relaxed => "relaxed",
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(FilterMode::Strict),
            "relaxed" => Ok(FilterMode::Relaxed),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Snapshot of the manager's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackState {
    pub mode: FilterMode,
    pub triggered: bool,
}

/// Strict → relaxed state machine.
///
/// Relaxed is terminal until [`reset`](Self::reset). Triggering is idempotent.
#[derive(Debug, Clone)]
pub struct FallbackManager {
    enabled: bool,
    min_trades_threshold: usize,
    state: FallbackState,
}

impl FallbackManager {
    pub fn new(enabled: bool, min_trades_threshold: usize) -> Self {
        Self {
            enabled,
            min_trades_threshold,
            state: FallbackState {
                mode: FilterMode::Strict,
                triggered: false,
            },
        }
    }

    /// True iff enabled, not yet triggered, and `trade_count` is below the threshold.
    pub fn should_fallback(&self, trade_count: usize) -> bool {
        self.enabled && !self.state.triggered && trade_count < self.min_trades_threshold
    }

    /// Switch to relaxed. Only the first call has an effect.
    pub fn trigger_fallback(&mut self) {
        if self.state.triggered {
            return;
        }
        self.state = FallbackState {
            mode: FilterMode::Relaxed,
            triggered: true,
        };
        tracing::warn!(
            threshold = self.min_trades_threshold,
            "too few trades under strict thresholds, switching to relaxed mode"
        );
    }

    pub fn reset(&mut self) {
        self.state = FallbackState {
            mode: FilterMode::Strict,
            triggered: false,
        };
    }

    pub fn current_mode(&self) -> FilterMode {
        self.state.mode
    }

    pub fn is_triggered(&self) -> bool {
        self.state.triggered
    }

    pub fn state(&self) -> FallbackState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_trades_under_threshold_one_falls_back() {
        // GIVEN a manager with threshold 1
        let mut mgr = FallbackManager::new(true, 1);
        // WHEN a strict run closed no trades
        assert!(mgr.should_fallback(0));
        mgr.trigger_fallback();
        // THEN mode is relaxed and no further fallback is requested
        assert_eq!(mgr.current_mode(), FilterMode::Relaxed);
        assert!(mgr.is_triggered());
        assert!(!mgr.should_fallback(0));
    }

    #[test]
    fn enough_trades_stays_strict() {
        let mgr = FallbackManager::new(true, 3);
        assert!(!mgr.should_fallback(3));
        assert!(mgr.should_fallback(2));
    }

    #[test]
    fn disabled_never_falls_back() {
        let mgr = FallbackManager::new(false, 10);
        assert!(!mgr.should_fallback(0));
    }

    #[test]
    fn trigger_is_idempotent() {
        let mut mgr = FallbackManager::new(true, 1);
        mgr.trigger_fallback();
        let first = mgr.state();
        mgr.trigger_fallback();
        assert_eq!(mgr.state(), first);
    }

    #[test]
    fn reset_restores_strict() {
        let mut mgr = FallbackManager::new(true, 1);
        mgr.trigger_fallback();
        mgr.reset();
        assert_eq!(mgr.current_mode(), FilterMode::Strict);
        assert!(!mgr.is_triggered());
        assert!(mgr.should_fallback(0));
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("strict".parse::<FilterMode>().unwrap(), FilterMode::Strict);
        assert_eq!("relaxed".parse::<FilterMode>().unwrap(), FilterMode::Relaxed);
        assert!(matches!(
            "Strict".parse::<FilterMode>(),
            Err(ConfigError::UnknownMode(_))
        ));
    }
}
