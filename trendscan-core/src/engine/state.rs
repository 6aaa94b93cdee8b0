//! Engine configuration, mutable state, and simulation result types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::config::{require, ConfigError, ExitConfig};
use crate::diagnostics::Diagnostics;
use crate::domain::{ClosedTrade, ExitReason, OpenPosition, TradeLogEntry};
use crate::fallback::FilterMode;

/// Configuration for a single simulation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub initial_capital: f64,
    pub max_positions: usize,
    /// Fraction charged on each leg of a round trip.
    pub commission: f64,
    /// Fraction of current capital put at risk between entry and stop.
    pub risk_per_trade: f64,
    pub exit: ExitConfig,
    /// Require a VCP breakout on top of the entry filter.
    pub use_vcp: bool,
    pub breakout_vol_ratio: f64,
}

impl EngineConfig {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            max_positions: 5,
            commission: 0.001,
            risk_per_trade: 0.0075,
            exit: ExitConfig::default(),
            use_vcp: false,
            breakout_vol_ratio: 1.5,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require(
            "initial_capital",
            self.initial_capital,
            self.initial_capital > 0.0,
            "must be positive",
        )?;
        require(
            "max_positions",
            self.max_positions as f64,
            self.max_positions >= 1,
            "must be at least 1",
        )?;
        require(
            "commission",
            self.commission,
            (0.0..1.0).contains(&self.commission),
            "must be in [0, 1)",
        )?;
        require(
            "risk_per_trade",
            self.risk_per_trade,
            self.risk_per_trade > 0.0 && self.risk_per_trade <= 1.0,
            "must be in (0, 1]",
        )?;
        self.exit.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(100_000.0)
    }
}

/// Marked-to-market account value at the close of one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// Mutable state that evolves day by day. Only the loop touches it.
#[derive(Debug)]
pub struct EngineState {
    pub capital: f64,
    pub positions: BTreeMap<String, OpenPosition>,
    pub trades: Vec<ClosedTrade>,
    pub trade_log: Vec<TradeLogEntry>,
    pub equity_curve: Vec<EquityPoint>,
    /// Last seen close per symbol, carried over days without a bar.
    pub last_close: HashMap<String, f64>,
    pub diagnostics: Diagnostics,
}

impl EngineState {
    pub fn new(initial_capital: f64, diagnostics: Diagnostics) -> Self {
        Self {
            capital: initial_capital,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            trade_log: Vec::new(),
            equity_curve: Vec::new(),
            last_close: HashMap::new(),
            diagnostics,
        }
    }

    pub fn holds(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    /// Debit the entry cost and start holding the position.
    pub fn open(&mut self, position: OpenPosition, commission: f64) {
        let cost = position.entry_cost(commission);
        debug_assert!(
            cost <= self.capital + 1e-9,
            "entry cost {cost} exceeds capital {}",
            self.capital
        );
        self.capital -= cost;
        tracing::info!(
            symbol = %position.symbol,
            date = %position.entry_date,
            price = position.entry_price,
            shares = position.shares,
            stop = position.stop_price,
            capital = self.capital,
            "ENTRY"
        );
        self.trade_log
            .push(TradeLogEntry::entry(&position, self.capital));
        self.positions.insert(position.symbol.clone(), position);
    }

    /// Close a held position, credit the proceeds, and record the trade.
    pub fn close(
        &mut self,
        symbol: &str,
        date: NaiveDate,
        price: f64,
        reason: ExitReason,
        commission: f64,
    ) -> Option<&ClosedTrade> {
        let position = self.positions.remove(symbol)?;
        let trade = position.close(date, price, reason, commission);
        self.capital += trade.exit_proceeds(commission);
        tracing::info!(
            symbol = %trade.symbol,
            date = %date,
            price,
            reason = %reason,
            pnl = trade.pnl,
            capital = self.capital,
            "EXIT"
        );
        self.trade_log.push(TradeLogEntry::exit(&trade, self.capital));
        self.trades.push(trade);
        self.trades.last()
    }

    /// Capital plus open positions at their last known close.
    pub fn equity(&self) -> f64 {
        let held: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = self
                    .last_close
                    .get(&pos.symbol)
                    .copied()
                    .unwrap_or(pos.entry_price);
                pos.market_value(price)
            })
            .sum();
        self.capital + held
    }

    pub fn mark(&mut self, date: NaiveDate) {
        let equity = self.equity();
        self.equity_curve.push(EquityPoint { date, equity });
    }
}

/// Result of one simulation pass in a single filter mode.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub mode: FilterMode,
    pub trades: Vec<ClosedTrade>,
    pub trade_log: Vec<TradeLogEntry>,
    pub equity_curve: Vec<EquityPoint>,
    pub final_capital: f64,
    pub diagnostics: Diagnostics,
}

impl SimulationResult {
    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }
}
