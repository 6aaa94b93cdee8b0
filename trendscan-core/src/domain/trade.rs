//! Trade log rows: one ENTRY and one EXIT per round trip, in execution order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::position::{ClosedTrade, OpenPosition};

/// Reason recorded on every ENTRY row.
pub const ENTRY_REASON: &str = "entry_signal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Entry,
    Exit,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Entry => f.write_str("ENTRY"),
            TradeAction::Exit => f.write_str("EXIT"),
        }
    }
}

/// One row of the trade log. `pnl` is set on EXIT rows only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub date: NaiveDate,
    pub symbol: String,
    pub action: TradeAction,
    pub price: f64,
    pub shares: u64,
    pub reason: String,
    pub pnl: Option<f64>,
    pub capital_after: f64,
}

impl TradeLogEntry {
    pub fn entry(position: &OpenPosition, capital_after: f64) -> Self {
        Self {
            date: position.entry_date,
            symbol: position.symbol.clone(),
            action: TradeAction::Entry,
            price: position.entry_price,
            shares: position.shares,
            reason: ENTRY_REASON.to_string(),
            pnl: None,
            capital_after,
        }
    }

    pub fn exit(trade: &ClosedTrade, capital_after: f64) -> Self {
        Self {
            date: trade.exit_date,
            symbol: trade.symbol.clone(),
            action: TradeAction::Exit,
            price: trade.exit_price,
            shares: trade.shares,
            reason: trade.exit_reason.to_string(),
            pnl: Some(trade.pnl),
            capital_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExitReason;

    #[test]
    fn entry_and_exit_rows() {
        let pos = OpenPosition {
            symbol: "TSLA".into(),
            entry_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            entry_price: 200.0,
            shares: 10,
            stop_price: 194.0,
            target_price: 250.0,
            pivot: 200.0,
        };
        let entry = TradeLogEntry::entry(&pos, 97_998.0);
        assert_eq!(entry.action, TradeAction::Entry);
        assert_eq!(entry.reason, ENTRY_REASON);
        assert!(entry.pnl.is_none());

        let trade = pos.close(
            NaiveDate::from_ymd_opt(2024, 5, 9).unwrap(),
            190.0,
            ExitReason::StopLoss,
            0.0,
        );
        let exit = TradeLogEntry::exit(&trade, 99_898.0);
        assert_eq!(exit.action.to_string(), "EXIT");
        assert_eq!(exit.reason, "stop_loss");
        assert_eq!(exit.pnl, Some(-100.0));
    }
}
