//! Position lifecycle: an open position is consumed when it closes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    Ma50Break,
    TargetReached,
    EndOfBacktest,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::Ma50Break => "ma50_break",
            ExitReason::TargetReached => "target_reached",
            ExitReason::EndOfBacktest => "end_of_backtest",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A long position held by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub shares: u64,
    pub stop_price: f64,
    pub target_price: f64,
    pub pivot: f64,
}

impl OpenPosition {
    /// Cash spent to open the position, commission included.
    pub fn entry_cost(&self, commission: f64) -> f64 {
        self.shares as f64 * self.entry_price * (1.0 + commission)
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }

    /// Close the position. Commission is charged on both legs of the round trip.
    pub fn close(
        self,
        exit_date: NaiveDate,
        exit_price: f64,
        exit_reason: ExitReason,
        commission: f64,
    ) -> ClosedTrade {
        let shares = self.shares as f64;
        let gross = (exit_price - self.entry_price) * shares;
        let fees = (self.entry_price + exit_price) * shares * commission;
        let pnl_pct = if self.entry_price > 0.0 {
            (exit_price - self.entry_price) / self.entry_price
        } else {
            0.0
        };
        ClosedTrade {
            symbol: self.symbol,
            entry_date: self.entry_date,
            entry_price: self.entry_price,
            shares: self.shares,
            stop_price: self.stop_price,
            target_price: self.target_price,
            pivot: self.pivot,
            exit_date,
            exit_price,
            exit_reason,
            pnl: gross - fees,
            pnl_pct,
        }
    }
}

/// A completed round trip. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub shares: u64,
    pub stop_price: f64,
    pub target_price: f64,
    pub pivot: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub pnl: f64,
    pub pnl_pct: f64,
}

impl ClosedTrade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    /// Cash returned to the account when the position was sold.
    pub fn exit_proceeds(&self, commission: f64) -> f64 {
        self.shares as f64 * self.exit_price * (1.0 - commission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> OpenPosition {
        OpenPosition {
            symbol: "AMD".into(),
            entry_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            entry_price: 100.0,
            shares: 50,
            stop_price: 97.0,
            target_price: 125.0,
            pivot: 100.0,
        }
    }

    #[test]
    fn close_charges_commission_on_both_legs() {
        let exit = NaiveDate::from_ymd_opt(2024, 2, 20).unwrap();
        let trade = open().close(exit, 110.0, ExitReason::Ma50Break, 0.001);
        // gross 500, fees (100 + 110) * 50 * 0.001 = 10.5
        assert!((trade.pnl - 489.5).abs() < 1e-9);
        assert!((trade.pnl_pct - 0.10).abs() < 1e-12);
        assert_eq!(trade.exit_reason, ExitReason::Ma50Break);
        assert!(trade.is_winner());
    }

    #[test]
    fn capital_round_trip_matches_pnl() {
        let pos = open();
        let cost = pos.entry_cost(0.001);
        let trade = pos.close(
            NaiveDate::from_ymd_opt(2024, 2, 5).unwrap(),
            95.0,
            ExitReason::StopLoss,
            0.001,
        );
        let proceeds = trade.exit_proceeds(0.001);
        assert!((proceeds - cost - trade.pnl).abs() < 1e-9);
        assert!(!trade.is_winner());
    }

    #[test]
    fn exit_reason_serializes_snake_case() {
        let json = serde_json::to_string(&ExitReason::EndOfBacktest).unwrap();
        assert_eq!(json, "\"end_of_backtest\"");
        assert_eq!(ExitReason::TargetReached.to_string(), "target_reached");
    }
}
