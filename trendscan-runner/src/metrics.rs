//! Run statistics for a finished backtest.
//!
//! Each statistic reads the marked-to-close equity series, the closed
//! trades, or both, and returns a number. Nothing here touches sources,
//! the day loop, or the fallback pass.

use serde::{Deserialize, Serialize};
use trendscan_core::domain::ClosedTrade;
use trendscan_core::engine::EquityPoint;

/// Sessions in a year when annualizing daily figures.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Reported profit factor when no trade lost money.
const PROFIT_FACTOR_CAP: f64 = 100.0;

/// Headline statistics of one backtest, as written to `result.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub initial_capital: f64,
    pub final_capital: f64,
    /// Final minus initial capital, in currency.
    pub total_return: f64,
    pub total_return_pct: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    /// Largest peak-to-trough drop, in currency (non-negative).
    pub max_drawdown: f64,
    /// Largest peak-to-trough drop as a negative fraction.
    pub max_drawdown_pct: f64,
    pub trade_count: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    /// Mean loss as a positive number.
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

impl PerformanceMetrics {
    /// Derive every statistic from the daily equity marks and the trade list.
    pub fn compute(equity_curve: &[EquityPoint], trades: &[ClosedTrade], initial_capital: f64) -> Self {
        let equity: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        let trading_days = equity.len();
        let final_capital = equity.last().copied().unwrap_or(initial_capital);
        let total_return = final_capital - initial_capital;
        let total_return_pct = if initial_capital > 0.0 {
            total_return / initial_capital
        } else {
            0.0
        };
        let winning_trades = trades.iter().filter(|t| t.is_winner()).count();

        Self {
            initial_capital,
            final_capital,
            total_return,
            total_return_pct,
            cagr: cagr(&equity, trading_days),
            sharpe: sharpe_ratio(&equity, 0.0),
            sortino: sortino_ratio(&equity, 0.0),
            calmar: calmar_ratio(&equity, trading_days),
            max_drawdown: max_drawdown_amount(&equity),
            max_drawdown_pct: max_drawdown(&equity),
            trade_count: trades.len(),
            winning_trades,
            losing_trades: trades.len() - winning_trades,
            win_rate: win_rate(trades),
            avg_win: avg_win(trades),
            avg_loss: avg_loss(trades),
            profit_factor: profit_factor(trades),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
        }
    }

    /// Metrics of a run that never simulated a day.
    pub fn empty(initial_capital: f64) -> Self {
        Self::compute(&[], &[], initial_capital)
    }

    pub fn log_summary(&self) {
        tracing::info!(
            initial_capital = self.initial_capital,
            final_capital = self.final_capital,
            "total return {:.2} ({:.1}%)",
            self.total_return,
            self.total_return_pct * 100.0
        );
        tracing::info!(
            trades = self.trade_count,
            winners = self.winning_trades,
            losers = self.losing_trades,
            avg_win = self.avg_win,
            avg_loss = self.avg_loss,
            profit_factor = self.profit_factor,
            "win rate {:.1}%",
            self.win_rate * 100.0
        );
        tracing::info!(
            max_drawdown = self.max_drawdown,
            sharpe = self.sharpe,
            sortino = self.sortino,
            calmar = self.calmar,
            "max drawdown {:.1}%, CAGR {:.1}%",
            self.max_drawdown_pct * 100.0,
            self.cagr * 100.0
        );
    }
}

// ─── Return and risk ────────────────────────────────────────────────

/// Growth of the last mark over the first, as a fraction.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&final_eq)) if equity_curve.len() >= 2 && initial > 0.0 => {
            (final_eq - initial) / initial
        }
        _ => 0.0,
    }
}

/// Yearly growth rate that compounds the first mark into the last over
/// `trading_days` sessions. Zero with fewer than two sessions or a
/// non-positive endpoint.
pub fn cagr(equity_curve: &[f64], trading_days: usize) -> f64 {
    let (Some(&first), Some(&last)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if trading_days < 2 || first <= 0.0 || last <= 0.0 {
        return 0.0;
    }
    let years = trading_days as f64 / TRADING_DAYS_PER_YEAR;
    (last / first).powf(years.recip()) - 1.0
}

/// Mean daily excess return over its sample deviation, scaled by the
/// square root of a trading year. Zero for flat or one-return curves.
pub fn sharpe_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean_f64(&excess) / std) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Like [`sharpe_ratio`] but divides by the deviation of losing days only.
/// Zero when no day lost money.
pub fn sortino_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();

    let downside_sq: f64 = excess.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    (mean_f64(&excess) / downside_std) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Yearly growth earned per unit of worst drawdown. Reported as zero
/// for losing runs and for runs that never fell below a peak.
pub fn calmar_ratio(equity_curve: &[f64], trading_days: usize) -> f64 {
    let growth = cagr(equity_curve, trading_days);
    let worst = max_drawdown(equity_curve);
    if growth > 0.0 && worst < 0.0 {
        growth / -worst
    } else {
        0.0
    }
}

/// Deepest fall from a running high, relative to that high. A 15% fall
/// reads as `-0.15`; a curve that never dips reads as `0.0`.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut high = f64::NEG_INFINITY;
    let mut deepest = 0.0_f64;
    for &mark in equity_curve {
        high = high.max(mark);
        if high > 0.0 {
            deepest = deepest.min(mark / high - 1.0);
        }
    }
    deepest
}

/// Deepest fall from a running high, in currency.
pub fn max_drawdown_amount(equity_curve: &[f64]) -> f64 {
    let mut high = f64::NEG_INFINITY;
    let mut deepest = 0.0_f64;
    for &mark in equity_curve {
        high = high.max(mark);
        deepest = deepest.max(high - mark);
    }
    deepest
}

// ─── Trade outcomes ─────────────────────────────────────────────────

/// Share of closed trades that made money.
pub fn win_rate(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Mean P&L of winning trades.
pub fn avg_win(trades: &[ClosedTrade]) -> f64 {
    let wins: Vec<f64> = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).collect();
    mean_f64(&wins)
}

/// Mean P&L of non-winning trades, as a positive number. Break-even trades count as losses.
pub fn avg_loss(trades: &[ClosedTrade]) -> f64 {
    let losses: Vec<f64> = trades.iter().filter(|t| !t.is_winner()).map(|t| t.pnl).collect();
    mean_f64(&losses).abs()
}

/// Money made by winners over money lost by losers, never above
/// 100, which is also the value when nothing lost.
pub fn profit_factor(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades.iter().filter(|t| t.pnl < 0.0).map(|t| t.pnl.abs()).sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { PROFIT_FACTOR_CAP } else { 0.0 };
    }
    (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
}

// ─── Shared arithmetic ──────────────────────────────────────────────

/// Day-over-day fractional change of the equity marks.
pub fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    match values.len() {
        0 => 0.0,
        n => values.iter().sum::<f64>() / n as f64,
    }
}

/// Sample standard deviation (n - 1 denominator).
fn std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let centre = mean_f64(values);
    let squares: f64 = values.iter().map(|v| (v - centre) * (v - centre)).sum();
    (squares / (n - 1) as f64).sqrt()
}

/// Longest run of consecutive winners (or losers) in exit order.
fn max_consecutive(trades: &[ClosedTrade], winners: bool) -> usize {
    trades
        .iter()
        .scan(0usize, |run, trade| {
            *run = if trade.is_winner() == winners { *run + 1 } else { 0 };
            Some(*run)
        })
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use trendscan_core::domain::ExitReason;

    fn make_trade(pnl: f64) -> ClosedTrade {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        ClosedTrade {
            symbol: "SPY".into(),
            entry_date: date,
            entry_price: 100.0,
            shares: 50,
            stop_price: 97.0,
            target_price: 125.0,
            pivot: 100.0,
            exit_date: date,
            exit_price: 100.0 + pnl / 50.0,
            exit_reason: ExitReason::TargetReached,
            pnl,
            pnl_pct: pnl / 5_000.0,
        }
    }

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                date: base + chrono::Duration::days(i as i64),
                equity,
            })
            .collect()
    }

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "actual={actual}, expected={expected}"
        );
    }

    #[test]
    fn total_return_basic() {
        assert_approx(total_return(&[100.0, 110.0]), 0.10);
        assert_approx(total_return(&[100.0]), 0.0);
        assert_approx(total_return(&[]), 0.0);
    }

    #[test]
    fn cagr_one_year_doubling() {
        let mut equity = vec![100.0; 252];
        equity[251] = 200.0;
        assert_approx(cagr(&equity, 252), 1.0);
    }

    #[test]
    fn sharpe_zero_for_constant_equity() {
        assert_eq!(sharpe_ratio(&[100.0; 30], 0.0), 0.0);
    }

    #[test]
    fn sortino_zero_without_downside() {
        let equity: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        assert_eq!(sortino_ratio(&equity, 0.0), 0.0);
        assert!(sharpe_ratio(&equity, 0.0) > 0.0);
    }

    #[test]
    fn max_drawdown_fraction_and_amount() {
        let equity = [100.0, 120.0, 90.0, 130.0, 117.0];
        assert_approx(max_drawdown(&equity), -0.25);
        assert_approx(max_drawdown_amount(&equity), 30.0);
        assert_approx(max_drawdown(&[100.0, 101.0, 102.0]), 0.0);
    }

    #[test]
    fn calmar_needs_positive_cagr_and_drawdown() {
        assert_eq!(calmar_ratio(&[100.0, 101.0, 102.0], 3), 0.0);
        assert!(calmar_ratio(&[100.0, 90.0, 150.0], 3) > 0.0);
    }

    #[test]
    fn calmar_divides_growth_by_the_worst_fall() {
        // 252 sessions from 100 to 121 with a 20% dip: CAGR 0.21 over 0.20
        let mut equity = vec![100.0; 252];
        equity[1] = 80.0;
        equity[251] = 121.0;
        assert_approx(calmar_ratio(&equity, 252), 0.21 / 0.20);
        assert_eq!(calmar_ratio(&[100.0, 80.0, 90.0], 3), 0.0);
    }

    #[test]
    fn trade_statistics() {
        let trades = vec![make_trade(300.0), make_trade(-100.0), make_trade(100.0), make_trade(0.0)];
        assert_approx(win_rate(&trades), 0.5);
        assert_approx(avg_win(&trades), 200.0);
        // break-even counts as a loss
        assert_approx(avg_loss(&trades), 50.0);
        assert_approx(profit_factor(&trades), 4.0);
    }

    #[test]
    fn profit_factor_capped_without_losses() {
        assert_eq!(profit_factor(&[make_trade(10.0)]), 100.0);
        assert_eq!(profit_factor(&[]), 0.0);
    }

    #[test]
    fn streaks() {
        let trades: Vec<ClosedTrade> = [1.0, 1.0, -1.0, -1.0, -1.0, 1.0]
            .iter()
            .map(|&p| make_trade(p))
            .collect();
        assert_eq!(max_consecutive(&trades, true), 2);
        assert_eq!(max_consecutive(&trades, false), 3);
        assert_eq!(max_consecutive(&[], true), 0);
    }

    #[test]
    fn compute_combines_curve_and_trades() {
        let trades = vec![make_trade(500.0), make_trade(-200.0)];
        let m = PerformanceMetrics::compute(&curve(&[10_000.0, 10_500.0, 10_300.0]), &trades, 10_000.0);
        assert_approx(m.final_capital, 10_300.0);
        assert_approx(m.total_return, 300.0);
        assert_approx(m.total_return_pct, 0.03);
        assert_eq!(m.trade_count, 2);
        assert_eq!(m.winning_trades, 1);
        assert_eq!(m.losing_trades, 1);
        assert_approx(m.max_drawdown, 200.0);
        assert_approx(m.profit_factor, 2.5);
    }

    #[test]
    fn empty_run_reports_initial_capital() {
        let m = PerformanceMetrics::empty(50_000.0);
        assert_eq!(m.final_capital, 50_000.0);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.trade_count, 0);
        assert_eq!(m.max_drawdown, 0.0);
    }
}
