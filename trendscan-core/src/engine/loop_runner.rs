//! Day-by-day simulation loop — the heart of the backtester.
//!
//! Three phases per trading day:
//! 1. Exits: every open position with a bar today is checked against its stop,
//!    the SMA-50, and its target, in that priority.
//! 2. Entries: while under the position cap, candidates are scanned in symbol
//!    order and opened when the entry filter (and optional VCP breakout) pass.
//! 3. Mark: equity = capital + open positions at their last known close.
//!
//! Remaining positions are force-closed after the last day.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::{VcpDetector, MIN_STAGE_BARS};
use crate::diagnostics::Diagnostics;
use crate::domain::{BarSeries, ExitReason, OpenPosition};
use crate::fallback::FilterMode;
use crate::filter::EntryCondition;
use crate::indicators::{AugmentedSeries, Column, SeriesView};

use super::state::{EngineConfig, EngineState, SimulationResult};

/// Bars of history a symbol needs on a given day before it may be entered.
pub const MIN_HISTORY_BARS: usize = MIN_STAGE_BARS;

/// Dates the loop walks: the benchmark's dates in `[start, end]` when one is
/// loaded, otherwise the union of every symbol's dates in that range.
pub fn trading_days(
    universe: &BTreeMap<String, AugmentedSeries>,
    benchmark: Option<&BarSeries>,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<NaiveDate> {
    let in_range = |d: &NaiveDate| *d >= start && *d <= end;
    match benchmark {
        Some(bench) => bench
            .bars()
            .iter()
            .map(|b| b.date)
            .filter(in_range)
            .collect(),
        None => universe
            .values()
            .flat_map(|aug| aug.bars().iter().map(|b| b.date))
            .filter(in_range)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    }
}

/// Exit decision for one bar. Stop wins over the MA break, which wins over the target.
pub fn exit_reason(position: &OpenPosition, close: f64, sma50: f64) -> Option<ExitReason> {
    if close <= position.stop_price {
        Some(ExitReason::StopLoss)
    } else if close < sma50 {
        Some(ExitReason::Ma50Break)
    } else if close >= position.target_price {
        Some(ExitReason::TargetReached)
    } else {
        None
    }
}

/// Entry stop and pivot, from the VCP pattern or the fixed stop fraction.
/// `None` means the breakout was not confirmed today.
fn entry_levels(
    view: &SeriesView<'_>,
    config: &EngineConfig,
    vcp: &VcpDetector,
    diagnostics: &mut Diagnostics,
) -> Option<(f64, f64)> {
    let close = view.close();
    if !config.use_vcp {
        return Some((close * (1.0 - config.exit.stop_loss_pct), close));
    }
    let pattern = match vcp.evaluate(view) {
        Ok(pattern) => pattern,
        Err(rejection) => {
            diagnostics.record_vcp_rejection(&rejection);
            tracing::debug!(symbol = view.symbol(), %rejection, "entry without VCP");
            return None;
        }
    };
    let volume = view.last_bar().map_or(0.0, |b| b.volume as f64);
    let volume_ratio = volume / view.latest(Column::VolumeMa50);
    let confirmed = close >= pattern.pivot && volume_ratio >= config.breakout_vol_ratio;
    if !confirmed {
        tracing::debug!(
            symbol = view.symbol(),
            close,
            pivot = pattern.pivot,
            volume_ratio,
            "VCP found but no breakout"
        );
        return None;
    }
    Some((pattern.stop_price, pattern.pivot))
}

/// Run one simulation pass over `trading_days` in a fixed filter mode.
///
/// `diagnostics` carries counters gathered before the loop (universe size,
/// fetch results); the loop adds its own on top.
pub fn run_simulation(
    universe: &BTreeMap<String, AugmentedSeries>,
    trading_days: &[NaiveDate],
    mode: FilterMode,
    config: &EngineConfig,
    entry: &EntryCondition,
    vcp: &VcpDetector,
    diagnostics: Diagnostics,
) -> SimulationResult {
    let commission = config.commission;
    let mut state = EngineState::new(config.initial_capital, diagnostics);

    tracing::debug!(
        mode = %mode,
        symbols = universe.len(),
        days = trading_days.len(),
        "simulation start"
    );

    for &day in trading_days {
        // Today's bar index per symbol. Symbols without a bar today are absent.
        let today: BTreeMap<&str, usize> = universe
            .iter()
            .filter_map(|(symbol, aug)| {
                aug.series()
                    .index_of(day)
                    .map(|idx| (symbol.as_str(), idx))
            })
            .collect();
        for (&symbol, &idx) in &today {
            state
                .last_close
                .insert(symbol.to_string(), universe[symbol].bars()[idx].close);
        }

        // ─── Phase 1: Exits ───
        let held: Vec<String> = state.positions.keys().cloned().collect();
        for symbol in held {
            let Some(&idx) = today.get(symbol.as_str()) else {
                continue;
            };
            let aug = &universe[&symbol];
            let close = aug.bars()[idx].close;
            let sma50 = aug.column(Column::Sma50)[idx];
            let reason = state
                .positions
                .get(&symbol)
                .and_then(|pos| exit_reason(pos, close, sma50));
            if let Some(reason) = reason {
                state.close(&symbol, day, close, reason, commission);
            }
        }

        // ─── Phase 2: Entries ───
        if state.positions.len() >= config.max_positions {
            let blocked = today.values().any(|&idx| idx + 1 >= MIN_HISTORY_BARS);
            if blocked {
                state.diagnostics.max_positions_reached += 1;
            }
        } else {
            for (&symbol, &idx) in &today {
                if state.holds(symbol) {
                    continue;
                }
                let depth = idx + 1;
                if depth < MIN_HISTORY_BARS {
                    state.diagnostics.insufficient_data += 1;
                    continue;
                }
                let view = universe[symbol].view_len(depth);
                let evaluation = entry.evaluate(&view, mode);
                state.diagnostics.record_entry_evaluation(&evaluation);
                if !evaluation.passed {
                    continue;
                }

                let Some((stop_price, pivot)) =
                    entry_levels(&view, config, vcp, &mut state.diagnostics)
                else {
                    continue;
                };
                state.diagnostics.total_entry_attempts += 1;

                let entry_price = view.close();
                let risk_per_share = entry_price - stop_price;
                let shares = (state.capital * config.risk_per_trade / risk_per_share).floor();
                let sized = risk_per_share > 0.0 && shares >= 1.0;
                if !sized {
                    continue;
                }
                let position = OpenPosition {
                    symbol: symbol.to_string(),
                    entry_date: day,
                    entry_price,
                    shares: shares as u64,
                    stop_price,
                    target_price: entry_price * (1.0 + config.exit.target_gain_pct),
                    pivot,
                };
                if position.entry_cost(commission) > state.capital {
                    state.diagnostics.insufficient_capital += 1;
                    continue;
                }
                state.open(position, commission);

                if state.positions.len() >= config.max_positions {
                    break;
                }
            }
        }

        // ─── Phase 3: Mark ───
        state.mark(day);
    }

    // Force-close at the final available close on or before the last day,
    // dated by the bar that supplied it.
    if let Some(&last_day) = trading_days.last() {
        let held: Vec<String> = state.positions.keys().cloned().collect();
        for symbol in held {
            let fill = universe
                .get(&symbol)
                .and_then(|aug| {
                    aug.series().index_at_or_before(last_day).map(|idx| {
                        let bar = &aug.bars()[idx];
                        (bar.date, bar.close)
                    })
                })
                .or_else(|| {
                    state
                        .last_close
                        .get(&symbol)
                        .map(|&close| (last_day, close))
                });
            let Some((date, price)) = fill else {
                continue;
            };
            state.close(&symbol, date, price, ExitReason::EndOfBacktest, commission);
        }
    }

    tracing::debug!(
        mode = %mode,
        trades = state.trades.len(),
        capital = state.capital,
        "simulation finished"
    );

    SimulationResult {
        mode,
        trades: state.trades,
        trade_log: state.trade_log,
        equity_curve: state.equity_curve,
        final_capital: state.capital,
        diagnostics: state.diagnostics,
    }
}
