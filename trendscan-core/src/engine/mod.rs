//! Simulation engine — the day-by-day loop and its state.
//!
//! The engine consumes augmented series (indicators precomputed by the data
//! loader) and walks the trading calendar once per filter mode:
//!
//! 1. Exits: stop-loss, SMA-50 break, target
//! 2. Entries: entry filter, optional VCP breakout, risk-based sizing
//! 3. Mark: equity at the day's closes

pub mod loop_runner;
pub mod state;

pub use loop_runner::{exit_reason, run_simulation, trading_days, MIN_HISTORY_BARS};
pub use state::{EngineConfig, EngineState, EquityPoint, SimulationResult};
