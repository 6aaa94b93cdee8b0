//! Domain types for trendscan

pub mod bar;
pub mod position;
pub mod series;
pub mod trade;

pub use bar::Bar;
pub use position::{ClosedTrade, ExitReason, OpenPosition};
pub use series::{BarSeries, BarSeriesError};
pub use trade::{TradeAction, TradeLogEntry, ENTRY_REASON};

/// Symbol type alias
pub type Symbol = String;
