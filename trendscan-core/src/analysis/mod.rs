//! Pattern detection: trend-template stages, VCP bases, and RS state conditions.

pub mod stage;
pub mod state_conditions;
pub mod vcp;

pub use stage::{high_low_52w, StageConditions, StageDetector, StageResult, MIN_STAGE_BARS};
pub use state_conditions::{days_since_rs_new_high, has_recent_rs_new_high, rs_new_high_index};
pub use vcp::{extract_swings, Swing, SwingKind, VcpDetector, VcpPattern, VcpRejection};
