//! Daily entry filtering.
//!
//! Universe selection runs the full trend template once; the day loop only
//! re-checks this reduced, look-ahead-safe condition set.

pub mod entry;

pub use entry::{EntryCondition, EntryConditions, EntryEvaluation, SkipReason, DEFAULT_MIN_VOLUME};
