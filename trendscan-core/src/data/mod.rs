//! Bar sources: the trait the runner loads through, plus CSV and synthetic implementations.

pub mod csv_dir;
pub mod provider;
pub mod synthetic;

pub use csv_dir::CsvDirSource;
pub use provider::{BarSource, DataUnavailable, HistoryWindow};
pub use synthetic::SyntheticSource;
