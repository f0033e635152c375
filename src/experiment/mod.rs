pub mod params;
pub mod sweep;
pub mod table;

pub use params::{ExperimentParams, DEFAULT_ALPHA};
pub use sweep::{scaling_fit, Sweep, SweepConfig, SweepDimension};
pub use table::{ResultRow, ResultTable, HEADER};
