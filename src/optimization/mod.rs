pub mod branch_and_bound;
pub mod model;
pub mod oracle;
pub mod orchestrator;

pub use branch_and_bound::{BranchAndBound, BranchAndBoundOptions};
pub use model::{DemandMode, Integrality, Model, ModelBuilder, ModelConstructionError, RoutingPlan};
pub use oracle::{OracleOutcome, OracleStatus, SolveOracle};
pub use orchestrator::{relative_gap, GapReport, Orchestrator, Solution, SolveConfig, SolveStatus};
