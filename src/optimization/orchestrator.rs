use std::fmt::Display;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::quantum_network::{ClientId, FidelityModel, Network};

use super::model::{Integrality, Model, ModelBuilder, ModelConstructionError};
use super::oracle::{OracleOutcome, OracleStatus, SolveOracle};

#[derive(Clone,Copy,Debug,PartialEq,Serialize,Deserialize)]
pub struct SolveConfig {
    // handed to the oracle on every call, the relaxation retry gets its own
    pub time_budget:Duration,
    // rhs widening of the retry model
    pub relaxation_tolerance:f64,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {time_budget:Duration::from_secs(30),relaxation_tolerance:1e-6}
    }
}

impl SolveConfig {
    pub fn with_time_budget(mut self,time_budget:Duration) -> Self {
        self.time_budget = time_budget;
        self
    }
    pub fn with_relaxation_tolerance(mut self,relaxation_tolerance:f64) -> Self {
        self.relaxation_tolerance = relaxation_tolerance;
        self
    }
}

// declaration order is severity order, see worst
#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash,Serialize,Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    TimedOut,
    Infeasible,
}

impl SolveStatus {
    pub fn worst(self,other:SolveStatus) -> SolveStatus {
        self.max(other)
    }
    pub fn label(&self) -> &'static str {
        match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::TimedOut => "timed_out",
            SolveStatus::Infeasible => "infeasible",
        }
    }
}

impl Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f,"{}",self.label())
    }
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct Solution {
    pub status:SolveStatus,
    pub objective:Option<f64>,
    // one value per model variable, empty without a point
    pub assignments:Vec<f64>,
    // wall clock across every oracle call, retry included
    pub duration:Duration,
    pub work:u64,
    // whether the relaxed retry model produced this
    pub relaxed:bool,
}

impl Solution {
    pub fn seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Relative integrality gap `(lp - mip) / lp`.
///
/// Zero when the relaxation is zero, `None` when either side has no objective.
pub fn relative_gap(lp:Option<f64>,mip:Option<f64>) -> Option<f64> {
    let (lp,mip) = (lp?,mip?);
    if lp == 0.0 {
        return Some(0.0)
    }
    Some((lp - mip)/lp)
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct GapReport {
    pub lp:Solution,
    pub mip:Solution,
    pub gap:Option<f64>,
    // fidelity-feasible paths shared by both models
    pub paths:usize,
    pub excluded_clients:Vec<ClientId>,
}

impl GapReport {
    pub fn status(&self) -> SolveStatus {
        self.lp.status.worst(self.mip.status)
    }
}

pub struct Orchestrator<O> {
    oracle:O,
    config:SolveConfig,
    builder:ModelBuilder,
}

impl<O:SolveOracle> Orchestrator<O> {
    pub fn new(oracle:O,config:SolveConfig) -> Self {
        Self {oracle,config,builder:ModelBuilder::default()}
    }
    pub fn with_builder(mut self,builder:ModelBuilder) -> Self {
        self.builder = builder;
        self
    }
    pub fn config(&self) -> &SolveConfig {
        &self.config
    }
    pub fn builder(&self) -> &ModelBuilder {
        &self.builder
    }
    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    // duration and work add up over every oracle call of one solve
    fn timed(&mut self,model:&Model,elapsed:&mut Duration,work:&mut u64) -> OracleOutcome {
        let start = Instant::now();
        let outcome = self.oracle.solve(model, self.config.time_budget);
        *elapsed += start.elapsed();
        *work += outcome.work;
        outcome
    }

    pub fn solve(&mut self,model:&Model) -> Result<Solution> {
        let mut duration = Duration::ZERO;
        let mut work = 0;
        let mut outcome = self.timed(model, &mut duration, &mut work);
        let mut relaxed = false;

        if outcome.status == OracleStatus::Infeasible {
            warn!(
                vars = model.num_vars(),
                rows = model.num_rows(),
                tolerance = self.config.relaxation_tolerance,
                "model infeasible, retrying once relaxed"
            );
            let retry = model.relaxed(self.config.relaxation_tolerance);
            outcome = self.timed(&retry, &mut duration, &mut work);
            relaxed = true;
        }

        let status = match outcome.status {
            OracleStatus::Optimal => SolveStatus::Optimal,
            OracleStatus::TimedOut => {
                warn!(budget = ?self.config.time_budget,incumbent = ?outcome.objective,"solve timed out");
                SolveStatus::TimedOut
            }
            OracleStatus::Infeasible => {
                warn!(relaxed,"model infeasible");
                SolveStatus::Infeasible
            }
            OracleStatus::Unbounded => return Err(ModelConstructionError::Unbounded.into()),
        };
        let objective = match status {
            SolveStatus::Infeasible => None,
            _ => outcome.objective,
        };
        let assignments = if objective.is_some() {outcome.values} else {vec![]};

        debug!(?status,?objective,work,?duration,relaxed,"solve finished");
        Ok(Solution {status,objective,assignments,duration,work,relaxed})
    }

    /// Solves the lp relaxation and the integer model of one network
    /// and reports how far apart they are.
    pub fn integrality_gap(&mut self,network:&Network,fidelity:&FidelityModel) -> Result<GapReport> {
        let plan = self.builder.plan(network, fidelity)?;
        if !plan.excluded_clients().is_empty() {
            debug!(excluded = ?plan.excluded_clients(),"clients without a feasible path");
        }
        let mode = self.builder.demand_mode();
        let lp = self.solve(&plan.model(Integrality::Continuous, mode))?;
        let mip = self.solve(&plan.model(Integrality::Integer, mode))?;
        let gap = relative_gap(lp.objective, mip.objective);

        info!(
            alpha = fidelity.alpha(),
            lp = ?lp.objective,
            mip = ?mip.objective,
            ?gap,
            lp_seconds = lp.seconds(),
            mip_seconds = mip.seconds(),
            "integrality gap"
        );
        Ok(GapReport {
            lp,
            mip,
            gap,
            paths:plan.feasible_paths(),
            excluded_clients:plan.excluded_clients().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use approx::assert_relative_eq;
    use tracing_test::traced_test;

    use super::{relative_gap, Orchestrator, SolveConfig, SolveStatus};
    use crate::error::Error;
    use crate::optimization::branch_and_bound::BranchAndBound;
    use crate::optimization::model::{DemandMode, Integrality, Model, ModelBuilder, ModelConstructionError};
    use crate::optimization::oracle::{OracleOutcome, OracleStatus, SolveOracle};
    use crate::quantum_network::{ClientId, Demand, FidelityModel, Network};

    // replays canned outcomes and remembers what it was asked
    struct Scripted {
        outcomes:VecDeque<OracleOutcome>,
        seen_rows:Vec<usize>,
    }

    impl Scripted {
        fn new(outcomes:Vec<OracleOutcome>) -> Self {
            Self {outcomes:outcomes.into(),seen_rows:vec![]}
        }
    }

    impl SolveOracle for Scripted {
        fn solve(&mut self,model:&Model,_time_budget:Duration) -> OracleOutcome {
            self.seen_rows.push(model.num_rows());
            self.outcomes.pop_front().unwrap_or(OracleOutcome::without_point(OracleStatus::Infeasible, 0))
        }
    }

    fn network() -> Network {
        let mut network = Network::new(2, 2, 50);
        network.add_feed(0, 8, 0.99);
        network.add_feed(1, 3, 0.99);
        network.add_access(0, ClientId(0), 5, 0.95);
        network.add_access(1, ClientId(1), 5, 0.95);
        network.add_demand(Demand {client:ClientId(0),requested_pairs:4,min_fidelity:0.8});
        network.add_demand(Demand {client:ClientId(1),requested_pairs:6,min_fidelity:0.8});
        network
    }

    fn model() -> Model {
        ModelBuilder::default().build(&network(), &FidelityModel::new(1.0).unwrap(), Integrality::Integer).unwrap()
    }

    fn optimal(objective:f64,vars:usize) -> OracleOutcome {
        OracleOutcome {status:OracleStatus::Optimal,objective:Some(objective),values:vec![0.0;vars],work:3}
    }

    #[test]
    fn test_relative_gap() {
        assert_eq!(relative_gap(Some(10.0), Some(8.0)),Some(0.2));
        assert_eq!(relative_gap(Some(0.0), Some(0.0)),Some(0.0));
        assert_eq!(relative_gap(None, Some(1.0)),None);
        assert_eq!(relative_gap(Some(1.0), None),None);
    }

    #[test]
    fn test_status_severity() {
        assert_eq!(SolveStatus::Optimal.worst(SolveStatus::TimedOut),SolveStatus::TimedOut);
        assert_eq!(SolveStatus::Infeasible.worst(SolveStatus::TimedOut),SolveStatus::Infeasible);
        assert_eq!(SolveStatus::TimedOut.to_string(),"timed_out");
        assert_eq!(serde_json::to_string(&SolveStatus::TimedOut).unwrap(),"\"timed_out\"");
    }

    #[traced_test]
    #[test]
    fn test_infeasible_retries_relaxed_once() {
        let model = model();
        let script = Scripted::new(vec![
            OracleOutcome::without_point(OracleStatus::Infeasible, 1),
            optimal(7.0, model.num_vars()),
        ]);
        let mut orchestrator = Orchestrator::new(script, SolveConfig::default());
        let solution = orchestrator.solve(&model).unwrap();

        assert_eq!(solution.status,SolveStatus::Optimal);
        assert_eq!(solution.objective,Some(7.0));
        assert!(solution.relaxed);
        // pivots of both calls
        assert_eq!(solution.work,1 + 3);
        let seen = &orchestrator.oracle_mut().seen_rows;
        assert_eq!(seen.len(),2);
        // the retry model has no fidelity rows
        assert_eq!(seen[1],seen[0] - 2);
        assert!(logs_contain("retrying once relaxed"));
    }

    #[traced_test]
    #[test]
    fn test_still_infeasible_after_retry() {
        let script = Scripted::new(vec![]);
        let mut orchestrator = Orchestrator::new(script, SolveConfig::default());
        let solution = orchestrator.solve(&model()).unwrap();
        assert_eq!(solution.status,SolveStatus::Infeasible);
        assert_eq!(solution.objective,None);
        assert!(solution.assignments.is_empty());
        assert_eq!(orchestrator.oracle_mut().seen_rows.len(),2);
    }

    #[test]
    fn test_timeout_keeps_incumbent() {
        let model = model();
        let incumbent = OracleOutcome {status:OracleStatus::TimedOut,objective:Some(5.0),values:vec![1.0;model.num_vars()],work:9};
        let mut orchestrator = Orchestrator::new(Scripted::new(vec![incumbent]), SolveConfig::default());
        let solution = orchestrator.solve(&model).unwrap();
        assert_eq!(solution.status,SolveStatus::TimedOut);
        assert_eq!(solution.objective,Some(5.0));
        assert_eq!(solution.work,9);
        assert!(!solution.relaxed);
    }

    #[test]
    fn test_unbounded_is_a_construction_error() {
        let unbounded = OracleOutcome::without_point(OracleStatus::Unbounded, 0);
        let mut orchestrator = Orchestrator::new(Scripted::new(vec![unbounded]), SolveConfig::default());
        let err = orchestrator.solve(&model()).unwrap_err();
        assert!(matches!(err,Error::ModelConstruction(ModelConstructionError::Unbounded)));
    }

    #[test]
    fn test_gap_with_reference_oracle() {
        let mut orchestrator = Orchestrator::new(BranchAndBound::default(), SolveConfig::default());
        let report = orchestrator.integrality_gap(&network(), &FidelityModel::new(1.0).unwrap()).unwrap();
        // client 0 gets 4, client 1 is held to 3 by its feed
        assert_relative_eq!(report.lp.objective.unwrap(),7.0,epsilon = 1e-7);
        assert_relative_eq!(report.mip.objective.unwrap(),7.0,epsilon = 1e-7);
        assert_relative_eq!(report.gap.unwrap(),0.0,epsilon = 1e-9);
        assert_eq!(report.status(),SolveStatus::Optimal);
        assert_eq!(report.paths,2);
        assert!(report.excluded_clients.is_empty());
    }

    #[test]
    fn test_all_or_nothing_gap() {
        let builder = ModelBuilder::default().with_demand_mode(DemandMode::AllOrNothing);
        let mut orchestrator = Orchestrator::new(BranchAndBound::default(), SolveConfig::default()).with_builder(builder);
        let report = orchestrator.integrality_gap(&network(), &FidelityModel::new(1.0).unwrap()).unwrap();
        // client 1 wants 6 through a feed of 3, the lp serves half of it
        assert_relative_eq!(report.lp.objective.unwrap(),1.5,epsilon = 1e-7);
        assert_relative_eq!(report.mip.objective.unwrap(),1.0,epsilon = 1e-7);
        assert_relative_eq!(report.gap.unwrap(),1.0/3.0,epsilon = 1e-7);
    }
}
