use std::collections::HashMap;
use std::fmt::Display;
use std::io::Write;
use std::str::FromStr;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::optimization::{relative_gap, DemandMode, ModelBuilder, Orchestrator, SolveConfig, SolveOracle, SolveStatus};
use crate::quantum_network::{generate_seeded, ConfigurationError, FidelityProfile, PathPolicy};
use crate::scientific_computing::statistics::{self, FitError, FitReport};

use super::params::ExperimentParams;
use super::table::{ResultRow, ResultTable};

#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash,Serialize,Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepDimension {
    Clients,
    Repeaters,
    RepCoeff,
    Alpha,
}

lazy_static! {
    // default sweep values per dimension
    static ref PRESETS:HashMap<SweepDimension,Vec<f64>> = {
        let mut presets = HashMap::new();
        presets.insert(SweepDimension::Clients, vec![10.0,15.0,20.0,25.0,30.0]);
        presets.insert(SweepDimension::Repeaters, vec![250.0,300.0,350.0,400.0,450.0]);
        presets.insert(SweepDimension::RepCoeff, vec![0.01,0.02,0.03,0.04,0.05]);
        presets.insert(SweepDimension::Alpha, vec![0.5,1.0,1.5,2.0,2.5,3.0]);
        presets
    };
}

fn count(field:&'static str,value:f64) -> std::result::Result<usize,ConfigurationError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(ConfigurationError::Unparsable { field, value: value.to_string() })
    }
    Ok(value as usize)
}

impl SweepDimension {
    pub const ALL:[SweepDimension;4] = [Self::Clients,Self::Repeaters,Self::RepCoeff,Self::Alpha];

    pub fn label(&self) -> &'static str {
        match self {
            SweepDimension::Clients => "clients",
            SweepDimension::Repeaters => "repeaters",
            SweepDimension::RepCoeff => "rep_coeff",
            SweepDimension::Alpha => "alpha",
        }
    }
    pub fn preset(&self) -> &'static [f64] {
        PRESETS.get(self).map(Vec::as_slice).unwrap_or(&[])
    }
    // the current value of this dimension in params
    pub fn value_of(&self,params:&ExperimentParams) -> f64 {
        match self {
            SweepDimension::Clients => params.network.num_clients as f64,
            SweepDimension::Repeaters => params.network.num_repeaters as f64,
            SweepDimension::RepCoeff => params.network.rep_coeff,
            SweepDimension::Alpha => params.alpha,
        }
    }
    pub fn apply(&self,base:&ExperimentParams,value:f64) -> std::result::Result<ExperimentParams,ConfigurationError> {
        let mut params = *base;
        match self {
            SweepDimension::Clients => params.network.num_clients = count("num_clients", value)?,
            SweepDimension::Repeaters => params.network.num_repeaters = count("num_repeaters", value)?,
            SweepDimension::RepCoeff => params.network.rep_coeff = value,
            SweepDimension::Alpha => params.alpha = value,
        }
        params.validate()?;
        Ok(params)
    }
}

impl Display for SweepDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f,"{}",self.label())
    }
}

impl FromStr for SweepDimension {
    type Err = ConfigurationError;

    fn from_str(s:&str) -> std::result::Result<Self,Self::Err> {
        Self::ALL.into_iter()
            .find(|d| d.label() == s)
            .ok_or_else(|| ConfigurationError::UnknownDimension(s.to_string()))
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Serialize,Deserialize)]
pub struct SweepConfig {
    // networks generated per sweep point, run i uses base_seed + i
    pub runs:usize,
    pub base_seed:u64,
    pub profile:FidelityProfile,
    pub policy:PathPolicy,
    pub demand_mode:DemandMode,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            runs:5,
            base_seed:0,
            profile:FidelityProfile::default(),
            policy:PathPolicy::default(),
            demand_mode:DemandMode::default(),
        }
    }
}

impl SweepConfig {
    pub fn with_runs(mut self,runs:usize) -> Self {
        self.runs = runs;
        self
    }
    pub fn with_base_seed(mut self,base_seed:u64) -> Self {
        self.base_seed = base_seed;
        self
    }
    pub fn with_profile(mut self,profile:FidelityProfile) -> Self {
        self.profile = profile;
        self
    }
    pub fn with_policy(mut self,policy:PathPolicy) -> Self {
        self.policy = policy;
        self
    }
    pub fn with_demand_mode(mut self,demand_mode:DemandMode) -> Self {
        self.demand_mode = demand_mode;
        self
    }
}

/// Sequential parameter sweep: every point generates `runs` networks,
/// solves both model variants on each and folds them into one row.
pub struct Sweep<O> {
    orchestrator:Orchestrator<O>,
    config:SweepConfig,
}

impl<O:SolveOracle> Sweep<O> {
    pub fn new(oracle:O,solve:SolveConfig,config:SweepConfig) -> Self {
        let orchestrator = Orchestrator::new(oracle, solve)
            .with_builder(ModelBuilder::new(config.policy).with_demand_mode(config.demand_mode));
        Self {orchestrator,config}
    }
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }
    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator<O> {
        &mut self.orchestrator
    }

    pub fn run_point(&mut self,params:&ExperimentParams,value:f64) -> Result<ResultRow> {
        if self.config.runs == 0 {
            return Err(ConfigurationError::ZeroRuns.into())
        }
        let fidelity = params.fidelity_model()?;

        let mut lp_objectives = vec![];
        let mut mip_objectives = vec![];
        let mut lp_seconds = vec![];
        let mut mip_seconds = vec![];
        let mut status = SolveStatus::Optimal;

        for run in 0..self.config.runs {
            let seed = self.config.base_seed.wrapping_add(run as u64);
            let network = generate_seeded(&params.network, &self.config.profile, seed)?;
            let report = match self.orchestrator.integrality_gap(&network, &fidelity) {
                Ok(report) => report,
                Err(Error::ModelConstruction(source)) => {
                    return Err(Error::SweepPoint { value, params: *params, source })
                }
                Err(err) => return Err(err),
            };
            debug!(run,seed,gap = ?report.gap,status = %report.status(),"sweep run");

            if let (Some(lp),Some(mip)) = (report.lp.objective,report.mip.objective) {
                lp_objectives.push(lp);
                mip_objectives.push(mip);
            }
            lp_seconds.push(report.lp.seconds());
            mip_seconds.push(report.mip.seconds());
            status = status.worst(report.status());
        }

        let lp_objective = statistics::mean(&lp_objectives);
        let mip_objective = statistics::mean(&mip_objectives);
        Ok(ResultRow {
            value,
            lp_objective,
            mip_objective,
            gap:relative_gap(lp_objective, mip_objective),
            lp_seconds:statistics::mean(&lp_seconds).unwrap_or(0.0),
            mip_seconds:statistics::mean(&mip_seconds).unwrap_or(0.0),
            status,
        })
    }

    // fail-fast: the first hard error ends the sweep, rows already written stay
    pub fn run<W:Write>(
        &mut self,
        dimension:SweepDimension,
        base:&ExperimentParams,
        values:&[f64],
        table:&mut ResultTable<W>,
    ) -> Result<Vec<ResultRow>> {
        if values.is_empty() {
            return Err(ConfigurationError::EmptySweep.into())
        }
        info!(%dimension,points = values.len(),runs = self.config.runs,demand_mode = %self.config.demand_mode,"sweep started");

        let mut rows = Vec::with_capacity(values.len());
        for &value in values {
            let params = dimension.apply(base, value)?;
            let row = self.run_point(&params, value)?;
            table.append(&row)?;
            info!(
                %dimension,
                value,
                lp = ?row.lp_objective,
                mip = ?row.mip_objective,
                gap = ?row.gap,
                lp_seconds = row.lp_seconds,
                mip_seconds = row.mip_seconds,
                status = %row.status,
                "sweep point"
            );
            rows.push(row);
        }
        info!(%dimension,points = rows.len(),"sweep finished");
        Ok(rows)
    }
}

/// Quadratic fit of mean integer solve time against the swept value.
pub fn scaling_fit(rows:&[ResultRow]) -> std::result::Result<FitReport,FitError> {
    let data:Vec<(f64,f64)> = rows.iter().map(|r| (r.value,r.mip_seconds)).collect();
    let report = statistics::fit_and_examine(&data)?;
    info!(terms = ?report.terms,rmse = report.rmse,r_squared = report.r_squared,"runtime scaling fit");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{scaling_fit, Sweep, SweepConfig, SweepDimension};
    use crate::error::Error;
    use crate::experiment::params::ExperimentParams;
    use crate::experiment::table::{ResultRow, ResultTable};
    use crate::optimization::{
        BranchAndBound, DemandMode, Model, OracleOutcome, OracleStatus, SolveConfig, SolveOracle, SolveStatus,
    };
    use crate::quantum_network::{ConfigurationError, NetworkParams};

    fn small() -> ExperimentParams {
        let network = NetworkParams::default()
            .with_num_clients(4)
            .with_num_repeaters(20)
            .with_rep_coeff(0.1)
            .with_gen_coeff(0.5)
            .with_client_coeff(0.3);
        ExperimentParams::default().with_network(network)
    }

    // reports the same outcome for every model
    struct Fixed(OracleStatus,Option<f64>);

    impl SolveOracle for Fixed {
        fn solve(&mut self,model:&Model,_time_budget:Duration) -> OracleOutcome {
            OracleOutcome {status:self.0,objective:self.1,values:vec![0.0;model.num_vars()],work:1}
        }
    }

    #[test]
    fn test_dimension_labels() {
        for dimension in SweepDimension::ALL {
            assert_eq!(dimension.to_string().parse::<SweepDimension>().unwrap(),dimension);
            assert!(!dimension.preset().is_empty());
        }
        assert_eq!(SweepDimension::Repeaters.preset(),&[250.0,300.0,350.0,400.0,450.0]);
        assert_eq!(SweepDimension::Alpha.preset().len(),6);
        assert!(matches!("density".parse::<SweepDimension>(),Err(ConfigurationError::UnknownDimension(_))));
    }

    #[test]
    fn test_apply() {
        let base = small();
        let params = SweepDimension::Repeaters.apply(&base, 30.0).unwrap();
        assert_eq!(params.network.num_repeaters,30);
        assert_eq!(SweepDimension::Repeaters.value_of(&params),30.0);
        assert_eq!(SweepDimension::Alpha.apply(&base, 2.5).unwrap().alpha,2.5);
        assert!(matches!(SweepDimension::Clients.apply(&base, 2.5),Err(ConfigurationError::Unparsable{..})));
        assert!(matches!(SweepDimension::Clients.apply(&base, 0.0),Err(ConfigurationError::ZeroCount{..})));
        assert!(matches!(SweepDimension::RepCoeff.apply(&base, 1.2),Err(ConfigurationError::CoefficientOutOfRange{..})));
        assert!(matches!(SweepDimension::Alpha.apply(&base, 0.0),Err(ConfigurationError::InvalidAlpha{..})));
    }

    #[test]
    fn test_rows_average_runs() {
        let mut sweep = Sweep::new(Fixed(OracleStatus::Optimal,Some(10.0)), SolveConfig::default(), SweepConfig::default().with_runs(3));
        let row = sweep.run_point(&small(), 1.0).unwrap();
        assert_eq!(row.lp_objective,Some(10.0));
        assert_eq!(row.mip_objective,Some(10.0));
        assert_eq!(row.gap,Some(0.0));
        assert_eq!(row.status,SolveStatus::Optimal);
    }

    #[test]
    fn test_worst_status_wins() {
        let mut sweep = Sweep::new(Fixed(OracleStatus::TimedOut,None), SolveConfig::default(), SweepConfig::default().with_runs(2));
        let row = sweep.run_point(&small(), 1.0).unwrap();
        assert_eq!(row.status,SolveStatus::TimedOut);
        assert_eq!(row.lp_objective,None);
        assert_eq!(row.gap,None);
    }

    #[test]
    fn test_unbounded_aborts_with_point() {
        let mut sweep = Sweep::new(Fixed(OracleStatus::Unbounded,None), SolveConfig::default(), SweepConfig::default().with_runs(1));
        let mut table = ResultTable::new(Vec::new());
        let err = sweep.run(SweepDimension::Alpha, &small(), &[0.5,1.0], &mut table).unwrap_err();
        match err {
            Error::SweepPoint {value,params,..} => {
                assert_eq!(value,0.5);
                assert_eq!(params.alpha,0.5);
            }
            other => panic!("unexpected {other}"),
        }
        // nothing was appended before the failure
        assert!(table.into_inner().is_empty());
    }

    // optimal for the first `left` calls, unbounded after that
    struct Countdown {
        left:usize,
    }

    impl SolveOracle for Countdown {
        fn solve(&mut self,model:&Model,_time_budget:Duration) -> OracleOutcome {
            if self.left == 0 {
                return OracleOutcome::without_point(OracleStatus::Unbounded, 0)
            }
            self.left -= 1;
            OracleOutcome {status:OracleStatus::Optimal,objective:Some(4.0),values:vec![0.0;model.num_vars()],work:1}
        }
    }

    #[test]
    fn test_infeasible_points_keep_going() {
        let mut sweep = Sweep::new(Fixed(OracleStatus::Infeasible,None), SolveConfig::default(), SweepConfig::default().with_runs(1));
        let mut table = ResultTable::new(Vec::new());
        let rows = sweep.run(SweepDimension::Alpha, &small(), &[0.5,1.0,2.0], &mut table).unwrap();
        assert_eq!(rows.len(),3);
        assert!(rows.iter().all(|r| r.status == SolveStatus::Infeasible && r.lp_objective.is_none() && r.gap.is_none()));

        let text = String::from_utf8(table.into_inner()).unwrap();
        let lines:Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(lines.len(),3);
        for line in lines {
            let cells:Vec<&str> = line.split(',').collect();
            assert_eq!(&cells[1..4],&["","",""]);
            assert_eq!(cells[6],"infeasible");
        }
    }

    #[test]
    fn test_failure_keeps_earlier_rows() {
        // one run per point is an lp and a mip solve
        let mut sweep = Sweep::new(Countdown {left:2}, SolveConfig::default(), SweepConfig::default().with_runs(1));
        let mut table = ResultTable::new(Vec::new());
        let err = sweep.run(SweepDimension::Alpha, &small(), &[0.5,1.0,2.0], &mut table).unwrap_err();
        assert!(matches!(err,Error::SweepPoint{value,..} if value == 1.0));

        let text = String::from_utf8(table.into_inner()).unwrap();
        let lines:Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(),2);
        assert!(lines[1].starts_with("0.5,4,4,0,"),"{}",lines[1]);
    }

    #[test]
    fn test_demand_mode_reaches_models() {
        let config = SweepConfig::default().with_runs(1).with_demand_mode(DemandMode::AllOrNothing);
        let mut sweep = Sweep::new(BranchAndBound::default(), SolveConfig::default(), config);
        assert_eq!(sweep.orchestrator_mut().builder().demand_mode(),DemandMode::AllOrNothing);
        let row = sweep.run_point(&small(), 1.0).unwrap();
        let (lp,mip) = (row.lp_objective.unwrap(),row.mip_objective.unwrap());
        // counts of fully served clients
        assert!(mip <= lp + 1e-6);
        assert!(lp <= small().network.num_clients as f64 + 1e-6);
        assert_eq!(mip.fract(),0.0);
    }

    #[test]
    fn test_empty_and_zero_runs() {
        let mut sweep = Sweep::new(BranchAndBound::default(), SolveConfig::default(), SweepConfig::default().with_runs(0));
        let mut table = ResultTable::new(Vec::new());
        assert!(matches!(sweep.run(SweepDimension::Alpha, &small(), &[], &mut table),Err(Error::Configuration(ConfigurationError::EmptySweep))));
        assert!(matches!(sweep.run_point(&small(), 1.0),Err(Error::Configuration(ConfigurationError::ZeroRuns))));
    }

    #[test]
    fn test_small_alpha_sweep() {
        let mut sweep = Sweep::new(BranchAndBound::default(), SolveConfig::default(), SweepConfig::default().with_runs(2));
        let mut table = ResultTable::new(Vec::new());
        let rows = sweep.run(SweepDimension::Alpha, &small(), &[0.5,1.0,2.0], &mut table).unwrap();
        assert_eq!(rows.len(),3);
        for row in rows.iter() {
            let (lp,mip) = (row.lp_objective.unwrap(),row.mip_objective.unwrap());
            assert!(mip <= lp + 1e-6);
            assert!(row.gap.unwrap() >= -1e-9);
        }
        // lower alpha never serves less
        assert!(rows[0].lp_objective.unwrap() + 1e-6 >= rows[2].lp_objective.unwrap());
        let text = String::from_utf8(table.into_inner()).unwrap();
        assert_eq!(text.lines().count(),4);
    }

    #[test]
    fn test_scaling_fit_needs_points() {
        let row = |value:f64,mip_seconds:f64| ResultRow {
            value,lp_objective:None,mip_objective:None,gap:None,lp_seconds:0.0,mip_seconds,status:SolveStatus::Optimal,
        };
        let rows:Vec<ResultRow> = [1.0,2.0,3.0,4.0,5.0].iter().map(|&x| row(x, x*x)).collect();
        let report = scaling_fit(&rows).unwrap();
        assert!(report.r_squared > 0.999999);
        assert!(scaling_fit(&rows[..2]).is_err());
    }
}
