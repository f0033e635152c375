use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::model::Model;

#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize,Deserialize)]
pub enum OracleStatus {
    Optimal,
    Infeasible,
    Unbounded,
    // budget ran out, objective and values hold the incumbent if there is one
    TimedOut,
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct OracleOutcome {
    pub status:OracleStatus,
    pub objective:Option<f64>,
    // one entry per model variable, empty without an incumbent
    pub values:Vec<f64>,
    // solver effort in oracle-specific units
    pub work:u64,
}

impl OracleOutcome {
    pub fn without_point(status:OracleStatus,work:u64) -> Self {
        Self {status,objective:None,values:vec![],work}
    }
}

/// Anything that can optimize a routing model within a time budget.
///
/// The engine never looks past this seam, so a native solver binding
/// and the bundled branch and bound are interchangeable.
pub trait SolveOracle {
    fn solve(&mut self,model:&Model,time_budget:Duration) -> OracleOutcome;
}

impl<O:SolveOracle + ?Sized> SolveOracle for &mut O {
    fn solve(&mut self,model:&Model,time_budget:Duration) -> OracleOutcome {
        (**self).solve(model, time_budget)
    }
}

impl<O:SolveOracle + ?Sized> SolveOracle for Box<O> {
    fn solve(&mut self,model:&Model,time_budget:Duration) -> OracleOutcome {
        (**self).solve(model, time_budget)
    }
}
