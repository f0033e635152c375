// reference oracle: depth first branch and bound over the dense simplex.
// every node re-solves the root lp plus its branching rows from scratch

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::linear_algebra::simplex::{self, LinearProgram, LpStatus};

use super::model::Model;
use super::oracle::{OracleOutcome, OracleStatus, SolveOracle};

#[derive(Clone,Copy,Debug,PartialEq,Serialize,Deserialize)]
pub struct BranchAndBoundOptions {
    // nodes solved before giving up with the incumbent
    pub max_nodes:usize,
    // distance from an integer still counted as integral
    pub int_tol:f64,
    // relative slack under which a node cannot beat the incumbent
    pub gap_tol:f64,
}

impl Default for BranchAndBoundOptions {
    fn default() -> Self {
        Self {max_nodes:10_000,int_tol:1e-6,gap_tol:1e-9}
    }
}

impl BranchAndBoundOptions {
    pub fn with_max_nodes(mut self,max_nodes:usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }
    pub fn with_int_tol(mut self,int_tol:f64) -> Self {
        self.int_tol = int_tol;
        self
    }
    pub fn with_gap_tol(mut self,gap_tol:f64) -> Self {
        self.gap_tol = gap_tol;
        self
    }
}

// x_var <= value when upper, x_var >= value otherwise
#[derive(Clone,Copy,Debug)]
struct Bound {
    var:usize,
    upper:bool,
    value:f64,
}

struct Incumbent {
    objective:f64,
    values:Vec<f64>,
}

#[derive(Clone,Debug,Default)]
pub struct BranchAndBound {
    options:BranchAndBoundOptions,
}

impl BranchAndBound {
    pub fn new(options:BranchAndBoundOptions) -> Self {
        Self {options}
    }
    pub fn options(&self) -> &BranchAndBoundOptions {
        &self.options
    }

    // most fractional integer column, lowest index on ties
    fn branching_var(&self,model:&Model,values:&[f64]) -> Option<(usize,f64)> {
        let mut best:Option<(usize,f64,f64)> = None;
        for var in model.integer_vars() {
            let value = values[var];
            let distance = (value - value.floor()).min(value.ceil() - value);
            if distance <= self.options.int_tol {continue}
            if best.is_none_or(|(_,_,d)| distance > d) {
                best = Some((var,value,distance));
            }
        }
        best.map(|(var,value,_)| (var,value))
    }

    fn cannot_improve(&self,bound:f64,incumbent:&Option<Incumbent>) -> bool {
        match incumbent {
            Some(inc) => bound <= inc.objective + self.options.gap_tol*inc.objective.abs().max(1.0),
            None => false,
        }
    }
}

fn with_bounds(root:&LinearProgram,bounds:&[Bound]) -> LinearProgram {
    let mut lp = root.clone();
    for b in bounds {
        if b.upper {
            lp.push_row(vec![(b.var,1.0)], b.value);
        } else {
            lp.push_row(vec![(b.var,-1.0)], -b.value);
        }
    }
    lp
}

impl SolveOracle for BranchAndBound {
    fn solve(&mut self,model:&Model,time_budget:Duration) -> OracleOutcome {
        let start = Instant::now();
        let deadline = start.checked_add(time_budget)
            .unwrap_or(start + Duration::from_secs(365*24*3600));
        let root = model.linear_program();

        let mut work = 0u64;
        let mut nodes = 0usize;
        let mut timed_out = false;
        // a subtree was dropped, the incumbent is no longer proven optimal
        let mut abandoned = false;
        let mut incumbent:Option<Incumbent> = None;
        let mut stack:Vec<Vec<Bound>> = vec![vec![]];

        while let Some(bounds) = stack.pop() {
            if nodes >= self.options.max_nodes || Instant::now() >= deadline {
                timed_out = true;
                break;
            }
            nodes += 1;

            let lp = with_bounds(&root, &bounds);
            let solution = match simplex::maximize(&lp, deadline) {
                Ok(solution) => solution,
                Err(err) => {
                    // numerical breakdown, this subtree is given up
                    error!(%err,depth = bounds.len(),"node relaxation failed");
                    abandoned = true;
                    continue;
                }
            };
            work += solution.pivots;

            match solution.status {
                LpStatus::Infeasible => continue,
                LpStatus::Unbounded => {
                    return OracleOutcome::without_point(OracleStatus::Unbounded, work)
                },
                LpStatus::Optimal | LpStatus::TimedOut => {}
            }
            let Some(bound) = solution.objective else {
                timed_out = true;
                break;
            };
            let node_timed_out = solution.status == LpStatus::TimedOut;

            if self.cannot_improve(bound, &incumbent) {
                if node_timed_out {timed_out = true; break}
                continue;
            }

            match self.branching_var(model, &solution.values) {
                None => {
                    let mut values = solution.values;
                    for var in model.integer_vars() {
                        values[var] = values[var].round();
                    }
                    let objective = model.evaluate(&values);
                    if incumbent.as_ref().is_none_or(|inc| objective > inc.objective) {
                        incumbent = Some(Incumbent {objective,values});
                    }
                }
                Some((var,value)) if !node_timed_out => {
                    let mut down = bounds.clone();
                    down.push(Bound {var,upper:true,value:value.floor()});
                    let mut up = bounds;
                    up.push(Bound {var,upper:false,value:value.ceil()});
                    // up branch is explored first
                    stack.push(down);
                    stack.push(up);
                }
                Some(_) => {}
            }
            if node_timed_out {
                timed_out = true;
                break;
            }
        }

        debug!(nodes,work,timed_out,abandoned,elapsed = ?start.elapsed(),"branch and bound finished");

        let status = match (&incumbent,timed_out || abandoned) {
            (_,true) => OracleStatus::TimedOut,
            (Some(_),false) => OracleStatus::Optimal,
            (None,false) => OracleStatus::Infeasible,
        };
        match incumbent {
            Some(inc) => OracleOutcome {status,objective:Some(inc.objective),values:inc.values,work},
            None => OracleOutcome::without_point(status, work),
        }
    }
}
