// dense two-phase primal simplex on a Matrix tableau
//
//   maximize c.x   subject to   A x <= b,  x >= 0
//
// rows with b < 0 are flipped into >= rows and get an artificial column,
// phase one drives the artificials out, phase two optimizes c.
// the tableau keeps the objective in its last row and the rhs in its last column

use std::time::Instant;

use super::matrix::{Matrix,Result};

// sparse row: (column, coefficient) terms and the right hand side
pub type SparseRow = (Vec<(usize,f64)>,f64);

#[derive(Clone,Debug,Default,PartialEq)]
pub struct LinearProgram {
    pub objective:Vec<f64>,
    pub rows:Vec<SparseRow>,
}

impl LinearProgram {
    pub fn new(objective:Vec<f64>) -> Self {
        Self {objective,rows:vec![]}
    }
    pub fn push_row(&mut self,terms:Vec<(usize,f64)>,rhs:f64) {
        self.rows.push((terms,rhs))
    }
    pub fn num_vars(&self) -> usize {
        self.objective.len()
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    // deadline or pivot cap hit, values hold the last basis (feasible only in phase two)
    TimedOut,
}

#[derive(Clone,Debug)]
pub struct LpSolution {
    pub status:LpStatus,
    pub objective:Option<f64>,
    pub values:Vec<f64>,
    pub pivots:u64,
}

impl LpSolution {
    fn without_point(status:LpStatus,n:usize,pivots:u64) -> Self {
        Self {status,objective:None,values:vec![0.0;n],pivots}
    }
}

const EPS:f64 = 1e-9;
const FEASIBILITY_EPS:f64 = 1e-7;
// consecutive degenerate pivots before switching to Bland's rule
const DEGENERATE_LIMIT:usize = 64;

enum Phase {
    Optimal,
    Unbounded,
    TimedOut,
}

struct Tableau {
    table:Matrix,
    basis:Vec<usize>,
    // rows without the objective row
    rows:usize,
    rhs_col:usize,
    pivots:u64,
    max_pivots:u64,
}

impl Tableau {
    fn objective_row(&self) -> usize {
        self.rows
    }

    fn entering(&self,allowed:usize,bland:bool) -> Result<Option<usize>> {
        let objective = self.table.row(self.objective_row())?;
        let mut best:Option<(usize,f64)> = None;
        for (col,reduced) in objective[..allowed].iter().enumerate() {
            if *reduced >= -EPS {continue}
            if bland {
                return Ok(Some(col))
            }
            match best {
                Some((_,value)) if value <= *reduced => {},
                _ => best = Some((col,*reduced)),
            }
        }
        Ok(best.map(|(col,_)| col))
    }

    // minimum ratio, ties go to the lowest basic variable index
    fn leaving(&self,col:usize) -> Result<Option<(usize,f64)>> {
        let mut best:Option<(usize,f64)> = None;
        for row in 0..self.rows {
            let a = self.table.get(row, col)?;
            if a <= EPS {continue}
            let ratio = self.table.get(row, self.rhs_col)?.max(0.0)/a;
            best = match best {
                None => Some((row,ratio)),
                Some((best_row,best_ratio)) => {
                    if ratio < best_ratio - 1e-12 ||
                        ((ratio - best_ratio).abs() <= 1e-12 && self.basis[row] < self.basis[best_row]) {
                        Some((row,ratio))
                    } else {
                        Some((best_row,best_ratio))
                    }
                }
            };
        }
        Ok(best)
    }

    fn pivot(&mut self,row:usize,col:usize) -> Result<()> {
        self.table.pivot(row, col)?;
        self.basis[row] = col;
        self.pivots += 1;
        Ok(())
    }

    fn iterate(&mut self,allowed:usize,deadline:Instant) -> Result<Phase> {
        let mut degenerate_streak = 0;
        loop {
            if self.pivots >= self.max_pivots || Instant::now() >= deadline {
                return Ok(Phase::TimedOut)
            }
            let bland = degenerate_streak >= DEGENERATE_LIMIT;
            let Some(col) = self.entering(allowed, bland)? else {
                return Ok(Phase::Optimal)
            };
            let Some((row,ratio)) = self.leaving(col)? else {
                return Ok(Phase::Unbounded)
            };
            if ratio <= EPS {
                degenerate_streak += 1;
            } else {
                degenerate_streak = 0;
            }
            self.pivot(row, col)?;
        }
    }

    fn values(&self,n:usize) -> Result<Vec<f64>> {
        let mut values = vec![0.0;n];
        for (row,basic) in self.basis.iter().enumerate() {
            if *basic < n {
                values[*basic] = self.table.get(row, self.rhs_col)?.max(0.0);
            }
        }
        Ok(values)
    }
}

// rows that can never bind are dropped, None means a row is violated by every x >= 0
fn presolve(lp:&LinearProgram) -> Option<Vec<SparseRow>> {
    let mut kept = Vec::with_capacity(lp.rows.len());
    for (terms,rhs) in lp.rows.iter() {
        let terms:Vec<(usize,f64)> = terms.iter().copied().filter(|(_,a)| *a != 0.0).collect();
        if terms.is_empty() {
            if *rhs < -FEASIBILITY_EPS {return None}
            continue;
        }
        // a*x_j <= b with a < 0 and b >= 0 is implied by x_j >= 0
        if terms.len() == 1 && terms[0].1 < 0.0 && *rhs >= 0.0 {
            continue;
        }
        kept.push((terms,*rhs));
    }
    Some(kept)
}

pub fn maximize(lp:&LinearProgram,deadline:Instant) -> Result<LpSolution> {
    let n = lp.num_vars();
    let Some(rows) = presolve(lp) else {
        return Ok(LpSolution::without_point(LpStatus::Infeasible, n, 0))
    };
    let m = rows.len();

    if m == 0 {
        if lp.objective.iter().any(|c| *c > EPS) {
            return Ok(LpSolution::without_point(LpStatus::Unbounded, n, 0))
        }
        return Ok(LpSolution {status:LpStatus::Optimal,objective:Some(0.0),values:vec![0.0;n],pivots:0})
    }

    let artificial_rows:Vec<usize> = (0..m).filter(|i| rows[*i].1 < 0.0).collect();
    let slack_start = n;
    let artificial_start = n + m;
    let rhs_col = artificial_start + artificial_rows.len();
    let cols = rhs_col + 1;

    let mut tableau = Tableau {
        table:Matrix::zeros(m + 1, cols),
        basis:vec![0;m],
        rows:m,
        rhs_col,
        pivots:0,
        max_pivots:(50*(m + cols)) as u64,
    };

    let mut next_artificial = artificial_start;
    for (i,(terms,rhs)) in rows.iter().enumerate() {
        // flipped rows: -a x - s + art = -b
        let sign = if *rhs < 0.0 {-1.0} else {1.0};
        for (col,a) in terms.iter() {
            *tableau.table.get_mut(i, *col)? += sign*a;
        }
        tableau.table.set(i, slack_start + i, sign)?;
        tableau.table.set(i, rhs_col, sign*rhs)?;
        if *rhs < 0.0 {
            tableau.table.set(i, next_artificial, 1.0)?;
            tableau.basis[i] = next_artificial;
            next_artificial += 1;
        } else {
            tableau.basis[i] = slack_start + i;
        }
    }

    let objective_row = tableau.objective_row();

    if !artificial_rows.is_empty() {
        // phase one: maximize -sum(artificials)
        for col in artificial_start..rhs_col {
            tableau.table.set(objective_row, col, 1.0)?;
        }
        for row in artificial_rows.iter() {
            tableau.table.row_elimination(*row, objective_row, 0, 1.0)?;
        }
        match tableau.iterate(rhs_col, deadline)? {
            Phase::TimedOut => {
                return Ok(LpSolution::without_point(LpStatus::TimedOut, n, tableau.pivots))
            },
            Phase::Unbounded | Phase::Optimal => {}
        }
        if tableau.table.get(objective_row, rhs_col)? < -FEASIBILITY_EPS {
            return Ok(LpSolution::without_point(LpStatus::Infeasible, n, tableau.pivots))
        }
        // push zero-valued artificials out of the basis where a real column can take over
        for row in 0..m {
            if tableau.basis[row] < artificial_start {continue}
            let replacement = tableau.table.row(row)?[..artificial_start].iter()
                .position(|a| a.abs() > EPS);
            if let Some(col) = replacement {
                tableau.pivot(row, col)?;
            }
        }
    }

    // phase two objective row: -c, then price out the basis
    for col in 0..cols {
        tableau.table.set(objective_row, col, 0.0)?;
    }
    for (col,c) in lp.objective.iter().enumerate() {
        tableau.table.set(objective_row, col, -c)?;
    }
    for row in 0..m {
        let basic = tableau.basis[row];
        let coef = tableau.table.get(objective_row, basic)?;
        if coef != 0.0 {
            tableau.table.row_elimination(row, objective_row, 0, coef)?;
        }
    }

    let status = match tableau.iterate(artificial_start, deadline)? {
        Phase::Optimal => LpStatus::Optimal,
        Phase::Unbounded => {
            return Ok(LpSolution::without_point(LpStatus::Unbounded, n, tableau.pivots))
        },
        Phase::TimedOut => LpStatus::TimedOut,
    };

    let values = tableau.values(n)?;
    let objective = lp.objective.iter().zip(values.iter()).map(|(c,x)| c*x).sum();
    Ok(LpSolution {status,objective:Some(objective),values,pivots:tableau.pivots})
}
