use serde::{Deserialize, Serialize};

use super::{ConfigurationError, Fidelity, Network, paths::CandidatePath};

// fidelity composes multiplicatively along a path, f_path = prod f_e^alpha.
// taking -ln turns that into additive per-edge costs, which is the only
// form the model builder ever sees
#[derive(Clone,Copy,Debug,PartialEq,Serialize,Deserialize)]
pub struct FidelityModel {
    alpha:f64,
}

// slack for the exact check, matches the boundary agreement with the linear form
const BOUNDARY_EPS:f64 = 1e-12;

impl FidelityModel {
    pub fn new(alpha:f64) -> Result<Self,ConfigurationError> {
        if !alpha.is_finite() || alpha <= 0.0 {
            return Err(ConfigurationError::InvalidAlpha { value: alpha })
        }
        Ok(Self {alpha})
    }
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn edge_cost(&self,fidelity:Fidelity) -> f64 {
        debug_assert!(fidelity > 0.0 && fidelity <= 1.0);
        -self.alpha*fidelity.ln()
    }
    pub fn path_cost(&self,fidelities:&[Fidelity]) -> f64 {
        fidelities.iter().map(|&f| self.edge_cost(f)).sum()
    }
    pub fn threshold_budget(min_fidelity:Fidelity) -> f64 {
        -min_fidelity.ln()
    }

    pub fn composed_fidelity(&self,fidelities:&[Fidelity]) -> Fidelity {
        fidelities.iter().map(|f| f.powf(self.alpha)).product()
    }
    // exact multiplicative check
    pub fn is_feasible(&self,fidelities:&[Fidelity],min_fidelity:Fidelity) -> bool {
        self.composed_fidelity(fidelities) >= min_fidelity*(1.0 - BOUNDARY_EPS)
    }
    // budget left over in the log domain, >= 0 iff the path meets the minimum
    pub fn linear_margin(&self,fidelities:&[Fidelity],min_fidelity:Fidelity) -> f64 {
        Self::threshold_budget(min_fidelity) - self.path_cost(fidelities)
    }

    /// Share of candidate paths whose client minimum is met under this alpha.
    /// Paths whose client has no demand count as infeasible.
    pub fn feasible_fraction(&self,network:&Network,paths:&[CandidatePath]) -> f64 {
        if paths.is_empty() {
            return 0.0
        }
        let feasible = paths.iter().filter(|p| {
            network.demand(p.client)
                .is_some_and(|d| self.is_feasible(&p.fidelities, d.min_fidelity))
        }).count();
        feasible as f64/paths.len() as f64
    }
}
