// routing model over the candidate paths of one network
//
//   max  sum_c s_c
//   s.t. sum_{p through e} x_p <= capacity_e      (every edge some path uses)
//        sum_p x_p             <= generation capacity
//        -margin_p x_p         <= 0               (per path, log-domain fidelity)
//        sum_{p of c} x_p      <= requested_c
//        s_c - sum_{p of c} x_p <= 0
//        s_c                   <= requested_c
//        x, s >= 0, x integer in the mip
//
// all-or-nothing demands swap s_c for an indicator chi_c:
//
//   max  sum_c chi_c
//   s.t. sum_{p of c} x_p = requested_c chi_c     (two rows)
//        chi_c <= 1, chi_c binary in the mip
//
// the lp and the mip are two builds of the same RoutingPlan

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::dsa::bitset::BitSet;
use crate::linear_algebra::simplex::LinearProgram;
use crate::quantum_network::{
    paths::{self, CandidatePath, PathPolicy},
    ClientId, ConfigurationError, EdgeId, FidelityModel, Network, PairCount,
};

#[derive(Error,Debug,Clone,PartialEq)]
pub enum ModelConstructionError {
    #[error("no client has a candidate path to the generator")]
    NoCandidatePaths,
    #[error("malformed network: {reason}")]
    MalformedInput{reason:String},
    #[error("oracle reported an unbounded routing model")]
    Unbounded,
}

type Result<T> = std::result::Result<T,ModelConstructionError>;

fn malformed(reason:String) -> ModelConstructionError {
    ModelConstructionError::MalformedInput { reason }
}

// fidelity row coefficient of a path that fails the exact check,
// kept well above the simplex pivot tolerance
const MIN_BINDING_MARGIN:f64 = 1e-6;

#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize,Deserialize)]
pub enum Integrality {
    Continuous,
    Integer,
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Eq,Hash,Serialize,Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandMode {
    // any part of a request counts
    #[default]
    Partial,
    // a client counts once its whole request is routed
    AllOrNothing,
}

impl DemandMode {
    pub const ALL:[DemandMode;2] = [Self::Partial,Self::AllOrNothing];

    pub fn label(&self) -> &'static str {
        match self {
            DemandMode::Partial => "partial",
            DemandMode::AllOrNothing => "all_or_nothing",
        }
    }
}

impl Display for DemandMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f,"{}",self.label())
    }
}

impl FromStr for DemandMode {
    type Err = ConfigurationError;

    fn from_str(s:&str) -> std::result::Result<Self,Self::Err> {
        Self::ALL.into_iter()
            .find(|m| m.label() == s)
            .ok_or_else(|| ConfigurationError::UnknownDemandMode(s.to_string()))
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize,Deserialize)]
pub enum VarKind {
    // pairs routed on plan path i
    Path(usize),
    // pairs counted as delivered to the client
    Satisfied(ClientId),
    // 1 when the client's whole request is routed
    Served(ClientId),
}

#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize,Deserialize)]
pub enum RowKind {
    Capacity(EdgeId),
    Generation,
    Fidelity(usize),
    AssignedDemand(ClientId),
    SatisfiedAssigned(ClientId),
    SatisfiedDemand(ClientId),
    // routed - requested*chi <= 0
    DeliveryCeiling(ClientId),
    // requested*chi - routed <= 0
    DeliveryFloor(ClientId),
    ServedBound(ClientId),
}

// terms . x <= rhs
#[derive(Clone,Debug,PartialEq)]
pub struct Row {
    pub kind:RowKind,
    pub terms:Vec<(usize,f64)>,
    pub rhs:f64,
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct PlannedPath {
    pub path:CandidatePath,
    pub composed_fidelity:f64,
    // signed log-domain slack, negative exactly when feasible is false
    pub margin:f64,
    // exact multiplicative check
    pub feasible:bool,
}

/// Candidate paths of the clients one alpha can serve at all.
/// Both model variants are built from it so they describe the same instance.
#[derive(Clone,Debug,PartialEq)]
pub struct RoutingPlan {
    paths:Vec<PlannedPath>,
    // clients with at least one feasible path, with their request
    served:Vec<(ClientId,PairCount)>,
    excluded_clients:Vec<ClientId>,
    // edges used by at least one path, in id order
    capacities:Vec<(EdgeId,PairCount)>,
    generation_capacity:PairCount,
    candidates:usize,
}

fn validate(network:&Network) -> Result<()> {
    let nodes = network.nodes().len();
    for edge in network.edges() {
        if edge.from.0 >= nodes || edge.to.0 >= nodes {
            return Err(malformed(format!("edge {} references a node outside 0..{nodes}",edge.id.0)))
        }
        if !(edge.fidelity > 0.0 && edge.fidelity <= 1.0) {
            return Err(malformed(format!("edge {} has fidelity {}",edge.id.0,edge.fidelity)))
        }
    }
    let mut seen = vec![false;network.num_clients()];
    for demand in network.demands() {
        let Some(slot) = seen.get_mut(demand.client.0) else {
            return Err(malformed(format!("demand for unknown client {}",demand.client.0)))
        };
        if *slot {
            return Err(malformed(format!("client {} has more than one demand",demand.client.0)))
        }
        *slot = true;
        if demand.requested_pairs == 0 {
            return Err(malformed(format!("client {} requests zero pairs",demand.client.0)))
        }
        if !(demand.min_fidelity > 0.0 && demand.min_fidelity <= 1.0) {
            return Err(malformed(format!("client {} has minimum fidelity {}",demand.client.0,demand.min_fidelity)))
        }
    }
    if let Some(client) = seen.iter().position(|s| !s) {
        return Err(malformed(format!("client {client} has no demand")))
    }
    Ok(())
}

impl RoutingPlan {
    pub fn new(network:&Network,fidelity:&FidelityModel,policy:&PathPolicy) -> Result<Self> {
        validate(network)?;
        let candidates = paths::enumerate(network, policy);
        if candidates.is_empty() {
            return Err(ModelConstructionError::NoCandidatePaths)
        }
        let candidate_count = candidates.len();

        let mut scored = Vec::with_capacity(candidates.len());
        let mut disagreements = 0;
        for path in candidates {
            let Some(demand) = network.demand(path.client) else {continue};
            let feasible = fidelity.is_feasible(&path.fidelities, demand.min_fidelity);
            let composed_fidelity = fidelity.composed_fidelity(&path.fidelities);
            let linear = fidelity.linear_margin(&path.fidelities, demand.min_fidelity);
            if feasible != (linear >= 0.0) {
                disagreements += 1;
            }
            // the exact check decides the sign at the boundary
            let margin = if feasible {linear.max(0.0)} else {linear.min(-MIN_BINDING_MARGIN)};
            scored.push(PlannedPath {path,composed_fidelity,margin,feasible});
        }

        let mut served = vec![];
        let mut excluded_clients = vec![];
        for demand in network.demands() {
            if scored.iter().any(|p| p.feasible && p.path.client == demand.client) {
                served.push((demand.client,demand.requested_pairs));
            } else {
                excluded_clients.push(demand.client);
            }
        }
        served.sort();
        excluded_clients.sort();

        let planned:Vec<PlannedPath> = scored.into_iter()
            .filter(|p| excluded_clients.binary_search(&p.path.client).is_err())
            .collect();

        let mut used = vec![false;network.edges().len()];
        for p in planned.iter() {
            for e in p.path.edges.iter() {
                used[e.0] = true;
            }
        }
        let capacities = network.edges().iter()
            .filter(|e| used[e.id.0])
            .map(|e| (e.id,e.capacity))
            .collect();

        debug!(
            candidates = candidate_count,
            planned = planned.len(),
            feasible = planned.iter().filter(|p| p.feasible).count(),
            boundary_disagreements = disagreements,
            alpha = fidelity.alpha(),
            excluded = excluded_clients.len(),
            "routing plan ready"
        );

        Ok(Self {
            paths:planned,
            served,
            excluded_clients,
            capacities,
            generation_capacity:network.generation_capacity(),
            candidates:candidate_count,
        })
    }

    pub fn paths(&self) -> &[PlannedPath] {
        &self.paths
    }
    pub fn feasible_paths(&self) -> usize {
        self.paths.iter().filter(|p| p.feasible).count()
    }
    pub fn excluded_clients(&self) -> &[ClientId] {
        &self.excluded_clients
    }
    pub fn candidate_count(&self) -> usize {
        self.candidates
    }

    pub fn model(&self,integrality:Integrality,mode:DemandMode) -> Model {
        let path_count = self.paths.len();
        let mut vars:Vec<VarKind> = (0..path_count).map(VarKind::Path).collect();
        vars.extend(self.served.iter().map(|(c,_)| match mode {
            DemandMode::Partial => VarKind::Satisfied(*c),
            DemandMode::AllOrNothing => VarKind::Served(*c),
        }));

        let mut objective = vec![0.0;path_count];
        objective.extend(std::iter::repeat_n(1.0, self.served.len()));

        let integer = vars.iter().map(|v| {
            integrality == Integrality::Integer && matches!(v,VarKind::Path(_) | VarKind::Served(_))
        }).collect();

        let mut rows = Vec::with_capacity(self.capacities.len() + 1 + path_count + 3*self.served.len());

        for (edge,capacity) in self.capacities.iter() {
            let terms = self.paths.iter().enumerate()
                .filter(|(_,p)| p.path.edges.contains(edge))
                .map(|(i,_)| (i,1.0))
                .collect();
            rows.push(Row {kind:RowKind::Capacity(*edge),terms,rhs:*capacity as f64});
        }

        rows.push(Row {
            kind:RowKind::Generation,
            terms:(0..path_count).map(|i| (i,1.0)).collect(),
            rhs:self.generation_capacity as f64,
        });

        for (i,p) in self.paths.iter().enumerate() {
            rows.push(Row {kind:RowKind::Fidelity(i),terms:vec![(i,-p.margin)],rhs:0.0});
        }

        for (k,(client,requested)) in self.served.iter().enumerate() {
            let own = path_count + k;
            let requested = *requested as f64;
            let assigned:Vec<(usize,f64)> = self.paths.iter().enumerate()
                .filter(|(_,p)| p.path.client == *client)
                .map(|(i,_)| (i,1.0))
                .collect();

            match mode {
                DemandMode::Partial => {
                    rows.push(Row {kind:RowKind::AssignedDemand(*client),terms:assigned.clone(),rhs:requested});

                    let mut linked = vec![(own,1.0)];
                    linked.extend(assigned.into_iter().map(|(i,a)| (i,-a)));
                    rows.push(Row {kind:RowKind::SatisfiedAssigned(*client),terms:linked,rhs:0.0});

                    rows.push(Row {kind:RowKind::SatisfiedDemand(*client),terms:vec![(own,1.0)],rhs:requested});
                }
                DemandMode::AllOrNothing => {
                    let mut ceiling = assigned.clone();
                    ceiling.push((own,-requested));
                    rows.push(Row {kind:RowKind::DeliveryCeiling(*client),terms:ceiling,rhs:0.0});

                    let mut floor:Vec<(usize,f64)> = assigned.into_iter().map(|(i,a)| (i,-a)).collect();
                    floor.push((own,requested));
                    rows.push(Row {kind:RowKind::DeliveryFloor(*client),terms:floor,rhs:0.0});

                    rows.push(Row {kind:RowKind::ServedBound(*client),terms:vec![(own,1.0)],rhs:1.0});
                }
            }
        }

        let model = Model {
            integrality,
            demand_mode:mode,
            vars,
            objective,
            rows,
            integer,
            excluded_clients:self.excluded_clients.clone(),
        };
        debug_assert_eq!(model.integer.len(),model.vars.len());
        debug!(?integrality,%mode,vars = model.num_vars(),integer = model.integer.count_ones(),rows = model.num_rows(),"model built");
        model
    }
}

#[derive(Clone,Debug)]
pub struct Model {
    integrality:Integrality,
    demand_mode:DemandMode,
    vars:Vec<VarKind>,
    objective:Vec<f64>,
    rows:Vec<Row>,
    integer:BitSet,
    excluded_clients:Vec<ClientId>,
}

impl Model {
    pub fn integrality(&self) -> Integrality {
        self.integrality
    }
    pub fn demand_mode(&self) -> DemandMode {
        self.demand_mode
    }
    pub fn objective(&self) -> &[f64] {
        &self.objective
    }
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
    pub fn vars(&self) -> &[VarKind] {
        &self.vars
    }
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
    pub fn is_integer(&self,var:usize) -> bool {
        self.integer.get_at(var).unwrap_or(false)
    }
    pub fn integer_vars(&self) -> impl Iterator<Item = usize> + '_ {
        self.integer.iter_ones()
    }
    pub fn excluded_clients(&self) -> &[ClientId] {
        &self.excluded_clients
    }

    // retry model: no fidelity rows, every rhs loosened by tolerance
    pub fn relaxed(&self,tolerance:f64) -> Model {
        let rows = self.rows.iter()
            .filter(|r| !matches!(r.kind,RowKind::Fidelity(_)))
            .map(|r| Row {kind:r.kind,terms:r.terms.clone(),rhs:r.rhs + tolerance})
            .collect();
        Model {rows,..self.clone()}
    }

    pub fn evaluate(&self,values:&[f64]) -> f64 {
        self.objective.iter().zip(values).map(|(c,x)| c*x).sum()
    }

    pub fn is_feasible(&self,values:&[f64],tolerance:f64) -> bool {
        if values.len() != self.num_vars() || values.iter().any(|x| *x < -tolerance) {
            return false
        }
        if self.integer_vars().any(|j| (values[j] - values[j].round()).abs() > tolerance) {
            return false
        }
        self.rows.iter().all(|r| {
            let lhs:f64 = r.terms.iter().map(|(j,a)| a*values[*j]).sum();
            lhs <= r.rhs + tolerance
        })
    }

    // hand-written rows, one path variable per objective entry
    #[cfg(test)]
    pub(crate) fn from_rows(objective:Vec<f64>,rows:Vec<Row>,integrality:Integrality) -> Model {
        let vars = (0..objective.len()).map(VarKind::Path).collect();
        let integer = (0..objective.len()).map(|_| integrality == Integrality::Integer).collect();
        Model {integrality,demand_mode:DemandMode::Partial,vars,objective,rows,integer,excluded_clients:vec![]}
    }

    pub(crate) fn linear_program(&self) -> LinearProgram {
        let mut lp = LinearProgram::new(self.objective.clone());
        for row in self.rows.iter() {
            lp.push_row(row.terms.clone(), row.rhs);
        }
        lp
    }
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Eq)]
pub struct ModelBuilder {
    policy:PathPolicy,
    demand_mode:DemandMode,
}

impl ModelBuilder {
    pub fn new(policy:PathPolicy) -> Self {
        Self {policy,demand_mode:DemandMode::default()}
    }
    pub fn with_demand_mode(mut self,demand_mode:DemandMode) -> Self {
        self.demand_mode = demand_mode;
        self
    }
    pub fn policy(&self) -> &PathPolicy {
        &self.policy
    }
    pub fn demand_mode(&self) -> DemandMode {
        self.demand_mode
    }
    pub fn plan(&self,network:&Network,fidelity:&FidelityModel) -> Result<RoutingPlan> {
        RoutingPlan::new(network, fidelity, &self.policy)
    }
    pub fn build(&self,network:&Network,fidelity:&FidelityModel,integrality:Integrality) -> Result<Model> {
        Ok(self.plan(network, fidelity)?.model(integrality, self.demand_mode))
    }
    // (lp, mip) over one plan
    pub fn build_pair(&self,network:&Network,fidelity:&FidelityModel) -> Result<(Model,Model)> {
        let plan = self.plan(network, fidelity)?;
        Ok((plan.model(Integrality::Continuous, self.demand_mode),plan.model(Integrality::Integer, self.demand_mode)))
    }
}
