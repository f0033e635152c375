// random hierarchical topology: generator -> repeaters -> clients,
// plus virtual relay links between repeaters.
// every random draw goes through the injected rng, in a fixed order, so a seed fixes the network

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ClientId, ConfigurationError, Demand, EdgeKind, Fidelity, Network, PairCount};

type Result<T> = std::result::Result<T,ConfigurationError>;

#[derive(Clone,Copy,Debug,PartialEq,Serialize,Deserialize)]
pub struct NetworkParams {
    pub num_clients:usize,
    pub num_repeaters:usize,
    // probability of a repeater -> repeater relay link, per ordered pair
    pub rep_coeff:f64,
    // probability of a generator -> repeater feed link, per repeater
    pub gen_coeff:f64,
    // probability of a repeater -> client access link, per pair
    pub client_coeff:f64,
    pub mean_capacity:f64,
    pub mean_demand:f64,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            num_clients:20,
            num_repeaters:300,
            rep_coeff:0.05,
            gen_coeff:0.25,
            client_coeff:0.2,
            mean_capacity:10.0,
            mean_demand:7.0,
        }
    }
}

impl NetworkParams {
    pub fn with_num_clients(mut self,num_clients:usize) -> Self {
        self.num_clients = num_clients;
        self
    }
    pub fn with_num_repeaters(mut self,num_repeaters:usize) -> Self {
        self.num_repeaters = num_repeaters;
        self
    }
    pub fn with_rep_coeff(mut self,rep_coeff:f64) -> Self {
        self.rep_coeff = rep_coeff;
        self
    }
    pub fn with_gen_coeff(mut self,gen_coeff:f64) -> Self {
        self.gen_coeff = gen_coeff;
        self
    }
    pub fn with_client_coeff(mut self,client_coeff:f64) -> Self {
        self.client_coeff = client_coeff;
        self
    }
    pub fn with_mean_capacity(mut self,mean_capacity:f64) -> Self {
        self.mean_capacity = mean_capacity;
        self
    }
    pub fn with_mean_demand(mut self,mean_demand:f64) -> Self {
        self.mean_demand = mean_demand;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_clients == 0 {
            return Err(ConfigurationError::ZeroCount { field: "num_clients" })
        }
        if self.num_repeaters == 0 {
            return Err(ConfigurationError::ZeroCount { field: "num_repeaters" })
        }
        for (field,value) in [("rep_coeff",self.rep_coeff),("gen_coeff",self.gen_coeff),("client_coeff",self.client_coeff)] {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(ConfigurationError::CoefficientOutOfRange { field, value })
            }
        }
        for (field,value) in [("mean_capacity",self.mean_capacity),("mean_demand",self.mean_demand)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigurationError::NonPositiveMean { field, value })
            }
        }
        Ok(())
    }

    // total pairs the generator emits per unit time
    pub fn generation_capacity(&self) -> PairCount {
        let expected = self.gen_coeff*self.num_repeaters as f64*self.mean_capacity;
        expected.ceil().min(PairCount::MAX as f64) as PairCount
    }
}

/// Uniform ranges the per-edge fidelity coefficients and the per-client
/// minimum fidelity are drawn from.
#[derive(Clone,Copy,Debug,PartialEq,Serialize,Deserialize)]
pub struct FidelityProfile {
    pub feed:(Fidelity,Fidelity),
    pub relay:(Fidelity,Fidelity),
    pub access:(Fidelity,Fidelity),
    pub demand:(Fidelity,Fidelity),
}

impl Default for FidelityProfile {
    fn default() -> Self {
        Self {
            feed:(0.95,1.0),
            relay:(0.90,0.99),
            access:(0.90,0.99),
            demand:(0.70,0.90),
        }
    }
}

impl FidelityProfile {
    pub fn with_range(mut self,kind:EdgeKind,low:Fidelity,high:Fidelity) -> Self {
        match kind {
            EdgeKind::Feed => self.feed = (low,high),
            EdgeKind::Relay => self.relay = (low,high),
            EdgeKind::Access => self.access = (low,high),
        }
        self
    }
    pub fn with_demand_range(mut self,low:Fidelity,high:Fidelity) -> Self {
        self.demand = (low,high);
        self
    }
    pub fn range(&self,kind:EdgeKind) -> (Fidelity,Fidelity) {
        match kind {
            EdgeKind::Feed => self.feed,
            EdgeKind::Relay => self.relay,
            EdgeKind::Access => self.access,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ranges = [("feed",self.feed),("relay",self.relay),("access",self.access),("demand",self.demand)];
        for (field,(low,high)) in ranges {
            // NaN fails every comparison, so it lands here too
            if !(low > 0.0 && low <= high && high <= 1.0) {
                return Err(ConfigurationError::InvalidFidelityRange { field, low, high })
            }
        }
        Ok(())
    }
}

// draws shared by every link
struct LinkSampler {
    capacity:Normal<f64>,
}

impl LinkSampler {
    fn new(mean_capacity:f64) -> Result<Self> {
        let capacity = Normal::new(mean_capacity, mean_capacity/2.0)
            .map_err(|_| ConfigurationError::NonPositiveMean { field: "mean_capacity", value: mean_capacity })?;
        Ok(Self {capacity})
    }
    // None when the drawn capacity is not positive, the link is then dropped
    fn capacity<R:Rng + ?Sized>(&self,rng:&mut R) -> Option<PairCount> {
        let draw = self.capacity.sample(rng).ceil();
        if draw <= 0.0 {
            return None
        }
        Some(draw.min(PairCount::MAX as f64) as PairCount)
    }
}

fn uniform<R:Rng + ?Sized>(rng:&mut R,(low,high):(Fidelity,Fidelity)) -> Fidelity {
    rng.random_range(low..=high)
}

/// Generates a network from an injected random source.
pub fn generate<R:Rng + ?Sized>(params:&NetworkParams,profile:&FidelityProfile,rng:&mut R) -> Result<Network> {
    params.validate()?;
    profile.validate()?;

    let sampler = LinkSampler::new(params.mean_capacity)?;
    let demand = Exp::new(1.0/params.mean_demand)
        .map_err(|_| ConfigurationError::NonPositiveMean { field: "mean_demand", value: params.mean_demand })?;

    let (repeaters,clients) = (params.num_repeaters,params.num_clients);
    let mut network = Network::new(repeaters, clients, params.generation_capacity());

    for r in 0..repeaters {
        if !rng.random_bool(params.gen_coeff) {continue}
        if let Some(capacity) = sampler.capacity(rng) {
            let fidelity = uniform(rng, profile.feed);
            network.add_feed(r, capacity, fidelity);
        }
    }

    for from in 0..repeaters {
        for to in 0..repeaters {
            if from == to {continue}
            if !rng.random_bool(params.rep_coeff) {continue}
            if let Some(capacity) = sampler.capacity(rng) {
                let fidelity = uniform(rng, profile.relay);
                network.add_relay(from, to, capacity, fidelity);
            }
        }
    }

    let mut fallbacks = 0;
    for c in 0..clients {
        let client = ClientId(c);
        let mut attached = false;
        for r in 0..repeaters {
            if !rng.random_bool(params.client_coeff) {continue}
            if let Some(capacity) = sampler.capacity(rng) {
                let fidelity = uniform(rng, profile.access);
                network.add_access(r, client, capacity, fidelity);
                attached = true;
            }
        }
        if !attached {
            // round robin, so an unlucky client still has a way in
            let capacity = sampler.capacity(rng).unwrap_or(1).max(1);
            let fidelity = uniform(rng, profile.access);
            network.add_access(c % repeaters, client, capacity, fidelity);
            fallbacks += 1;
        }
    }

    for c in 0..clients {
        let requested = (1.0 + demand.sample(rng)).ceil().min(PairCount::MAX as f64) as PairCount;
        let min_fidelity = uniform(rng, profile.demand);
        network.add_demand(Demand {client:ClientId(c),requested_pairs:requested,min_fidelity});
    }

    debug!(
        repeaters,
        clients,
        feeds = network.edges_of_kind(EdgeKind::Feed).count(),
        relays = network.edges_of_kind(EdgeKind::Relay).count(),
        access = network.edges_of_kind(EdgeKind::Access).count(),
        fallbacks,
        generation_capacity = network.generation_capacity(),
        "generated network"
    );
    Ok(network)
}

pub fn generate_seeded(params:&NetworkParams,profile:&FidelityProfile,seed:u64) -> Result<Network> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    generate(params, profile, &mut rng)
}

#[cfg(test)]
mod tests {
    use super::{generate_seeded, FidelityProfile, NetworkParams};
    use crate::quantum_network::{ConfigurationError, EdgeKind, Tier};

    fn small() -> NetworkParams {
        NetworkParams::default()
            .with_num_clients(6)
            .with_num_repeaters(30)
            .with_rep_coeff(0.1)
            .with_gen_coeff(0.5)
            .with_client_coeff(0.2)
    }

    #[test]
    fn test_generated_values_in_range() {
        let profile = FidelityProfile::default();
        for seed in 0..20 {
            let network = generate_seeded(&small(), &profile, seed).unwrap();
            for edge in network.edges() {
                assert!(edge.capacity >= 1,"capacity {} on {:?}",edge.capacity,edge.id);
                let (low,high) = profile.range(edge.kind);
                assert!(edge.fidelity >= low && edge.fidelity <= high);
                assert!(edge.fidelity > 0.0 && edge.fidelity <= 1.0);
            }
            assert_eq!(network.demands().len(),6);
            for demand in network.demands() {
                assert!(demand.requested_pairs >= 1);
                assert!(demand.min_fidelity >= 0.7 && demand.min_fidelity <= 0.9);
            }
        }
    }

    #[test]
    fn test_every_client_has_access() {
        // sparse enough that the fallback kicks in for some clients
        let params = small().with_client_coeff(0.01);
        let network = generate_seeded(&params, &FidelityProfile::default(), 3).unwrap();
        let graph = network.topology();
        for node in network.nodes() {
            if let Tier::Client(_) = node.tier {
                assert!(graph.in_degree(node.id.0) >= 1);
            }
        }
    }

    #[test]
    fn test_edge_endpoints_follow_kind() {
        let network = generate_seeded(&small(), &FidelityProfile::default(), 11).unwrap();
        let tier = |id:usize| network.nodes()[id].tier;
        for (i,edge) in network.edges().iter().enumerate() {
            assert_eq!(edge.id.0,i);
            match edge.kind {
                EdgeKind::Feed => {
                    assert_eq!(tier(edge.from.0),Tier::Generator);
                    assert!(matches!(tier(edge.to.0),Tier::Repeater(_)));
                }
                EdgeKind::Relay => {
                    assert!(matches!(tier(edge.from.0),Tier::Repeater(_)));
                    assert!(matches!(tier(edge.to.0),Tier::Repeater(_)));
                    assert_ne!(edge.from,edge.to);
                }
                EdgeKind::Access => {
                    assert!(matches!(tier(edge.from.0),Tier::Repeater(_)));
                    assert!(matches!(tier(edge.to.0),Tier::Client(_)));
                }
            }
        }
    }

    #[test]
    fn test_same_seed_same_network() {
        let profile = FidelityProfile::default();
        let a = generate_seeded(&small(), &profile, 42).unwrap();
        let b = generate_seeded(&small(), &profile, 42).unwrap();
        let c = generate_seeded(&small(), &profile, 43).unwrap();
        assert_eq!(a,b);
        assert_ne!(a,c);
    }

    #[test]
    fn test_generation_capacity() {
        assert_eq!(NetworkParams::default().generation_capacity(),750);
        let network = generate_seeded(&NetworkParams::default().with_num_repeaters(40), &FidelityProfile::default(), 0).unwrap();
        assert_eq!(network.generation_capacity(),100);
    }

    #[test]
    fn test_rejects_bad_params() {
        let profile = FidelityProfile::default();
        let zero = NetworkParams::default().with_num_clients(0);
        assert!(matches!(generate_seeded(&zero, &profile, 0),Err(ConfigurationError::ZeroCount{field:"num_clients"})));
        let coeff = NetworkParams::default().with_rep_coeff(1.5);
        assert!(matches!(generate_seeded(&coeff, &profile, 0),Err(ConfigurationError::CoefficientOutOfRange{..})));
        let mean = NetworkParams::default().with_mean_demand(f64::NAN);
        assert!(matches!(generate_seeded(&mean, &profile, 0),Err(ConfigurationError::NonPositiveMean{..})));
        let bad_profile = profile.with_range(EdgeKind::Relay, 0.0, 0.9);
        assert!(matches!(generate_seeded(&small(), &bad_profile, 0),Err(ConfigurationError::InvalidFidelityRange{..})));
    }
}
