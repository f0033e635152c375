// hierarchical quantum network: one entangled-pair generator feeding repeaters,
// repeaters serving clients. pairs lose fidelity multiplicatively on every hop

pub mod fidelity;
pub mod generator;
pub mod paths;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dsa::graph::DirectedGraph;

pub use fidelity::FidelityModel;
pub use generator::{generate, generate_seeded, FidelityProfile, NetworkParams};
pub use paths::{CandidatePath, PathPolicy};

// pairs per unit time
pub type PairCount = u32;
// in (0,1]
pub type Fidelity = f64;

#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash,Serialize,Deserialize)]
pub struct NodeId(pub usize);

#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash,Serialize,Deserialize)]
pub struct EdgeId(pub usize);

// client index, 0..num_clients
#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash,Serialize,Deserialize)]
pub struct ClientId(pub usize);

#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash,Serialize,Deserialize)]
pub enum Tier {
    Generator,
    Repeater(usize),
    Client(usize),
}

#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize,Deserialize)]
pub struct Node {
    pub id:NodeId,
    pub tier:Tier,
}

#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash,Serialize,Deserialize)]
pub enum EdgeKind {
    // generator -> repeater
    Feed,
    // repeater -> repeater, the virtual shortcut between non-adjacent tiers
    Relay,
    // repeater -> client
    Access,
}

#[derive(Clone,Copy,Debug,PartialEq,Serialize,Deserialize)]
pub struct Edge {
    pub id:EdgeId,
    pub from:NodeId,
    pub to:NodeId,
    pub kind:EdgeKind,
    pub capacity:PairCount,
    pub fidelity:Fidelity,
}

#[derive(Clone,Copy,Debug,PartialEq,Serialize,Deserialize)]
pub struct Demand {
    pub client:ClientId,
    pub requested_pairs:PairCount,
    pub min_fidelity:Fidelity,
}

/// Raised before any model is built or solved when sweep or network parameters are unusable.
#[derive(Error,Debug)]
pub enum ConfigurationError {
    #[error("{field} must be positive, got 0")]
    ZeroCount{field:&'static str},
    #[error("{field} must lie in (0,1], got {value}")]
    CoefficientOutOfRange{field:&'static str,value:f64},
    #[error("{field} must be positive and finite, got {value}")]
    NonPositiveMean{field:&'static str,value:f64},
    #[error("alpha must be positive and finite, got {value}")]
    InvalidAlpha{value:f64},
    #[error("fidelity range {field} = [{low},{high}] must satisfy 0 < low <= high <= 1")]
    InvalidFidelityRange{field:&'static str,low:f64,high:f64},
    #[error("parameter line is missing field {field}")]
    MissingField{field:&'static str},
    #[error("parameter line has {count} unexpected trailing field(s)")]
    TrailingFields{count:usize},
    #[error("cannot parse {field} from {value:?}")]
    Unparsable{field:&'static str,value:String},
    #[error("cannot read parameter file {path}")]
    ParameterFile{path:String,#[source] source:std::io::Error},
    #[error("unknown sweep dimension {0:?}, expected clients, repeaters, rep_coeff or alpha")]
    UnknownDimension(String),
    #[error("unknown demand mode {0:?}, expected partial or all_or_nothing")]
    UnknownDemandMode(String),
    #[error("sweep has no values")]
    EmptySweep,
    #[error("runs per sweep point must be positive")]
    ZeroRuns,
}

// node ids: generator is 0, repeaters are 1..=R, clients follow
#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct Network {
    num_repeaters:usize,
    num_clients:usize,
    generation_capacity:PairCount,
    nodes:Vec<Node>,
    edges:Vec<Edge>,
    demands:Vec<Demand>,
}

impl Network {
    pub fn new(num_repeaters:usize,num_clients:usize,generation_capacity:PairCount) -> Self {
        let mut nodes = Vec::with_capacity(1 + num_repeaters + num_clients);
        nodes.push(Node {id:NodeId(0),tier:Tier::Generator});
        for i in 0..num_repeaters {
            nodes.push(Node {id:NodeId(1 + i),tier:Tier::Repeater(i)});
        }
        for i in 0..num_clients {
            nodes.push(Node {id:NodeId(1 + num_repeaters + i),tier:Tier::Client(i)});
        }
        Self {num_repeaters,num_clients,generation_capacity,nodes,edges:vec![],demands:vec![]}
    }

    pub fn generator(&self) -> NodeId {
        NodeId(0)
    }
    pub fn repeater(&self,index:usize) -> NodeId {
        debug_assert!(index < self.num_repeaters);
        NodeId(1 + index)
    }
    pub fn client(&self,client:ClientId) -> NodeId {
        debug_assert!(client.0 < self.num_clients);
        NodeId(1 + self.num_repeaters + client.0)
    }

    fn push_edge(&mut self,from:NodeId,to:NodeId,kind:EdgeKind,capacity:PairCount,fidelity:Fidelity) -> EdgeId {
        let id = EdgeId(self.edges.len());
        self.edges.push(Edge {id,from,to,kind,capacity,fidelity});
        id
    }
    pub fn add_feed(&mut self,repeater:usize,capacity:PairCount,fidelity:Fidelity) -> EdgeId {
        let (from,to) = (self.generator(),self.repeater(repeater));
        self.push_edge(from, to, EdgeKind::Feed, capacity, fidelity)
    }
    pub fn add_relay(&mut self,from:usize,to:usize,capacity:PairCount,fidelity:Fidelity) -> EdgeId {
        let (from,to) = (self.repeater(from),self.repeater(to));
        self.push_edge(from, to, EdgeKind::Relay, capacity, fidelity)
    }
    pub fn add_access(&mut self,repeater:usize,client:ClientId,capacity:PairCount,fidelity:Fidelity) -> EdgeId {
        let (from,to) = (self.repeater(repeater),self.client(client));
        self.push_edge(from, to, EdgeKind::Access, capacity, fidelity)
    }
    pub fn add_demand(&mut self,demand:Demand) {
        self.demands.push(demand)
    }

    pub fn num_repeaters(&self) -> usize {
        self.num_repeaters
    }
    pub fn num_clients(&self) -> usize {
        self.num_clients
    }
    pub fn generation_capacity(&self) -> PairCount {
        self.generation_capacity
    }
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }
    pub fn edge(&self,id:EdgeId) -> Option<&Edge> {
        self.edges.get(id.0)
    }
    pub fn demands(&self) -> &[Demand] {
        &self.demands
    }
    pub fn demand(&self,client:ClientId) -> Option<&Demand> {
        self.demands.iter().find(|d| d.client == client)
    }
    pub fn edges_of_kind(&self,kind:EdgeKind) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    // adjacency index keyed by node id, arcs carry edge ids
    pub fn topology(&self) -> DirectedGraph {
        let mut graph = DirectedGraph::with_capacity(self.nodes.len());
        for node in self.nodes.iter() {
            graph.push_node(node.id.0);
        }
        for edge in self.edges.iter() {
            graph.push_edge(edge.from.0, edge.to.0, edge.id.0);
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::{ClientId, Demand, EdgeKind, Network, Tier};

    #[test]
    fn test_node_layout() {
        let network = Network::new(3, 2, 100);
        assert_eq!(network.nodes().len(),6);
        assert_eq!(network.nodes()[0].tier,Tier::Generator);
        assert_eq!(network.nodes()[network.repeater(2).0].tier,Tier::Repeater(2));
        assert_eq!(network.nodes()[network.client(ClientId(1)).0].tier,Tier::Client(1));
    }

    #[test]
    fn test_topology_mirrors_edges() {
        let mut network = Network::new(2, 1, 10);
        let feed = network.add_feed(0, 5, 0.99);
        let relay = network.add_relay(0, 1, 4, 0.95);
        let access = network.add_access(1, ClientId(0), 3, 0.97);
        network.add_demand(Demand {client:ClientId(0),requested_pairs:2,min_fidelity:0.8});

        let graph = network.topology();
        assert_eq!(graph.edges_len(),3);
        assert_eq!(graph.edge_between(0, network.repeater(0).0),Some(feed.0));
        assert_eq!(graph.in_arcs(network.repeater(1).0),vec![(network.repeater(0).0,relay.0)]);
        assert_eq!(graph.in_arcs(network.client(ClientId(0)).0),vec![(network.repeater(1).0,access.0)]);
        assert_eq!(network.edges_of_kind(EdgeKind::Relay).count(),1);
        assert_eq!(network.demand(ClientId(0)).unwrap().requested_pairs,2);
    }
}
