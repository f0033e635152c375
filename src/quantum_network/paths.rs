// candidate routes from the generator to each client.
// direct: feed + access. relay: feed + relay + access, through two repeaters.
// ordering only depends on raw fidelity and capacity, so it holds for every alpha > 0

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ClientId, EdgeId, Fidelity, Network, PairCount};

#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize,Deserialize)]
pub struct PathPolicy {
    // relay candidates kept per client, best first
    pub max_relay_paths:usize,
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self {max_relay_paths:4}
    }
}

impl PathPolicy {
    pub fn with_max_relay_paths(mut self,max_relay_paths:usize) -> Self {
        self.max_relay_paths = max_relay_paths;
        self
    }
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct CandidatePath {
    pub client:ClientId,
    // generator side first
    pub edges:Vec<EdgeId>,
    // per-edge fidelity, parallel to edges
    pub fidelities:Vec<Fidelity>,
    // smallest capacity along the path
    pub bottleneck:PairCount,
}

impl CandidatePath {
    pub fn hops(&self) -> usize {
        self.edges.len()
    }
    pub fn raw_fidelity(&self) -> Fidelity {
        self.fidelities.iter().product()
    }
    pub fn is_relay(&self) -> bool {
        self.edges.len() == 3
    }
}

// fidelity descending, then capacity descending, then fewer hops, then lower edge ids
fn rank(a:&CandidatePath,b:&CandidatePath) -> Ordering {
    b.raw_fidelity().total_cmp(&a.raw_fidelity())
        .then(b.bottleneck.cmp(&a.bottleneck))
        .then(a.hops().cmp(&b.hops()))
        .then_with(|| a.edges.cmp(&b.edges))
}

/// Enumerates the candidate paths of every client, in client order.
pub fn enumerate(network:&Network,policy:&PathPolicy) -> Vec<CandidatePath> {
    let graph = network.topology();
    let generator = network.generator().0;

    let build = |client:ClientId,edges:&[usize]| -> Option<CandidatePath> {
        let mut path = CandidatePath {
            client,
            edges:Vec::with_capacity(edges.len()),
            fidelities:Vec::with_capacity(edges.len()),
            bottleneck:PairCount::MAX,
        };
        for &id in edges {
            let edge = network.edge(EdgeId(id))?;
            path.edges.push(edge.id);
            path.fidelities.push(edge.fidelity);
            path.bottleneck = path.bottleneck.min(edge.capacity);
        }
        Some(path)
    };

    let mut out = vec![];
    for c in 0..network.num_clients() {
        let client = ClientId(c);
        let mut direct = vec![];
        let mut relay = vec![];
        for (last_hop,access) in graph.in_arcs(network.client(client).0) {
            if let Some(feed) = graph.edge_between(generator, last_hop) {
                direct.extend(build(client, &[feed,access]));
            }
            for (first_hop,virtual_link) in graph.in_arcs(last_hop) {
                if first_hop == generator {continue}
                if let Some(feed) = graph.edge_between(generator, first_hop) {
                    relay.extend(build(client, &[feed,virtual_link,access]));
                }
            }
        }
        relay.sort_by(rank);
        relay.truncate(policy.max_relay_paths);

        let mut candidates = direct;
        candidates.append(&mut relay);
        candidates.sort_by(rank);
        out.append(&mut candidates);
    }
    debug!(clients = network.num_clients(),paths = out.len(),"enumerated candidate paths");
    out
}

#[cfg(test)]
mod tests {
    use super::{enumerate, PathPolicy};
    use crate::quantum_network::{ClientId, Demand, EdgeId, Network};

    // two fed repeaters, relay 0->1, client 0 reachable from both, client 1 only from 1
    fn diamond() -> Network {
        let mut network = Network::new(3, 2, 100);
        network.add_feed(0, 10, 0.99);
        network.add_feed(1, 10, 0.97);
        network.add_relay(0, 1, 5, 0.97);
        network.add_relay(2, 1, 5, 0.99);
        network.add_access(0, ClientId(0), 6, 0.95);
        network.add_access(1, ClientId(0), 6, 0.96);
        network.add_access(1, ClientId(1), 4, 0.9);
        for c in 0..2 {
            network.add_demand(Demand {client:ClientId(c),requested_pairs:3,min_fidelity:0.8});
        }
        network
    }

    #[test]
    fn test_direct_and_relay_paths() {
        let network = diamond();
        let paths = enumerate(&network, &PathPolicy::default());
        let of = |c| paths.iter().filter(|p| p.client == ClientId(c)).collect::<Vec<_>>();

        let first = of(0);
        // two direct, one relay; repeater 2 has no feed so its relay is not a path
        assert_eq!(first.len(),3);
        assert_eq!(first.iter().filter(|p| p.is_relay()).count(),1);
        // 0.99*0.95 beats 0.97*0.96 beats 0.99*0.97*0.96
        assert_eq!(first[0].edges,vec![EdgeId(0),EdgeId(4)]);
        assert_eq!(first[1].edges,vec![EdgeId(1),EdgeId(5)]);
        assert_eq!(first[2].edges,vec![EdgeId(0),EdgeId(2),EdgeId(5)]);
        assert_eq!(first[2].bottleneck,5);

        let second = of(1);
        assert_eq!(second.len(),2);
        assert!(paths.iter().all(|p| p.raw_fidelity() > 0.0 && p.raw_fidelity() <= 1.0));
    }

    #[test]
    fn test_relay_cap() {
        let network = diamond();
        let paths = enumerate(&network, &PathPolicy::default().with_max_relay_paths(0));
        assert!(paths.iter().all(|p| !p.is_relay()));
        assert_eq!(paths.len(),3);
    }

    // every route to client 0 composes to 0.9*0.95
    fn ties() -> Network {
        let mut network = Network::new(4, 1, 100);
        network.add_feed(0, 1, 0.9);
        network.add_feed(1, 9, 0.9);
        network.add_feed(2, 1, 0.9);
        network.add_relay(0, 2, 9, 1.0);
        network.add_relay(1, 2, 9, 1.0);
        network.add_access(2, ClientId(0), 9, 0.95);
        network.add_feed(3, 1, 0.9);
        network.add_relay(3, 2, 9, 1.0);
        network.add_demand(Demand {client:ClientId(0),requested_pairs:3,min_fidelity:0.5});
        network
    }

    #[test]
    fn test_equal_fidelity_ties() {
        let network = ties();
        let paths = enumerate(&network, &PathPolicy::default());
        let edges:Vec<Vec<EdgeId>> = paths.iter().map(|p| p.edges.clone()).collect();
        assert_eq!(edges,vec![
            // widest first
            vec![EdgeId(1),EdgeId(4),EdgeId(5)],
            // then the shorter route
            vec![EdgeId(2),EdgeId(5)],
            // then lowest edge ids
            vec![EdgeId(0),EdgeId(3),EdgeId(5)],
            vec![EdgeId(6),EdgeId(7),EdgeId(5)],
        ]);
        assert!(paths.windows(2).all(|w| w[0].raw_fidelity() == w[1].raw_fidelity()));
    }

    #[test]
    fn test_relay_cap_keeps_widest() {
        let network = ties();
        let paths = enumerate(&network, &PathPolicy::default().with_max_relay_paths(1));
        let relay:Vec<_> = paths.iter().filter(|p| p.is_relay()).collect();
        assert_eq!(relay.len(),1);
        assert_eq!(relay[0].edges,vec![EdgeId(1),EdgeId(4),EdgeId(5)]);
        assert_eq!(relay[0].bottleneck,9);
    }

    #[test]
    fn test_clients_in_order() {
        let network = diamond();
        let paths = enumerate(&network, &PathPolicy::default());
        assert!(paths.windows(2).all(|w| w[0].client <= w[1].client));
    }
}
