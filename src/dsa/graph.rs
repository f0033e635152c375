// directed adjacency index over the network tiers
// every arc remembers the edge id it was created from, so a walk
// over the graph can be turned back into a sequence of edges

use std::borrow::Borrow;

type HashMap<K,V> = std::collections::hash_map::HashMap<K,V,nohash::BuildNoHashHasher<usize>>;

// node -> edge id
type Arcs = HashMap<usize,usize>;

#[derive(Clone,Debug)]
struct Neighbours {
    to:Arcs,
    from:Arcs,
}

impl Neighbours {
    fn new() -> Self {
        Self {
            to:HashMap::with_hasher(nohash::BuildNoHashHasher::default()),
            from:HashMap::with_hasher(nohash::BuildNoHashHasher::default())
        }
    }
    fn with_capacity(capacity:usize) -> Self {
        if capacity == 0 {
           return Self::new();
        }
        Self {to:HashMap::with_capacity_and_hasher(capacity,nohash::BuildNoHashHasher::default()),
            from:HashMap::with_capacity_and_hasher(capacity,nohash::BuildNoHashHasher::default())
        }
    }
    fn shrink_to_fit(&mut self) {
        self.to.shrink_to_fit();
        self.from.shrink_to_fit();
    }
}

impl Default for Neighbours {
    fn default() -> Self {
        Self::new()
    }
}

// (neighbour node, edge id), ordered by edge id
pub type Adjacent = Vec<(usize,usize)>;

fn sorted_arcs(arcs:&Arcs) -> Adjacent {
    let mut v:Adjacent = arcs.iter().map(|(node,edge)| (*node,*edge)).collect();
    // hash order is not part of the contract, edge order is
    v.sort_unstable_by_key(|(_,edge)| *edge);
    v
}

#[derive(Clone,Debug)]
pub struct DirectedGraph {
    edges_len:usize,
    nodes:HashMap<usize,Neighbours>
}

impl Default for DirectedGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectedGraph {
    pub fn new() -> Self {
        Self {edges_len:0,nodes:HashMap::with_hasher(nohash::BuildNoHashHasher::default())}
    }
    pub fn with_capacity(capacity:usize) -> Self {
        if capacity == 0 {
            return Self::new();
        }
        Self {edges_len:0,nodes:HashMap::with_capacity_and_hasher(capacity, nohash::BuildNoHashHasher::default())}
    }
    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
        for neighbours in self.nodes.values_mut() {
            neighbours.shrink_to_fit();
        }
    }
    pub fn nodes_len(&self) -> usize {
        self.nodes.len()
    }
    pub fn edges_len(&self) -> usize {
        self.edges_len
    }
    #[cfg(debug_assertions)]
    fn assert_pair(&self,start:usize,end:usize,edge:usize) {
        let start_node = self.nodes.get(&start).expect(&format!("Start node {start} non-existent"));
        let end_node = self.nodes.get(&end).expect(&format!("End node {end} non-existent"));

        if start_node.to.get(&end) != Some(&edge) {
            panic!("Edge {edge}: {start} -> {end} defined, but {end} is not in {start}'s to list");
        }
        if end_node.from.get(&start) != Some(&edge) {
            panic!("Edge {edge}: {start} -> {end} defined, but {start} is not in {end}'s from list");
        }
    }
    pub fn push_node_with_sizehint(&mut self,node:usize,hint:usize) {
        if self.nodes.contains_key(&node) {return;}
        // insert a node without adding edges
        self.nodes.insert(node, Neighbours::with_capacity(hint));
    }
    pub fn push_node(&mut self,node:usize) {
        self.push_node_with_sizehint(node, 0);
    }
    // returns false when start -> end is already present, the first edge id wins
    pub fn push_edge_with_sizehint(&mut self,start:usize,end:usize,edge:usize,hint:usize) -> bool {
        if let Some(neighbours) = self.nodes.get(&start) {
            if neighbours.to.contains_key(&end) {
                return false;
            }
        }
        self.nodes.entry(start).or_insert_with(|| Neighbours::with_capacity(hint))
            .to.insert(end,edge);
        self.nodes.entry(end).or_insert_with(|| Neighbours::with_capacity(hint))
            .from.insert(start,edge);

        self.edges_len += 1;

        #[cfg(debug_assertions)]
        self.assert_pair(start, end, edge);
        true
    }
    pub fn push_edge(&mut self,start:usize,end:usize,edge:usize) -> bool {
        self.push_edge_with_sizehint(start, end, edge, 0)
    }
    pub fn edge_between(&self,start:usize,end:usize) -> Option<usize> {
        self.nodes.get(&start)?.to.get(&end).copied()
    }
    pub fn out_arcs(&self,node:usize) -> Adjacent {
        self.nodes.get(&node).map(|n| sorted_arcs(&n.to)).unwrap_or_default()
    }
    pub fn in_arcs(&self,node:usize) -> Adjacent {
        self.nodes.get(&node).map(|n| sorted_arcs(&n.from)).unwrap_or_default()
    }
    pub fn in_degree(&self,node:usize) -> usize {
        self.nodes.get(&node).map(|n| n.from.len()).unwrap_or(0)
    }
    pub fn out_degree(&self,node:usize) -> usize {
        self.nodes.get(&node).map(|n| n.to.len()).unwrap_or(0)
    }
}

// (start, end, edge id)
impl<A:Borrow<(usize,usize,usize)>> FromIterator<A> for DirectedGraph {
    fn from_iter<T: IntoIterator<Item = A>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let size = match iter.size_hint() {
            (_,Some(higher)) => {higher},
            (lower,None) => {lower}
        };
        let mut new_graph = Self::with_capacity(size);
        for arc in iter {
            let (start,end,edge) = arc.borrow();
            new_graph.push_edge(*start, *end, *edge);
        }
        new_graph.shrink_to_fit();
        new_graph
    }
}
