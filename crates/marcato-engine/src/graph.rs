//! The succession graph: deduplicated states plus the firings between
//! them.

use rustc_hash::FxHashMap;
use std::fmt::{self, Display};
use std::hash::Hash;

/// Index of a node in a [`SuccessionGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:03}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Edge<E> {
    pub from: NodeId,
    pub to: NodeId,
    pub payload: E,
}

/// A directed graph over states `S` with succession payloads `E`.
/// States are deduplicated by equality on insertion; edges keep
/// discovery order.
#[derive(Debug, Clone)]
pub struct SuccessionGraph<S, E> {
    nodes: Vec<S>,
    index: FxHashMap<S, NodeId>,
    edges: Vec<Edge<E>>,
    out: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    local_stop: Vec<bool>,
    root: NodeId,
}

impl<S: Clone + Eq + Hash, E> SuccessionGraph<S, E> {
    pub fn new(root: S) -> Self {
        let mut index = FxHashMap::default();
        index.insert(root.clone(), NodeId(0));
        SuccessionGraph {
            nodes: vec![root],
            index,
            edges: Vec::new(),
            out: vec![Vec::new()],
            incoming: vec![Vec::new()],
            local_stop: vec![false],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &S {
        &self.nodes[id.index()]
    }

    pub fn lookup(&self, state: &S) -> Option<NodeId> {
        self.index.get(state).copied()
    }

    /// Insert a state, returning its id and whether it was new.
    pub fn insert(&mut self, state: S) -> (NodeId, bool) {
        if let Some(&id) = self.index.get(&state) {
            return (id, false);
        }
        let id = NodeId(self.nodes.len() as u32);
        self.index.insert(state.clone(), id);
        self.nodes.push(state);
        self.out.push(Vec::new());
        self.incoming.push(Vec::new());
        self.local_stop.push(false);
        (id, true)
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, payload: E) {
        let e = self.edges.len();
        self.edges.push(Edge { from, to, payload });
        self.out[from.index()].push(e);
        self.incoming[to.index()].push(e);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &S)> {
        self.nodes.iter().enumerate().map(|(i, s)| (NodeId(i as u32), s))
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge<E>> {
        self.edges.iter()
    }

    /// Outgoing successions of a node, in discovery order.
    pub fn successors(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &E)> {
        self.out[id.index()].iter().map(|&e| (self.edges[e].to, &self.edges[e].payload))
    }

    /// Incoming successions of a node.
    pub fn predecessors(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &E)> {
        self.incoming[id.index()].iter().map(|&e| (self.edges[e].from, &self.edges[e].payload))
    }

    /// The first succession between two nodes, if any.
    pub fn edge_between(&self, from: NodeId, to: NodeId) -> Option<&E> {
        self.out[from.index()]
            .iter()
            .map(|&e| &self.edges[e])
            .find(|e| e.to == to)
            .map(|e| &e.payload)
    }

    /// Mark a node as not-to-be-expanded.
    pub fn mark_local_stop(&mut self, id: NodeId) {
        self.local_stop[id.index()] = true;
    }

    pub fn is_local_stop(&self, id: NodeId) -> bool {
        self.local_stop[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicates_by_equality() {
        let mut g: SuccessionGraph<&str, u32> = SuccessionGraph::new("a");
        let (a, fresh) = g.insert("a");
        assert!(!fresh);
        assert_eq!(a, g.root());
        let (b, fresh) = g.insert("b");
        assert!(fresh);
        g.add_edge(a, b, 1);
        g.add_edge(b, a, 2);
        g.add_edge(a, b, 3);
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.successors(a).count(), 2);
        assert_eq!(g.predecessors(b).count(), 2);
        assert_eq!(g.edge_between(b, a), Some(&2));
        assert_eq!(g.edge_between(b, b), None);
    }

    #[test]
    fn local_stop_flags() {
        let mut g: SuccessionGraph<u32, ()> = SuccessionGraph::new(0);
        let (n, _) = g.insert(1);
        assert!(!g.is_local_stop(n));
        g.mark_local_stop(n);
        assert!(g.is_local_stop(n));
    }
}
