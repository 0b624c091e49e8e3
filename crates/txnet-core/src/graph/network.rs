//! Transmission DAG storage.
//!
//! # Overview
//!
//! [`NetworkGraph`] keeps infection events as a [`petgraph`] directed graph.
//! An edge `A → B` means "A infected B". A node with several parents models
//! co-infection or superinfection.
//!
//! ## Ordering
//!
//! Node and edge indices follow registration order, so every accessor that
//! returns a list (`nodes`, `edges`, `parents`, `children`, `get_roots`) is in
//! insertion order. [`NetworkGraph::topological_order`] uses Kahn's algorithm
//! with a min-heap on the insertion index: among nodes whose parents have all
//! been emitted, the earliest-registered node goes first. Downstream random
//! draws depend on this order, so it must never change silently.
//!
//! ## Multi-edges
//!
//! Re-adding an edge stores a second copy. Use
//! [`NetworkGraph::distinct_parents`] when each parent should count once.

#![allow(clippy::module_name_repetitions)]

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::{Result, SimError};

// ---------------------------------------------------------------------------
// NetworkGraph
// ---------------------------------------------------------------------------

/// A directed transmission graph keyed by node label.
#[derive(Debug, Clone, Default)]
pub struct NetworkGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl NetworkGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from an edge list, registering labels as they appear.
    pub fn from_edges<'a, I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut graph = Self::new();
        for (parent, child) in edges {
            graph.add_edge(parent, child);
        }
        graph
    }

    /// Register `label` as a node if it is not already present.
    ///
    /// Returns `true` when the node was newly added.
    pub fn add_node(&mut self, label: &str) -> bool {
        if self.node_map.contains_key(label) {
            return false;
        }
        let idx = self.graph.add_node(label.to_string());
        self.node_map.insert(label.to_string(), idx);
        true
    }

    /// Add a transmission edge `parent → child`, registering unseen labels.
    ///
    /// Adding the same pair twice stores two edges.
    pub fn add_edge(&mut self, parent: &str, child: &str) {
        self.add_node(parent);
        self.add_node(child);
        let (p, c) = (self.node_map[parent], self.node_map[child]);
        self.graph.add_edge(p, c, ());
    }

    /// Number of registered nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges, counting duplicates.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether `label` is a registered node.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.node_map.contains_key(label)
    }

    /// All node labels in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> + '_ {
        self.graph.node_indices().map(|idx| self.graph[idx].as_str())
    }

    /// All edges as `(parent, child)` pairs in registration order.
    #[must_use]
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.graph
            .edge_references()
            .map(|e| (self.graph[e.source()].as_str(), self.graph[e.target()].as_str()))
            .collect()
    }

    /// Parents of `label` in edge-registration order, duplicates included.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] if `label` is not registered.
    pub fn parents(&self, label: &str) -> Result<Vec<&str>> {
        self.adjacent(label, Direction::Incoming)
    }

    /// Children of `label` in edge-registration order, duplicates included.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] if `label` is not registered.
    pub fn children(&self, label: &str) -> Result<Vec<&str>> {
        self.adjacent(label, Direction::Outgoing)
    }

    /// Parents of `label` with repeated edges collapsed, first occurrence kept.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] if `label` is not registered.
    pub fn distinct_parents(&self, label: &str) -> Result<Vec<&str>> {
        let mut parents = self.parents(label)?;
        let mut seen = std::collections::HashSet::with_capacity(parents.len());
        parents.retain(|p| seen.insert(*p));
        Ok(parents)
    }

    /// Nodes with no parents, in registration order.
    #[must_use]
    pub fn get_roots(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|idx| self.graph[idx].as_str())
            .collect()
    }

    /// Return every node so that each parent precedes all of its children.
    ///
    /// Ties between independent nodes are broken by ascending registration
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::GraphCycle`] listing the members of every cycle
    /// when some node can never become ready.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let n = self.graph.node_count();

        // Dependency count per node, duplicate edges included.
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.edges_directed(idx, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, deg)| **deg == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            let idx = NodeIndex::new(i);
            order.push(self.graph[idx].clone());

            for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
                let t = edge.target().index();
                in_degree[t] -= 1;
                if in_degree[t] == 0 {
                    ready.push(Reverse(t));
                }
            }
        }

        if order.len() == n {
            Ok(order)
        } else {
            Err(SimError::GraphCycle {
                nodes: self.cyclic_nodes(),
            })
        }
    }

    /// BLAKE3 hash of the edge list in registration order.
    ///
    /// Two graphs built by the same sequence of `add_edge` calls share a
    /// hash, which makes it usable as a run fingerprint.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for label in self.nodes() {
            hasher.update(label.as_bytes());
            hasher.update(b"\x00");
        }
        hasher.update(b"\x01");
        for (parent, child) in self.edges() {
            hasher.update(parent.as_bytes());
            hasher.update(b"\x00");
            hasher.update(child.as_bytes());
            hasher.update(b"\x00");
        }
        format!("blake3:{}", hasher.finalize())
    }

    fn index_of(&self, label: &str) -> Result<NodeIndex> {
        self.node_map
            .get(label)
            .copied()
            .ok_or_else(|| SimError::UnknownNode(label.to_string()))
    }

    fn adjacent(&self, label: &str, dir: Direction) -> Result<Vec<&str>> {
        let idx = self.index_of(label)?;
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, dir)
            .map(|e| {
                let other = match dir {
                    Direction::Incoming => e.source(),
                    Direction::Outgoing => e.target(),
                };
                (e.id().index(), other)
            })
            .collect();
        // petgraph walks adjacency lists newest-first.
        edges.sort_unstable_by_key(|(id, _)| *id);
        Ok(edges
            .into_iter()
            .map(|(_, other)| self.graph[other].as_str())
            .collect())
    }

    /// Labels of nodes that sit on a cycle, in registration order.
    fn cyclic_nodes(&self) -> Vec<String> {
        let mut members: Vec<NodeIndex> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .flatten()
            .collect();
        members.sort_unstable();
        members
            .into_iter()
            .map(|idx| self.graph[idx].clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph_orders_nothing() {
        let graph = NetworkGraph::new();
        assert_eq!(graph.node_count(), 0);
        assert!(graph.topological_order().expect("order").is_empty());
        assert!(graph.get_roots().is_empty());
    }

    #[test]
    fn add_edge_registers_both_labels() {
        let mut graph = NetworkGraph::new();
        graph.add_edge("a", "b");
        assert!(graph.contains("a"));
        assert!(graph.contains("b"));
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.parents("b").expect("parents"), vec!["a"]);
        assert_eq!(graph.children("a").expect("children"), vec!["b"]);
    }

    #[test]
    fn duplicate_edges_are_kept_but_collapsible() {
        let mut graph = NetworkGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("a", "b");
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.parents("b").expect("parents"), vec!["a", "a"]);
        assert_eq!(graph.distinct_parents("b").expect("parents"), vec!["a"]);
        assert_eq!(
            graph.topological_order().expect("order"),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn parents_follow_edge_registration_order() {
        let mut graph = NetworkGraph::new();
        graph.add_edge("z", "child");
        graph.add_edge("y", "child");
        graph.add_edge("x", "child");
        assert_eq!(
            graph.parents("child").expect("parents"),
            vec!["z", "y", "x"]
        );
    }

    #[test]
    fn roots_include_isolated_nodes() {
        let mut graph = NetworkGraph::new();
        graph.add_node("lonely");
        graph.add_edge("a", "b");
        assert_eq!(graph.get_roots(), vec!["lonely", "a"]);
    }

    #[test]
    fn add_node_is_idempotent() {
        let mut graph = NetworkGraph::new();
        assert!(graph.add_node("a"));
        assert!(!graph.add_node("a"));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn independent_nodes_follow_insertion_order() {
        let mut graph = NetworkGraph::new();
        graph.add_edge("c", "d");
        graph.add_edge("a", "b");
        // c and a are both ready; c was registered first.
        let order = graph.topological_order().expect("order");
        assert_eq!(order, vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn child_waits_for_all_parents() {
        let mut graph = NetworkGraph::new();
        graph.add_edge("a", "d");
        graph.add_edge("b", "c");
        graph.add_edge("c", "d");
        let order = graph.topological_order().expect("order");
        let pos = |l: &str| order.iter().position(|x| x == l).expect("present");
        assert!(pos("a") < pos("d"));
        assert!(pos("c") < pos("d"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn cycle_is_rejected_with_members() {
        let mut graph = NetworkGraph::new();
        graph.add_edge("root", "a");
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        graph.add_edge("c", "a");
        let err = graph.topological_order().expect_err("cycle");
        assert_eq!(
            err,
            SimError::GraphCycle {
                nodes: vec!["a".into(), "b".into(), "c".into()]
            }
        );
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut graph = NetworkGraph::new();
        graph.add_edge("a", "a");
        assert!(matches!(
            graph.topological_order(),
            Err(SimError::GraphCycle { nodes }) if nodes == vec!["a".to_string()]
        ));
    }

    #[test]
    fn unknown_node_lookup_fails() {
        let graph = NetworkGraph::new();
        assert_eq!(
            graph.parents("ghost"),
            Err(SimError::UnknownNode("ghost".into()))
        );
    }

    #[test]
    fn content_hash_tracks_edges() {
        let a = NetworkGraph::from_edges([("a", "b")]);
        let b = NetworkGraph::from_edges([("a", "b")]);
        let c = NetworkGraph::from_edges([("a", "b"), ("b", "c")]);
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
        assert!(a.content_hash().starts_with("blake3:"));
    }

    #[test]
    fn edges_are_listed_in_insertion_order() {
        let graph = NetworkGraph::from_edges([("b", "c"), ("a", "b")]);
        assert_eq!(graph.edges(), vec![("b", "c"), ("a", "b")]);
    }
}
