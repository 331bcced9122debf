//! Weighted, labelled digraph builder
//!
//! This module provides a mutable digraph builder that uses FxHashMap
//! side tables for O(1) weight and label lookups keyed by `(source, target)`.

use crate::errors::{DecodeError, Result};
use crate::graph::arborescence::{maximum_spanning_arborescence, WeightedEdge};
use crate::types::LabelCode;
use rustc_hash::FxHashMap;

/// A mutable digraph builder optimized for incremental construction
#[derive(Debug, Default)]
pub struct DigraphBuilder {
    /// Maps node name -> node ID
    name_to_id: FxHashMap<String, u32>,
    /// Node names, indexed by ID
    names: Vec<String>,
    /// Adjacency list: source node ID -> reachable target IDs (insertion order)
    targets: Vec<Vec<u32>>,
    /// Edge weights keyed by (source, target)
    weights: FxHashMap<(u32, u32), f64>,
    /// Edge labels keyed by (source, target)
    labels: FxHashMap<(u32, u32), LabelCode>,
}

impl DigraphBuilder {
    /// Create a new empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with pre-allocated capacity
    pub fn with_capacity(node_capacity: usize, edge_capacity: usize) -> Self {
        Self {
            name_to_id: FxHashMap::with_capacity_and_hasher(node_capacity, Default::default()),
            names: Vec::with_capacity(node_capacity),
            targets: Vec::with_capacity(node_capacity),
            weights: FxHashMap::with_capacity_and_hasher(edge_capacity, Default::default()),
            labels: FxHashMap::with_capacity_and_hasher(edge_capacity, Default::default()),
        }
    }

    /// Get or create a node for the given name, returning its ID
    pub fn get_or_create_node(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }

        let id = self.names.len() as u32;
        self.name_to_id.insert(name.to_string(), id);
        self.names.push(name.to_string());
        self.targets.push(Vec::new());
        id
    }

    /// Add a labelled edge.
    ///
    /// Self-loops are ignored. If the edge already exists its weight and
    /// label are NOT modified. Returns whether the edge was inserted.
    pub fn add_edge(&mut self, from: u32, to: u32, weight: f64, label: LabelCode) -> bool {
        if from == to || self.weights.contains_key(&(from, to)) {
            return false;
        }
        let Some(adjacent) = self.targets.get_mut(from as usize) else {
            return false;
        };
        adjacent.push(to);
        self.weights.insert((from, to), weight);
        self.labels.insert((from, to), label);
        true
    }

    /// Weight of an edge
    pub fn weight(&self, from: u32, to: u32) -> Option<f64> {
        self.weights.get(&(from, to)).copied()
    }

    /// Label of an edge
    pub fn label(&self, from: u32, to: u32) -> Option<LabelCode> {
        self.labels.get(&(from, to)).copied()
    }

    /// Targets reachable from a node in one step
    pub fn targets(&self, from: u32) -> &[u32] {
        self.targets
            .get(from as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Get a node ID by name
    pub fn node_id(&self, name: &str) -> Option<u32> {
        self.name_to_id.get(name).copied()
    }

    /// Get the name for a node ID
    pub fn node_name(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    /// Get the number of nodes in the graph
    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    /// Get the number of directed edges
    pub fn edge_count(&self) -> usize {
        self.weights.len()
    }

    /// Check if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Maximum spanning arborescence rooted at `root`.
    ///
    /// Edges are read back through the weight table; a missing entry means
    /// the adjacency list and side tables disagree, which is reported as an
    /// internal error rather than skipped.
    pub fn mst(&self, root: u32) -> Result<Arborescence> {
        if root as usize >= self.node_count() {
            return Err(DecodeError::internal(format!(
                "root node {} outside graph of {} node(s)",
                root,
                self.node_count()
            )));
        }

        let mut edges = Vec::with_capacity(self.edge_count());
        for (from, adjacent) in self.targets.iter().enumerate() {
            let from = from as u32;
            for &to in adjacent {
                let weight = self.weight(from, to).ok_or_else(|| {
                    DecodeError::internal(format!("no weight for edge ({}, {})", from, to))
                })?;
                edges.push(WeightedEdge {
                    source: from as usize,
                    target: to as usize,
                    weight,
                });
            }
        }

        let chosen = maximum_spanning_arborescence(self.node_count(), root as usize, &edges)?;
        let parents = chosen
            .into_iter()
            .map(|e| e.map(|i| edges[i].source as u32))
            .collect();
        Ok(Arborescence { root, parents })
    }
}

/// A spanning arborescence over the builder's node IDs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arborescence {
    root: u32,
    parents: Vec<Option<u32>>,
}

impl Arborescence {
    /// The root node ID
    pub fn root(&self) -> u32 {
        self.root
    }

    /// Parent of a node, if it has one
    pub fn parent(&self, node: u32) -> Option<u32> {
        self.parents.get(node as usize).copied().flatten()
    }

    /// Iterate over `(source, target)` edges, ordered by target ID
    pub fn iter_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.parents
            .iter()
            .enumerate()
            .filter_map(|(to, from)| from.map(|f| (f, to as u32)))
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.parents.iter().filter(|p| p.is_some()).count()
    }
}
