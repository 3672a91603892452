//! Schema reference graph
//!
//! Registered schema versions and the references between them. Answers
//! "which schemas reference subject X at version N", which the registry needs
//! before it may delete or soft-delete a version.

use std::collections::HashMap;
use std::fmt;

use petgraph::algo::{has_path_connecting, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::error::{CompatError, Result};
use crate::schema::SchemaReference;

/// A registered schema snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaKey {
    pub subject: String,
    pub version: i32,
}

impl SchemaKey {
    pub fn new(subject: impl Into<String>, version: i32) -> Self {
        Self { subject: subject.into(), version }
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.subject, self.version)
    }
}

/// Directed graph with an edge from each schema to every schema it references;
/// edges carry the reference name
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    graph: DiGraph<SchemaKey, String>,
    node_indices: HashMap<SchemaKey, NodeIndex>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, key: SchemaKey) -> NodeIndex {
        if let Some(index) = self.node_indices.get(&key) {
            return *index;
        }
        let index = self.graph.add_node(key.clone());
        self.node_indices.insert(key, index);
        index
    }

    /// Record `subject` at `version` and the schemas it references
    ///
    /// A registration that would close a reference cycle is rejected and
    /// leaves the graph's edges unchanged.
    pub fn register(&mut self, subject: &str, version: i32, references: &[SchemaReference]) -> Result<()> {
        let key = SchemaKey::new(subject, version);
        let from = self.node(key.clone());

        let mut targets = Vec::with_capacity(references.len());
        for reference in references {
            let to = self.node(SchemaKey::new(reference.subject.clone(), reference.version));
            if has_path_connecting(&self.graph, to, from, None) {
                return Err(CompatError::ReferenceCycle(key.to_string()));
            }
            targets.push((to, reference.name.clone()));
        }

        for (to, name) in targets {
            if self.graph.find_edge(from, to).is_none() {
                self.graph.add_edge(from, to, name);
            }
        }
        tracing::debug!(schema = %key, references = references.len(), "registered schema references");
        Ok(())
    }

    pub fn contains(&self, subject: &str, version: i32) -> bool {
        self.node_indices.contains_key(&SchemaKey::new(subject, version))
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    fn neighbors(&self, subject: &str, version: i32, direction: Direction) -> Vec<SchemaKey> {
        let Some(index) = self.node_indices.get(&SchemaKey::new(subject, version)) else {
            return Vec::new();
        };
        let mut keys: Vec<SchemaKey> = self
            .graph
            .edges_directed(*index, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Incoming => edge.source(),
                    Direction::Outgoing => edge.target(),
                };
                self.graph[other].clone()
            })
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Schemas that reference `subject` at `version` directly
    pub fn referenced_by(&self, subject: &str, version: i32) -> Vec<SchemaKey> {
        self.neighbors(subject, version, Direction::Incoming)
    }

    /// Schemas `subject` at `version` references directly
    pub fn references_of(&self, subject: &str, version: i32) -> Vec<SchemaKey> {
        self.neighbors(subject, version, Direction::Outgoing)
    }

    /// Every schema reachable through references, excluding the start
    pub fn transitive_references(&self, subject: &str, version: i32) -> Vec<SchemaKey> {
        let Some(start) = self.node_indices.get(&SchemaKey::new(subject, version)) else {
            return Vec::new();
        };
        let mut dfs = Dfs::new(&self.graph, *start);
        let mut keys = Vec::new();
        while let Some(index) = dfs.next(&self.graph) {
            if index != *start {
                keys.push(self.graph[index].clone());
            }
        }
        keys.sort();
        keys
    }

    /// Always false for graphs built through [`register`](Self::register)
    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referenced_by_and_references_of() {
        let mut graph = ReferenceGraph::new();
        graph.register("common", 1, &[]).unwrap();
        graph
            .register("events", 1, &[SchemaReference::new("common.proto", "common", 1)])
            .unwrap();
        graph
            .register("events", 2, &[SchemaReference::new("common.proto", "common", 1)])
            .unwrap();

        assert_eq!(
            graph.referenced_by("common", 1),
            vec![SchemaKey::new("events", 1), SchemaKey::new("events", 2)]
        );
        assert_eq!(graph.references_of("events", 2), vec![SchemaKey::new("common", 1)]);
        assert!(graph.referenced_by("common", 2).is_empty());
        assert!(!graph.has_cycles());
    }

    #[test]
    fn test_transitive_references() {
        let mut graph = ReferenceGraph::new();
        graph.register("b", 1, &[SchemaReference::new("c", "c", 1)]).unwrap();
        graph.register("a", 1, &[SchemaReference::new("b", "b", 1)]).unwrap();
        assert_eq!(
            graph.transitive_references("a", 1),
            vec![SchemaKey::new("b", 1), SchemaKey::new("c", 1)]
        );
    }

    #[test]
    fn test_cycles_are_rejected() {
        let mut graph = ReferenceGraph::new();
        graph.register("a", 1, &[SchemaReference::new("b", "b", 1)]).unwrap();
        let err = graph
            .register("b", 1, &[SchemaReference::new("a", "a", 1)])
            .unwrap_err();
        assert!(matches!(err, CompatError::ReferenceCycle(_)));
        assert!(graph.references_of("b", 1).is_empty());
        assert!(!graph.has_cycles());
    }
}
