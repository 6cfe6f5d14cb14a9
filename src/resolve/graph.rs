//! Dependency graph over task reference names.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{ErrorKind, TranslateError};

/// One producer→consumer data edge. `field_path` is the consumed output
/// field, dot-joined (empty for whole-output references).
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyEdge {
    pub field_path: String,
}

/// Directed graph of data dependencies. Node weights are task reference
/// names; an edge from `a` to `b` means `b` consumes an output of `a`.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    pub graph: DiGraph<String, DependencyEdge>,
    node_indices: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, reference: &str) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(reference) {
            return idx;
        }
        let idx = self.graph.add_node(reference.to_string());
        self.node_indices.insert(reference.to_string(), idx);
        idx
    }

    /// Record an edge, skipping exact duplicates.
    pub fn add_edge(&mut self, producer: &str, consumer: &str, field_path: String) {
        let from = self.node(producer);
        let to = self.node(consumer);
        let exists = self
            .graph
            .edges_connecting(from, to)
            .any(|e| e.weight().field_path == field_path);
        if !exists {
            self.graph.add_edge(from, to, DependencyEdge { field_path });
        }
    }

    /// Edges as `(producer, consumer, field_path)` triples, for inspection.
    pub fn edges(&self) -> Vec<(String, String, String)> {
        self.graph
            .edge_indices()
            .filter_map(|e| {
                let (from, to) = self.graph.edge_endpoints(e)?;
                Some((
                    self.graph[from].clone(),
                    self.graph[to].clone(),
                    self.graph[e].field_path.clone(),
                ))
            })
            .collect()
    }

    /// Reject cycles. The scoped resolution walk already forbids forward
    /// references, so this is the terminal check for anything it missed.
    pub fn check_acyclic(&self) -> Result<(), TranslateError> {
        match toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => {
                let task = self.graph[cycle.node_id()].clone();
                Err(TranslateError::resolve(
                    ErrorKind::CyclicDependency,
                    format!("Data dependencies form a cycle through task '{}'", task),
                    Some(task),
                    None,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_edges_collapse() {
        let mut g = DependencyGraph::new();
        g.add_edge("t1", "t2", "y".to_string());
        g.add_edge("t1", "t2", "y".to_string());
        g.add_edge("t1", "t2", "z".to_string());
        assert_eq!(g.graph.edge_count(), 2);
    }

    #[test]
    fn cycle_detected() {
        let mut g = DependencyGraph::new();
        g.add_edge("t1", "t2", "a".to_string());
        g.add_edge("t2", "t1", "b".to_string());
        let err = g.check_acyclic().unwrap_err();
        assert_eq!(err.kind, ErrorKind::CyclicDependency);
    }

    #[test]
    fn linear_chain_is_acyclic() {
        let mut g = DependencyGraph::new();
        g.add_edge("t1", "t2", "a".to_string());
        g.add_edge("t2", "t3", "b".to_string());
        assert!(g.check_acyclic().is_ok());
    }
}
