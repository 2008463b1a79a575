//! Schema Inheritance Graph
//!
//! petgraph `DiGraph` with one edge from each schema to each of its direct
//! bases. Cycles are found with SCCs; precedence order comes from C3
//! linearization so that a shared ancestor is always ranked after every
//! schema that inherits from it.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef, Reversed};
use std::collections::{HashMap, VecDeque};

use super::{Schema, SchemaUri};
use crate::error::{Result, WrmlError};

/// Base-schema graph over a set of loaded schemas
#[derive(Debug, Clone, Default)]
pub struct InheritanceGraph {
    graph: DiGraph<SchemaUri, ()>,
    node_indices: HashMap<SchemaUri, NodeIndex>,
    /// Declared bases per schema, in precedence order (including unknown ones)
    bases: HashMap<SchemaUri, Vec<SchemaUri>>,
}

impl InheritanceGraph {
    /// Build the graph from schema declarations
    pub fn from_schemas<'a>(schemas: impl IntoIterator<Item = &'a Schema>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();
        let mut bases = HashMap::new();

        for schema in schemas {
            let idx = graph.add_node(schema.uri.clone());
            node_indices.insert(schema.uri.clone(), idx);
            bases.insert(schema.uri.clone(), schema.base_schema_uris.clone());
        }

        for (uri, declared) in &bases {
            let from = node_indices[uri];
            for base in declared {
                if let Some(&to) = node_indices.get(base) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        Self {
            graph,
            node_indices,
            bases,
        }
    }

    pub fn schema_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.node_indices.contains_key(uri)
    }

    /// Direct bases of a schema in declared order
    pub fn direct_bases(&self, uri: &str) -> &[SchemaUri] {
        self.bases.get(uri).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Declared bases that are not loaded
    pub fn missing_bases(&self) -> Vec<(&SchemaUri, &SchemaUri)> {
        let mut missing: Vec<_> = self
            .bases
            .iter()
            .flat_map(|(uri, bases)| bases.iter().map(move |b| (uri, b)))
            .filter(|(_, base)| !self.node_indices.contains_key(*base))
            .collect();
        missing.sort();
        missing
    }

    /// All inheritance cycles: multi-member SCCs plus self-referencing schemas
    pub fn cycles(&self) -> Vec<Vec<SchemaUri>> {
        let mut cycles: Vec<Vec<SchemaUri>> = kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1
                    || self
                        .graph
                        .edges(scc[0])
                        .any(|edge| edge.target() == scc[0])
            })
            .map(|scc| {
                let mut members: Vec<SchemaUri> = scc
                    .into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx).cloned())
                    .collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// C3 linearization: the schema itself first, then its ancestors in
    /// precedence order.
    pub fn linearize(&self, uri: &str) -> Result<Vec<SchemaUri>> {
        let mut memo = HashMap::new();
        let mut path = Vec::new();
        self.linearize_inner(uri, &mut memo, &mut path)
    }

    fn linearize_inner(
        &self,
        uri: &str,
        memo: &mut HashMap<SchemaUri, Vec<SchemaUri>>,
        path: &mut Vec<SchemaUri>,
    ) -> Result<Vec<SchemaUri>> {
        if let Some(done) = memo.get(uri) {
            return Ok(done.clone());
        }

        if let Some(pos) = path.iter().position(|p| p == uri) {
            let mut members = path[pos..].to_vec();
            members.push(uri.to_string());
            return Err(WrmlError::InheritanceCycle { members });
        }

        let bases = self
            .bases
            .get(uri)
            .ok_or_else(|| WrmlError::SchemaNotFound(uri.to_string()))?;

        path.push(uri.to_string());
        let mut sequences: Vec<VecDeque<SchemaUri>> = Vec::with_capacity(bases.len() + 1);
        for base in bases {
            sequences.push(self.linearize_inner(base, memo, path)?.into());
        }
        path.pop();
        sequences.push(bases.iter().cloned().collect());

        let mut result = vec![uri.to_string()];
        c3_merge(uri, sequences, &mut result)?;

        memo.insert(uri.to_string(), result.clone());
        Ok(result)
    }

    /// Every schema the given one inherits from, nearest first
    pub fn ancestors(&self, uri: &str) -> Vec<SchemaUri> {
        let Some(&start) = self.node_indices.get(uri) else {
            return Vec::new();
        };

        let mut result = Vec::new();
        let mut bfs = Bfs::new(&self.graph, start);
        while let Some(idx) = bfs.next(&self.graph) {
            if idx != start {
                result.push(self.graph[idx].clone());
            }
        }
        result
    }

    /// Every schema that inherits from the given one, nearest first
    pub fn descendants(&self, uri: &str) -> Vec<SchemaUri> {
        let Some(&start) = self.node_indices.get(uri) else {
            return Vec::new();
        };

        let reversed = Reversed(&self.graph);
        let mut result = Vec::new();
        let mut bfs = Bfs::new(reversed, start);
        while let Some(idx) = bfs.next(reversed) {
            if idx != start {
                result.push(self.graph[idx].clone());
            }
        }
        result
    }

    /// Export the inheritance graph to GraphViz DOT format
    pub fn to_dot(&self) -> String {
        let mut output = String::new();

        output.push_str("digraph Inheritance {\n");
        output.push_str("  rankdir=BT;\n");
        output.push_str("  node [shape=box, style=\"rounded\", fontname=\"Helvetica\", fontsize=10];\n");
        output.push_str("  edge [arrowhead=empty];\n\n");

        let mut uris: Vec<&SchemaUri> = self.node_indices.keys().collect();
        uris.sort();

        for uri in &uris {
            let label = uri.rsplit('/').next().unwrap_or(uri);
            output.push_str(&format!("  \"{}\" [label=\"{}\"];\n", uri, label));
        }

        output.push('\n');

        for uri in &uris {
            for base in self.direct_bases(uri) {
                if self.contains(base) {
                    output.push_str(&format!("  \"{}\" -> \"{}\";\n", uri, base));
                }
            }
        }

        output.push_str("}\n");
        output
    }
}

/// Merge step of C3: repeatedly take the first head that appears in no tail
fn c3_merge(
    uri: &str,
    mut sequences: Vec<VecDeque<SchemaUri>>,
    out: &mut Vec<SchemaUri>,
) -> Result<()> {
    loop {
        sequences.retain(|s| !s.is_empty());
        if sequences.is_empty() {
            return Ok(());
        }

        let next = sequences
            .iter()
            .map(|s| &s[0])
            .find(|head| {
                !sequences
                    .iter()
                    .any(|s| s.iter().skip(1).any(|item| item == *head))
            })
            .cloned()
            .ok_or_else(|| WrmlError::InconsistentHierarchy(uri.to_string()))?;

        for seq in sequences.iter_mut() {
            if seq.front() == Some(&next) {
                seq.pop_front();
            }
        }
        out.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(uri: &str, bases: &[&str]) -> Schema {
        let mut s = Schema::new(uri);
        s.base_schema_uris = bases.iter().map(|b| b.to_string()).collect();
        s
    }

    #[test]
    fn test_diamond_linearization() {
        let schemas = vec![
            schema("D", &[]),
            schema("B", &["D"]),
            schema("C", &["D"]),
            schema("A", &["B", "C"]),
        ];
        let graph = InheritanceGraph::from_schemas(&schemas);

        assert_eq!(graph.linearize("A").unwrap(), vec!["A", "B", "C", "D"]);
        assert_eq!(graph.linearize("D").unwrap(), vec!["D"]);
        assert!(graph.cycles().is_empty());
    }

    #[test]
    fn test_inconsistent_order_rejected() {
        let schemas = vec![
            schema("X", &[]),
            schema("Y", &[]),
            schema("A", &["X", "Y"]),
            schema("B", &["Y", "X"]),
            schema("Z", &["A", "B"]),
        ];
        let graph = InheritanceGraph::from_schemas(&schemas);
        assert!(matches!(
            graph.linearize("Z"),
            Err(WrmlError::InconsistentHierarchy(_))
        ));
    }

    #[test]
    fn test_cycle_detected() {
        let schemas = vec![
            schema("A", &["B"]),
            schema("B", &["C"]),
            schema("C", &["A"]),
            schema("Leaf", &["A"]),
        ];
        let graph = InheritanceGraph::from_schemas(&schemas);

        match graph.linearize("Leaf") {
            Err(WrmlError::InheritanceCycle { members }) => {
                assert_eq!(members, vec!["A", "B", "C", "A"]);
            }
            other => panic!("Expected cycle, got {:?}", other),
        }
        assert_eq!(graph.cycles(), vec![vec!["A".to_string(), "B".into(), "C".into()]]);
    }

    #[test]
    fn test_missing_base() {
        let schemas = vec![schema("A", &["Ghost"])];
        let graph = InheritanceGraph::from_schemas(&schemas);
        assert!(matches!(graph.linearize("A"), Err(WrmlError::SchemaNotFound(ref u)) if u == "Ghost"));
        assert_eq!(graph.missing_bases().len(), 1);
    }

    #[test]
    fn test_closures() {
        let schemas = vec![
            schema("Root", &[]),
            schema("Mid", &["Root"]),
            schema("Leaf", &["Mid"]),
        ];
        let graph = InheritanceGraph::from_schemas(&schemas);
        assert_eq!(graph.ancestors("Leaf"), vec!["Mid", "Root"]);
        assert_eq!(graph.descendants("Root"), vec!["Mid", "Leaf"]);
        assert!(graph.to_dot().contains("\"Leaf\" -> \"Mid\""));
    }
}
