//! Replacement of blank nodes with generated named nodes.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::constants::GENERATED_NODE_PREFIX;
use crate::error::{RdfError, RdfResult};

use super::nquads::parse_lines;
use super::term::{Quad, Term};

/// A fresh `uuid:<v4>` IRI, without angle brackets.
pub fn generate_named_node() -> String {
    format!("{GENERATED_NODE_PREFIX}{}", Uuid::new_v4())
}

/// Maps blank node labels to named nodes, one fresh node per distinct label.
///
/// A resolver is scoped to one dataset: the same label always maps to the same
/// node within it, and never leaks into another dataset.
#[derive(Debug, Default)]
pub struct BlankNodeResolver {
    generated: HashMap<String, String>,
}

impl BlankNodeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, quad: &Quad) -> Quad {
        quad.map_blank_nodes(&mut |label| Term::Iri(self.node_for(label)))
    }

    fn node_for(&mut self, label: &str) -> String {
        self.generated
            .entry(label.to_string())
            .or_insert_with(generate_named_node)
            .clone()
    }

    /// Number of distinct blank nodes resolved so far.
    pub fn len(&self) -> usize {
        self.generated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generated.is_empty()
    }
}

/// Replace every blank node in `quads` (including inside quoted triples) with a
/// generated `uuid:` IRI.
///
/// Output keeps input order and drops exact duplicates. Quads carrying a graph
/// label are rejected, since a knowledge collection has no named graphs.
pub fn generate_missing_ids_for_blank_nodes<S: AsRef<str>>(quads: &[S]) -> RdfResult<Vec<String>> {
    let parsed = parse_lines(quads)?;

    let named_graph: Vec<String> = parsed
        .iter()
        .filter(|q| !q.in_default_graph())
        .map(Quad::to_string)
        .collect();
    if !named_graph.is_empty() {
        return Err(RdfError::UnsupportedJsonLd { quads: named_graph });
    }

    let mut resolver = BlankNodeResolver::new();
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(parsed.len());
    for quad in &parsed {
        let line = resolver.resolve(quad).to_string();
        if seen.insert(line.clone()) {
            out.push(line);
        }
    }
    if !resolver.is_empty() {
        tracing::debug!(blank_nodes = resolver.len(), "replaced blank nodes with generated IRIs");
    }
    Ok(out)
}
