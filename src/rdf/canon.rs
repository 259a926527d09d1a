//! RDF dataset canonicalization (RDFC-1.0, compatible with URDNA2015).
//!
//! Blank nodes are relabelled `_:c14n0`, `_:c14n1`, ... from the structure of
//! the graph alone, so isomorphic datasets serialize to identical, sorted
//! N-Quads regardless of the labels or statement order in the input.
//!
//! Blank nodes nested inside quoted triples take part in hashing at the
//! position of the component that contains them.
//!
//! Symmetric structures make the n-degree step explore every ordering of
//! indistinguishable neighbours. Orderings are produced one at a time and
//! each one is charged against the work limit before it is explored, so a
//! dataset that is too symmetric fails with
//! [`RdfError::CanonicalizationLimit`] instead of exhausting memory.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;

use crate::error::{RdfError, RdfResult};
use crate::hash::sha256;

use super::term::{Quad, Term};

/// Upper bound on n-degree hash invocations plus explored permutations.
///
/// Two anonymous nodes that each link nine indistinguishable anonymous
/// children stay below it.
pub const DEFAULT_WORK_LIMIT: usize = 16_000_000;

const CANONICAL_PREFIX: &str = "c14n";
const TEMPORARY_PREFIX: &str = "b";

/// Canonicalize `quads` and return the sorted, de-duplicated canonical lines.
pub fn canonicalize(quads: &[Quad]) -> RdfResult<Vec<String>> {
    canonicalize_with_limit(quads, DEFAULT_WORK_LIMIT)
}

/// [`canonicalize`] with an explicit work limit.
pub fn canonicalize_with_limit(quads: &[Quad], work_limit: usize) -> RdfResult<Vec<String>> {
    let unique: Vec<Quad> = quads.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
    let mut state = CanonicalizationState::new(&unique, work_limit);
    state.label_blank_nodes()?;
    tracing::debug!(
        quads = unique.len(),
        blank_nodes = state.labels.len(),
        work = state.work,
        "dataset canonicalized"
    );

    let mut lines: Vec<String> = unique
        .iter()
        .map(|quad| quad.map_blank_nodes(&mut |label| state.canonical_term(label)).to_string())
        .collect();
    lines.sort();
    lines.dedup();
    Ok(lines)
}

/// Issues sequential identifiers to blank nodes (by index) and remembers the
/// order they were issued in.
#[derive(Debug, Clone)]
struct IdentifierIssuer {
    prefix: &'static str,
    issued: HashMap<usize, usize>,
    order: Vec<usize>,
}

impl IdentifierIssuer {
    fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            issued: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn issue(&mut self, node: usize) -> usize {
        if let Some(&id) = self.issued.get(&node) {
            return id;
        }
        let id = self.order.len();
        self.issued.insert(node, id);
        self.order.push(node);
        id
    }

    fn get(&self, node: usize) -> Option<usize> {
        self.issued.get(&node).copied()
    }

    fn contains(&self, node: usize) -> bool {
        self.issued.contains_key(&node)
    }

    /// Append `_:<prefix><id>` to `out`.
    fn write_id(&self, id: usize, out: &mut String) {
        let _ = write!(out, "_:{}{id}", self.prefix);
    }
}

struct CanonicalizationState<'a> {
    quads: &'a [Quad],
    /// Blank node labels, sorted. A node is referred to by its index here.
    labels: Vec<String>,
    index: HashMap<String, usize>,
    /// Node → indexes of the quads that mention it.
    mentions: Vec<Vec<usize>>,
    /// Quad → `(position, node)` for every blank node in subject, object or
    /// graph name.
    components: Vec<Vec<(char, usize)>>,
    /// Quad → predicate in N-Quads form.
    predicates: Vec<String>,
    first_degree: Vec<String>,
    canonical: IdentifierIssuer,
    work: usize,
    work_limit: usize,
}

impl<'a> CanonicalizationState<'a> {
    fn new(quads: &'a [Quad], work_limit: usize) -> Self {
        let labels: Vec<String> = quads
            .iter()
            .flat_map(Quad::blank_labels)
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: HashMap<String, usize> = labels
            .iter()
            .enumerate()
            .map(|(node, label)| (label.clone(), node))
            .collect();

        let mut mentions = vec![Vec::new(); labels.len()];
        let mut components = Vec::with_capacity(quads.len());
        let mut predicates = Vec::with_capacity(quads.len());
        for (position_in_dataset, quad) in quads.iter().enumerate() {
            for label in quad.blank_labels() {
                if let Some(&node) = index.get(label) {
                    let entry: &mut Vec<usize> = &mut mentions[node];
                    if entry.last() != Some(&position_in_dataset) {
                        entry.push(position_in_dataset);
                    }
                }
            }

            let mut parts = Vec::new();
            let positions = [
                ('s', Some(&quad.subject)),
                ('o', Some(&quad.object)),
                ('g', quad.graph.as_ref()),
            ];
            for (position, term) in positions {
                let mut found = Vec::new();
                if let Some(term) = term {
                    term.blank_labels(&mut found);
                }
                parts.extend(
                    found
                        .into_iter()
                        .filter_map(|label| index.get(label).map(|&node| (position, node))),
                );
            }
            components.push(parts);
            predicates.push(quad.predicate.to_string());
        }

        Self {
            quads,
            labels,
            index,
            mentions,
            components,
            predicates,
            first_degree: Vec::new(),
            canonical: IdentifierIssuer::new(CANONICAL_PREFIX),
            work: 0,
            work_limit,
        }
    }

    fn canonical_term(&self, label: &str) -> Term {
        match self.index.get(label).and_then(|&node| self.canonical.get(node)) {
            Some(id) => Term::BlankNode(format!("{CANONICAL_PREFIX}{id}")),
            None => Term::BlankNode(label.to_string()),
        }
    }

    fn label_blank_nodes(&mut self) -> RdfResult<()> {
        let first_degree: Vec<String> = (0..self.labels.len())
            .map(|node| self.hash_first_degree(node))
            .collect();
        self.first_degree = first_degree;

        let mut by_hash: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (node, hash) in self.first_degree.iter().enumerate() {
            by_hash.entry(hash.clone()).or_default().push(node);
        }

        // Blank nodes with a unique first-degree hash are labelled directly.
        let mut shared = Vec::new();
        for (_, group) in by_hash {
            if group.len() == 1 {
                self.canonical.issue(group[0]);
            } else {
                shared.push(group);
            }
        }

        for group in shared {
            let mut paths = Vec::new();
            for node in group {
                if self.canonical.contains(node) {
                    continue;
                }
                let mut issuer = IdentifierIssuer::new(TEMPORARY_PREFIX);
                issuer.issue(node);
                paths.push(self.hash_n_degree(node, issuer)?);
            }
            paths.sort_by(|a, b| a.0.cmp(&b.0));
            for (_, issuer) in paths {
                for node in issuer.order {
                    self.canonical.issue(node);
                }
            }
        }
        Ok(())
    }

    fn hash_first_degree(&self, node: usize) -> String {
        let label = self.labels[node].as_str();
        let mut lines: Vec<String> = self.mentions[node]
            .iter()
            .map(|&index| {
                let mut line = self.quads[index]
                    .map_blank_nodes(&mut |other| {
                        Term::blank(if other == label { "a" } else { "z" })
                    })
                    .to_string();
                line.push('\n');
                line
            })
            .collect();
        lines.sort();
        hex::encode(sha256(lines.concat().as_bytes()))
    }

    fn hash_related(&self, related: usize, predicate: &str, issuer: &IdentifierIssuer, position: char) -> String {
        let mut input = String::new();
        input.push(position);
        if position != 'g' {
            input.push_str(predicate);
        }
        if let Some(id) = self.canonical.get(related) {
            self.canonical.write_id(id, &mut input);
        } else if let Some(id) = issuer.get(related) {
            issuer.write_id(id, &mut input);
        } else {
            input.push_str(&self.first_degree[related]);
        }
        hex::encode(sha256(input.as_bytes()))
    }

    fn charge(&mut self) -> RdfResult<()> {
        self.work += 1;
        if self.work > self.work_limit {
            return Err(RdfError::CanonicalizationLimit {
                limit: self.work_limit,
            });
        }
        Ok(())
    }

    fn hash_n_degree(
        &mut self,
        node: usize,
        mut issuer: IdentifierIssuer,
    ) -> RdfResult<(String, IdentifierIssuer)> {
        self.charge()?;

        let mut related_by_hash: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for &index in &self.mentions[node] {
            for &(position, related) in &self.components[index] {
                if related == node {
                    continue;
                }
                let hash = self.hash_related(related, &self.predicates[index], &issuer, position);
                related_by_hash.entry(hash).or_default().push(related);
            }
        }

        let mut data = String::new();
        for (related_hash, related) in related_by_hash {
            data.push_str(&related_hash);
            let mut chosen_path = String::new();
            let mut chosen_issuer: Option<IdentifierIssuer> = None;

            let mut permutations = Permutations::new(related.len());
            'permutations: while let Some(order) = permutations.next_order() {
                self.charge()?;
                let mut issuer_copy = issuer.clone();
                let mut path = String::new();
                let mut recursion = Vec::new();

                for &slot in order {
                    let member = related[slot];
                    if let Some(id) = self.canonical.get(member) {
                        self.canonical.write_id(id, &mut path);
                    } else {
                        if !issuer_copy.contains(member) {
                            recursion.push(member);
                        }
                        let id = issuer_copy.issue(member);
                        issuer_copy.write_id(id, &mut path);
                    }
                    if exceeds(&path, &chosen_path) {
                        continue 'permutations;
                    }
                }

                for member in recursion {
                    let (hash, result_issuer) = self.hash_n_degree(member, issuer_copy.clone())?;
                    let id = issuer_copy.issue(member);
                    issuer_copy.write_id(id, &mut path);
                    path.push('<');
                    path.push_str(&hash);
                    path.push('>');
                    issuer_copy = result_issuer;
                    if exceeds(&path, &chosen_path) {
                        continue 'permutations;
                    }
                }

                if chosen_path.is_empty() || path < chosen_path {
                    chosen_path = path;
                    chosen_issuer = Some(issuer_copy);
                }
            }

            data.push_str(&chosen_path);
            if let Some(chosen) = chosen_issuer {
                issuer = chosen;
            }
        }

        Ok((hex::encode(sha256(data.as_bytes())), issuer))
    }
}

/// A candidate path can be abandoned once it sorts after the chosen one.
fn exceeds(path: &str, chosen: &str) -> bool {
    !chosen.is_empty() && path.len() >= chosen.len() && path > chosen
}

/// Orderings of `0..len` in lexicographic order, one at a time.
struct Permutations {
    order: Vec<usize>,
    started: bool,
}

impl Permutations {
    fn new(len: usize) -> Self {
        Self {
            order: (0..len).collect(),
            started: false,
        }
    }

    fn next_order(&mut self) -> Option<&[usize]> {
        if self.started && !advance(&mut self.order) {
            return None;
        }
        self.started = true;
        Some(&self.order)
    }
}

/// Rearrange `order` into the next lexicographic permutation in place.
/// Returns `false`, leaving `order` untouched, when it is already the last.
fn advance(order: &mut [usize]) -> bool {
    let Some(pivot) = order.windows(2).rposition(|pair| pair[0] < pair[1]) else {
        return false;
    };
    let Some(successor) = order.iter().rposition(|&value| value > order[pivot]) else {
        return false;
    };
    order.swap(pivot, successor);
    order[pivot + 1..].reverse();
    true
}
