//! Linking of private subjects to the public graph.
//!
//! A private subject never appears in clear text in the public quads. Either
//! its public twin group gets a `representsPrivateResource` statement, or a
//! subject derived from `sha256(subject)` stands in for it.

use std::collections::BTreeMap;

use crate::constants::{PRIVATE_HASH_SUBJECT_PREFIX, PRIVATE_RESOURCE_PREDICATE};
use crate::error::RdfResult;
use crate::hash::{Packed, solidity_sha256, to_hex_prefixed};
use crate::rdf::{generate_named_node, parse_quad, subject_key};

/// Public groups after linking, plus the orphan statements that were
/// appended to them as singleton groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOutcome {
    pub public_groups: Vec<Vec<String>>,
    pub orphans: Vec<String>,
}

/// Insert `triple` into `list` at its lower-bound position and return the index.
///
/// The probe sequence is the classic `(left + right) / 2` bisection shared by
/// every client implementation, so the position is reproducible even when
/// `list` is not fully sorted.
pub fn insert_triple_sorted(list: &mut Vec<String>, triple: String) -> usize {
    let mut left = 0;
    let mut right = list.len();
    while left < right {
        let mid = (left + right) / 2;
        if list[mid] < triple {
            left = mid + 1;
        } else {
            right = mid;
        }
    }
    list.insert(left, triple);
    left
}

/// `0x` + hex sha256 of the subject value (the key without its outer `<>`).
pub fn private_subject_hash(key: &str) -> String {
    let value = key
        .strip_prefix('<')
        .and_then(|k| k.strip_suffix('>'))
        .unwrap_or(key);
    to_hex_prefixed(&solidity_sha256(&[Packed::String(value)]))
}

/// Link private groups into the public groups, generating fresh nodes.
pub fn link(public_groups: Vec<Vec<String>>, private_groups: &[Vec<String>]) -> RdfResult<LinkOutcome> {
    link_with(public_groups, private_groups, &mut generate_named_node)
}

/// [`link`] with an explicit node generator.
pub fn link_with<F>(
    mut public_groups: Vec<Vec<String>>,
    private_groups: &[Vec<String>],
    new_node: &mut F,
) -> RdfResult<LinkOutcome>
where
    F: FnMut() -> String,
{
    let mut public_index: BTreeMap<String, usize> = BTreeMap::new();
    for (index, group) in public_groups.iter().enumerate() {
        if let Some(first) = group.first() {
            public_index
                .entry(group_key(first)?)
                .or_insert(index);
        }
    }

    let mut orphans = Vec::new();
    for group in private_groups {
        let Some(first) = group.first() else {
            continue;
        };
        let key = group_key(first)?;
        let hash = private_subject_hash(&key);
        let node = new_node();

        match public_index.get(&key) {
            Some(&index) => {
                let triple = format!("{key} <{PRIVATE_RESOURCE_PREDICATE}> <{node}> .");
                insert_triple_sorted(&mut public_groups[index], triple);
            }
            None => {
                let triple = format!(
                    "<{PRIVATE_HASH_SUBJECT_PREFIX}{hash}> <{PRIVATE_RESOURCE_PREDICATE}> <{node}> ."
                );
                insert_triple_sorted(&mut orphans, triple);
            }
        }
    }

    public_groups.extend(orphans.iter().map(|triple| vec![triple.clone()]));
    tracing::debug!(
        private_groups = private_groups.len(),
        orphans = orphans.len(),
        "linked private subjects"
    );
    Ok(LinkOutcome {
        public_groups,
        orphans,
    })
}

fn group_key(statement: &str) -> RdfResult<String> {
    Ok(subject_key(&parse_quad(statement)?.subject))
}
