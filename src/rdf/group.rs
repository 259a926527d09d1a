//! Grouping of statements by subject.

use std::collections::{HashMap, HashSet};

use crate::constants::PRIVATE_HASH_SUBJECT_PREFIX;
use crate::error::RdfResult;

use super::nquads::parse_quad_at;
use super::term::Term;

/// The grouping key of a subject: `<iri>`, `_:label`, or `<<s p o>>`.
pub fn subject_key(subject: &Term) -> String {
    subject.to_string()
}

/// Group statements by subject.
///
/// Groups appear in first-seen subject order, or in code-point order of the
/// subject key when `sort` is set. Statements keep their relative input order
/// within a group and are re-rendered as `subject predicate object .`; graph
/// labels are not carried over. A malformed statement fails the whole call.
pub fn group_nquads_by_subject<S: AsRef<str>>(quads: &[S], sort: bool) -> RdfResult<Vec<Vec<String>>> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (line_number, statement) in statements(quads) {
        let quad = parse_quad_at(statement, line_number)?;
        let key = subject_key(&quad.subject);
        let rendered = format!("{key} {} {} .", quad.predicate, quad.object);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(rendered);
    }

    if sort {
        groups.sort_by(|a, b| a.0.cmp(&b.0));
    }
    Ok(groups.into_iter().map(|(_, group)| group).collect())
}

/// Concatenate groups back into one statement list.
pub fn flatten_groups(groups: Vec<Vec<String>>) -> Vec<String> {
    groups.into_iter().flatten().collect()
}

/// Number of distinct subjects, excluding generated private-hash subjects.
pub fn count_distinct_subjects<S: AsRef<str>>(quads: &[S]) -> RdfResult<usize> {
    let hash_prefix = format!("<{PRIVATE_HASH_SUBJECT_PREFIX}");
    let mut subjects = HashSet::new();
    for (line_number, statement) in statements(quads) {
        let key = subject_key(&parse_quad_at(statement, line_number)?.subject);
        if !key.starts_with(&hash_prefix) {
            subjects.insert(key);
        }
    }
    Ok(subjects.len())
}

/// Non-empty statements with their 1-based position in `quads`.
fn statements<S: AsRef<str>>(quads: &[S]) -> impl Iterator<Item = (usize, &str)> {
    quads
        .iter()
        .enumerate()
        .map(|(i, q)| (i + 1, q.as_ref().trim()))
        .filter(|(_, q)| !q.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RdfError;

    const A1: &str = "<http://example.org/a> <http://example.org/p> \"1\" .";
    const B1: &str = "<http://example.org/b> <http://example.org/p> \"2\" .";
    const A2: &str = "<http://example.org/a> <http://example.org/q> <http://example.org/b> .";

    #[test]
    fn groups_in_first_seen_order() {
        let groups = group_nquads_by_subject(&[B1, A1, A2], false).unwrap();
        assert_eq!(groups, vec![vec![B1.to_string()], vec![A1.to_string(), A2.to_string()]]);
    }

    #[test]
    fn sorted_groups_keep_statement_order() {
        let groups = group_nquads_by_subject(&[B1, A2, A1], true).unwrap();
        assert_eq!(groups, vec![vec![A2.to_string(), A1.to_string()], vec![B1.to_string()]]);
    }

    #[test]
    fn literal_language_and_datatype_survive() {
        let tagged = "<http://example.org/a> <http://example.org/p> \"Hallo\"@de .";
        let typed = "<http://example.org/a> <http://example.org/p> \"5\"^^<http://www.w3.org/2001/XMLSchema#integer> .";
        let groups = group_nquads_by_subject(&[tagged, typed], true).unwrap();
        assert_eq!(groups, vec![vec![tagged.to_string(), typed.to_string()]]);
    }

    #[test]
    fn quoted_triple_subjects_form_their_own_group() {
        let quoted = "<< <http://example.org/a> <http://example.org/p> \"1\" >> <http://example.org/source> <http://example.org/doc> .";
        let groups = group_nquads_by_subject(&[A1, quoted], true).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups[1][0],
            "<<<http://example.org/a> <http://example.org/p> \"1\">> <http://example.org/source> <http://example.org/doc> ."
        );
    }

    #[test]
    fn grouping_preserves_every_statement() {
        let input = [A1, B1, A2, B1];
        let groups = group_nquads_by_subject(&input, true).unwrap();
        let mut flat = flatten_groups(groups);
        let mut expected: Vec<String> = input.iter().map(|s| s.to_string()).collect();
        flat.sort();
        expected.sort();
        assert_eq!(flat, expected);
    }

    #[test]
    fn malformed_statement_reports_position() {
        let err = group_nquads_by_subject(&[A1, "<http://example.org/a> broken"], false).unwrap_err();
        assert!(matches!(err, RdfError::Syntax { line: 2, .. }));
    }

    #[test]
    fn distinct_subjects_skip_private_hash_subjects() {
        let orphan = format!(
            "<{PRIVATE_HASH_SUBJECT_PREFIX}0xabc> <http://example.org/p> <uuid:1> ."
        );
        assert_eq!(count_distinct_subjects(&[A1, A2, B1, orphan.as_str()]).unwrap(), 2);
    }
}
