//! RDF handling: term model, N-Quads codec, canonicalization, and the
//! statement-level transforms used when assembling a knowledge collection.

pub mod blank;
pub mod canon;
pub mod group;
pub mod normalize;
pub mod nquads;
pub mod sparql;
pub mod term;

pub use blank::{BlankNodeResolver, generate_missing_ids_for_blank_nodes, generate_named_node};
pub use canon::{canonicalize, canonicalize_with_limit};
pub use group::{count_distinct_subjects, flatten_groups, group_nquads_by_subject, subject_key};
pub use normalize::{
    InputFormat, normalize_dataset, normalize_dataset_with_limit, normalize_json_ld, normalize_nquads,
    to_json_ld,
};
pub use nquads::{parse_nquads, parse_quad};
pub use sparql::{QueryType, query_type};
pub use term::{Literal, Quad, Term, Triple};
