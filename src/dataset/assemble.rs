//! Assembly of content into a knowledge collection.
//!
//! Stages, in order: format (normalize documents), resolve blank nodes, group
//! by subject, commit and link private quads, size check, root. Every stage
//! either succeeds completely or the whole assembly fails.

use serde::Serialize;

use crate::constants::{CHUNK_BYTE_SIZE, MAX_FILE_SIZE, PRIVATE_ASSERTION_PREDICATE};
use crate::error::{DatasetError, DatasetResult};
use crate::merkle::{calculate_merkle_root, calculate_number_of_chunks};
use crate::rdf::canon::DEFAULT_WORK_LIMIT;
use crate::rdf::{
    InputFormat, count_distinct_subjects, flatten_groups, generate_missing_ids_for_blank_nodes,
    generate_named_node, group_nquads_by_subject,
};

use super::link::link_with;
use super::{Content, Dataset, format_dataset};

/// Parameters of one assembly.
#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    pub input_format: InputFormat,
    pub chunk_byte_size: usize,
    pub max_file_size: usize,
    pub canonicalization_work_limit: usize,
    pub epochs: u64,
    pub replication_factor: u32,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            input_format: InputFormat::JsonLd,
            chunk_byte_size: CHUNK_BYTE_SIZE,
            max_file_size: MAX_FILE_SIZE,
            canonicalization_work_limit: DEFAULT_WORK_LIMIT,
            epochs: crate::config::DEFAULT_EPOCHS,
            replication_factor: crate::config::DEFAULT_REPLICATION_FACTOR,
        }
    }
}

/// An assembled knowledge collection, ready to publish.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeCollection {
    /// `0x`-prefixed Merkle root over the final public quads.
    pub dataset_root: String,
    pub dataset: Dataset,
    /// `0x`-prefixed root of the private quads, when there are any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_root: Option<String>,
    pub distinct_subjects: usize,
    /// `chunk_count * chunk_byte_size`.
    pub byte_size: usize,
    pub chunk_count: usize,
    pub epochs: u64,
    pub replication_factor: u32,
}

/// Assemble `content` with freshly generated node identifiers.
pub fn assemble(content: &Content, options: &AssemblyOptions) -> DatasetResult<KnowledgeCollection> {
    assemble_with(content, options, &mut generate_named_node)
}

/// [`assemble`] with an explicit generator for linking and commitment nodes.
/// Blank nodes in the content are still resolved to random `uuid:` IRIs.
pub fn assemble_with<F>(
    content: &Content,
    options: &AssemblyOptions,
    new_node: &mut F,
) -> DatasetResult<KnowledgeCollection>
where
    F: FnMut() -> String,
{
    let formatted = format_dataset(content, options.input_format, options.canonicalization_work_limit)?;
    tracing::debug!(
        public = formatted.public.len(),
        private = formatted.private.as_ref().map_or(0, Vec::len),
        format = %options.input_format,
        "dataset formatted"
    );

    let mut public = generate_missing_ids_for_blank_nodes(&formatted.public)?;
    let private = formatted
        .private
        .as_deref()
        .map(generate_missing_ids_for_blank_nodes)
        .transpose()?
        .filter(|quads| !quads.is_empty());
    tracing::debug!(
        public = public.len(),
        private = private.as_ref().map_or(0, Vec::len),
        "blank node identifiers resolved"
    );

    let (public, private, private_root) = match private {
        Some(private) => {
            let private_groups = group_nquads_by_subject(&private, true)?;
            let private = flatten_groups(private_groups.clone());
            let private_root = calculate_merkle_root(&private, options.chunk_byte_size)?;
            tracing::debug!(
                groups = private_groups.len(),
                quads = private.len(),
                root = %private_root,
                "private quads grouped"
            );

            public.push(format!(
                "<{}> <{PRIVATE_ASSERTION_PREDICATE}> \"{private_root}\" .",
                new_node()
            ));
            let public_groups = group_nquads_by_subject(&public, true)?;
            let linked = link_with(public_groups, &private_groups, new_node)?;
            tracing::debug!(
                groups = linked.public_groups.len(),
                orphans = linked.orphans.len(),
                "public quads linked"
            );
            (flatten_groups(linked.public_groups), Some(private), Some(private_root))
        }
        None => {
            let groups = group_nquads_by_subject(&public, true)?;
            tracing::debug!(groups = groups.len(), "public quads grouped");
            (flatten_groups(groups), None, None)
        }
    };

    if public.is_empty() {
        return Err(DatasetError::Empty);
    }

    let chunk_count = calculate_number_of_chunks(&public, options.chunk_byte_size)?;
    let byte_size = chunk_count * options.chunk_byte_size;
    if byte_size > options.max_file_size {
        return Err(DatasetError::SizeLimit {
            limit_mb: options.max_file_size as f64 / (1024.0 * 1024.0),
            size: byte_size,
        });
    }
    tracing::debug!(chunks = chunk_count, bytes = byte_size, "dataset size validated");

    let dataset_root = calculate_merkle_root(&public, options.chunk_byte_size)?;
    let distinct_subjects = count_distinct_subjects(&public)?;
    tracing::debug!(
        root = %dataset_root,
        subjects = distinct_subjects,
        "knowledge collection assembled"
    );

    Ok(KnowledgeCollection {
        dataset_root,
        dataset: Dataset { public, private },
        private_root,
        distinct_subjects,
        byte_size,
        chunk_count,
        epochs: options.epochs,
        replication_factor: options.replication_factor,
    })
}
