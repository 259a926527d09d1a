//! Rich diagnostic error types for the DKG client.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers know exactly what
//! went wrong and whether retrying can help.

// Fields such as `CanonicalizationLimit::limit` are only read by the derived
// Display and Diagnostic impls, which the lint does not see.
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the DKG client.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum DkgError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Rdf(#[from] RdfError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ual(#[from] UalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// RDF errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RdfError {
    #[error("dataset input format isn't supported: {format}")]
    #[diagnostic(
        code(dkg::rdf::unsupported_format),
        help("Supported formats: JSON-LD / N-Quads (case-insensitive, with or without the dash).")
    )]
    UnsupportedFormat { format: String },

    #[error("N-Quads syntax error on line {line}, column {column}: {message}")]
    #[diagnostic(
        code(dkg::rdf::syntax),
        help(
            "Each line must hold exactly one statement: \
             `<subject> <predicate> object [graph] .`"
        )
    )]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("JSON-LD parse error: {message}")]
    #[diagnostic(
        code(dkg::rdf::json_ld),
        help(
            "The document could not be expanded to RDF. Remote @context URLs are not \
             fetched; inline the context or pass N-Quads instead."
        )
    )]
    JsonLd { message: String },

    #[error("unsupported JSON-LD input, named graphs are not allowed: {}", quads.join(" | "))]
    #[diagnostic(
        code(dkg::rdf::unsupported_json_ld),
        help(
            "The DKG dataset format has no concept of custom named graphs. \
             Remove nested @graph blocks that carry an @id, or flatten them into the default graph."
        )
    )]
    UnsupportedJsonLd { quads: Vec<String> },

    #[error("invalid dataset: {message}")]
    #[diagnostic(
        code(dkg::rdf::invalid_dataset),
        help("Check that the input is non-empty and well-formed JSON-LD or N-Quads.")
    )]
    InvalidDataset { message: String },

    #[error("canonicalization exceeded {limit} n-degree hash steps")]
    #[diagnostic(
        code(dkg::rdf::canonicalization_limit),
        help(
            "The dataset contains a large, highly symmetric blank node structure. \
             Give the blank nodes IRIs, split the dataset, or raise \
             `dataset.canonicalization_work_limit`."
        )
    )]
    CanonicalizationLimit { limit: usize },

    #[error("RDF serialization failed: {message}")]
    #[diagnostic(
        code(dkg::rdf::serialize),
        help("The quads could not be written in the requested output format.")
    )]
    Serialize { message: String },

    #[error("invalid SPARQL query: {message}")]
    #[diagnostic(
        code(dkg::rdf::query),
        help("Only SELECT, CONSTRUCT, DESCRIBE and ASK queries are sent to the node.")
    )]
    Query { message: String },
}

/// Result type for RDF operations.
pub type RdfResult<T> = std::result::Result<T, RdfError>;

// ---------------------------------------------------------------------------
// Merkle errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum MerkleError {
    #[error("cannot compute a Merkle root over zero chunks")]
    #[diagnostic(
        code(dkg::merkle::empty),
        help("Provide at least one non-empty quad before computing the dataset root.")
    )]
    Empty,

    #[error("chunk size must be greater than zero")]
    #[diagnostic(
        code(dkg::merkle::zero_chunk_size),
        help("Use the network chunk size (32 bytes) unless the target network says otherwise.")
    )]
    ZeroChunkSize,

    #[error("leaf index {index} is out of range for a tree of {leaves} leaves")]
    #[diagnostic(
        code(dkg::merkle::leaf_out_of_range),
        help("Proofs can only be built for existing chunk indexes.")
    )]
    LeafOutOfRange { index: usize, leaves: usize },
}

/// Result type for Merkle operations.
pub type MerkleResult<T> = std::result::Result<T, MerkleError>;

// ---------------------------------------------------------------------------
// Dataset errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DatasetError {
    #[error("invalid dataset: no quads were extracted from public or private content")]
    #[diagnostic(
        code(dkg::dataset::empty),
        help("A knowledge collection needs at least one public or private quad.")
    )]
    Empty,

    #[error("file size limit is {limit_mb}MB (dataset needs {size} bytes)")]
    #[diagnostic(
        code(dkg::dataset::size_limit),
        help("Split the content into several knowledge collections or remove triples.")
    )]
    SizeLimit { limit_mb: f64, size: usize },

    #[error("invalid content: {message}")]
    #[diagnostic(
        code(dkg::dataset::invalid_content),
        help(
            "Content must be an N-Quads string, a JSON-LD document, or an object with \
             `public` and/or `private` parts."
        )
    )]
    InvalidContent { message: String },

    #[error("private assertion root mismatch: committed {expected}, computed {actual}")]
    #[diagnostic(
        code(dkg::dataset::root_mismatch),
        help(
            "The private triples returned by the node do not match the root committed in \
             the public graph. Retry against another node."
        )
    )]
    RootMismatch { expected: String, actual: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Rdf(#[from] RdfError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Merkle(#[from] MerkleError),
}

/// Result type for dataset assembly.
pub type DatasetResult<T> = std::result::Result<T, DatasetError>;

// ---------------------------------------------------------------------------
// UAL (validation) errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum UalError {
    #[error("invalid UAL {ual}: missing `did:dkg:` prefix")]
    #[diagnostic(
        code(dkg::ual::prefix),
        help("A UAL looks like did:dkg:<network>/<contract-address>/<collection-id>[/<asset-id>].")
    )]
    MissingPrefix { ual: String },

    #[error("invalid UAL {ual}: expected 3 or 4 segments, found {segments}")]
    #[diagnostic(
        code(dkg::ual::segments),
        help("A UAL looks like did:dkg:<network>/<contract-address>/<collection-id>[/<asset-id>].")
    )]
    SegmentCount { ual: String, segments: usize },

    #[error("invalid contract address: {address}")]
    #[diagnostic(
        code(dkg::ual::address),
        help("Contract addresses are 20-byte hex strings, optionally 0x-prefixed.")
    )]
    Address { address: String },

    #[error("invalid token id: {value}")]
    #[diagnostic(
        code(dkg::ual::token_id),
        help("Knowledge collection and asset ids are unsigned decimal integers.")
    )]
    TokenId { value: String },
}

/// Result type for UAL validation.
pub type UalResult<T> = std::result::Result<T, UalError>;

// ---------------------------------------------------------------------------
// Node errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    #[error("node request failed: {message}")]
    #[diagnostic(
        code(dkg::node::request),
        help("Is the node reachable? Check the endpoint, port and auth token.")
    )]
    Request { message: String },

    #[error("node responded with HTTP {status}: {message}")]
    #[diagnostic(
        code(dkg::node::status),
        help("The node rejected the request. Inspect the response body for details.")
    )]
    Status { status: u16, message: String },

    #[error("unexpected response from node: {message}")]
    #[diagnostic(code(dkg::node::response), help("Node API version mismatch?"))]
    Response { message: String },

    #[error("{operation} operation {operation_id} failed: {message}")]
    #[diagnostic(
        code(dkg::node::operation_failed),
        help("The network reported a terminal failure. Retrying the same payload will not help.")
    )]
    OperationFailed {
        operation: String,
        operation_id: String,
        message: String,
    },

    #[error("{operation} operation {operation_id} not finished after {attempts} attempts (last status: {last_status})")]
    #[diagnostic(
        code(dkg::node::retries_exhausted),
        help("Increase max_number_of_retries or frequency, or check the node's health.")
    )]
    RetriesExhausted {
        operation: String,
        operation_id: String,
        attempts: u32,
        last_status: String,
    },
}

/// Result type for node operations.
pub type NodeResult<T> = std::result::Result<T, NodeError>;

// ---------------------------------------------------------------------------
// Chain errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ChainError {
    #[error("blockchain call {method} failed: {message}")]
    #[diagnostic(
        code(dkg::chain::call),
        help("Check the RPC endpoint, the hub address and the account balance.")
    )]
    Call { method: String, message: String },

    #[error("malformed signature: {message}")]
    #[diagnostic(
        code(dkg::chain::signature),
        help("Node signatures carry r, vs (or s + v) as 0x-prefixed hex.")
    )]
    Signature { message: String },
}

/// Result type for blockchain operations.
pub type ChainResult<T> = std::result::Result<T, ChainError>;

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    #[diagnostic(
        code(dkg::config::read),
        help("Check that the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(dkg::config::parse),
        help("The config file must be valid TOML. Unknown keys are rejected.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config {path}: {source}")]
    #[diagnostic(
        code(dkg::config::write),
        help("Check that the parent directory is writable.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown environment: {name}")]
    #[diagnostic(
        code(dkg::config::unknown_environment),
        help("Valid environments: development, devnet, testnet, mainnet.")
    )]
    UnknownEnvironment { name: String },

    #[error("unknown network {blockchain} in environment {environment}")]
    #[diagnostic(
        code(dkg::config::unknown_network),
        help("Register the network in the NetworkTable or pick a built-in one.")
    )]
    UnknownNetwork {
        environment: String,
        blockchain: String,
    },
}

/// Result type for configuration handling.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Convenience alias for functions returning DKG client results.
pub type DkgResult<T> = std::result::Result<T, DkgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rdf_error_converts_to_dkg_error() {
        let err = RdfError::UnsupportedFormat {
            format: "turtle".into(),
        };
        let dkg: DkgError = err.into();
        assert!(matches!(
            dkg,
            DkgError::Rdf(RdfError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn dataset_error_wraps_merkle_error() {
        let dataset: DatasetError = MerkleError::Empty.into();
        assert!(matches!(dataset, DatasetError::Merkle(MerkleError::Empty)));
    }

    #[test]
    fn size_limit_reports_megabytes() {
        let err = DatasetError::SizeLimit {
            limit_mb: 10_000_000.0 / (1024.0 * 1024.0),
            size: 12_000_000,
        };
        let msg = format!("{err}");
        assert!(msg.contains("9.5367"));
        assert!(msg.contains("MB"));
    }

    #[test]
    fn unsupported_json_ld_lists_quads() {
        let err = RdfError::UnsupportedJsonLd {
            quads: vec!["<a> <b> <c> _:g .".into(), "<d> <e> <f> _:g .".into()],
        };
        let msg = format!("{err}");
        assert!(msg.contains("<a> <b> <c> _:g ."));
        assert!(msg.contains("<d> <e> <f> _:g ."));
    }
}
