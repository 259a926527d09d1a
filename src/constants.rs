//! Fixed protocol constants shared with storage nodes and the on-chain verifier.
//!
//! These strings take part in hashing: changing any of them changes dataset
//! roots and breaks compatibility with every other DKG implementation.

/// Predicate linking a generated node to the private assertion's Merkle root.
pub const PRIVATE_ASSERTION_PREDICATE: &str =
    "https://ontology.origintrail.io/dkg/1.0#privateMerkleRoot";

/// Predicate pointing from a public subject to a private resource placeholder.
pub const PRIVATE_RESOURCE_PREDICATE: &str =
    "https://ontology.origintrail.io/dkg/1.0#representsPrivateResource";

/// Subject prefix for private subjects that have no public counterpart.
pub const PRIVATE_HASH_SUBJECT_PREFIX: &str =
    "https://ontology.origintrail.io/dkg/1.0#metadata-hash:";

/// Scheme prefix for freshly generated named nodes.
pub const GENERATED_NODE_PREFIX: &str = "uuid:";

/// Chunk size used for dataset Merkle trees.
pub const CHUNK_BYTE_SIZE: usize = 32;

/// Maximum dataset size accepted by the network, in bytes.
pub const MAX_FILE_SIZE: usize = 10_000_000;

/// Hash function id announced to nodes (1 = SHA-256 for subject hashing).
pub const DEFAULT_HASH_FUNCTION_ID: u8 = 1;

/// UAL scheme prefix.
pub const UAL_PREFIX: &str = "did:dkg:";

/// Repository names for private triples on a node.
pub const PRIVATE_CURRENT_REPOSITORY: &str = "privateCurrent";
pub const PRIVATE_HISTORICAL_REPOSITORY: &str = "privateHistory";

/// `IdentityLib.OPERATIONAL_KEY` purpose id in the identity contract.
pub const OPERATIONAL_KEY_PURPOSE: u8 = 2;

/// The all-zero address.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

pub(crate) const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub(crate) const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
