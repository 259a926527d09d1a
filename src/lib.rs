//! # dkg-client
//!
//! Client library for a decentralized knowledge graph. It turns RDF content
//! into knowledge collections that storage nodes and an on-chain verifier
//! agree on byte for byte.
//!
//! ## Architecture
//!
//! - **RDF** (`rdf`): N-Quads codec, RDFC-1.0 canonicalization, JSON-LD via oxigraph
//! - **Datasets** (`dataset`): blank node resolution, subject grouping, private/public linking
//! - **Commitments** (`merkle`, `hash`): 32-byte chunking and sorted-pair Keccak-256 trees
//! - **Identifiers** (`ual`): `did:dkg:` locators with checksummed contract addresses
//! - **Network** (`node`, `chain`, `client`): publish/get/query with bounded polling
//!
//! ## Library usage
//!
//! ```no_run
//! use dkg_client::dataset::{AssemblyOptions, Content, assemble};
//! use dkg_client::rdf::InputFormat;
//!
//! let content = Content::from_json(serde_json::json!({
//!     "public": "<http://example.org/ny> <http://schema.org/name> \"New York\" .",
//! }));
//! let options = AssemblyOptions {
//!     input_format: InputFormat::NQuads,
//!     ..AssemblyOptions::default()
//! };
//! let collection = assemble(&content, &options).unwrap();
//! println!("{}", collection.dataset_root);
//! ```

pub mod chain;
pub mod client;
pub mod config;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod node;
pub mod rdf;
pub mod ual;
