//! Dataset chunking and the sorted-pair Merkle tree.
//!
//! The knowledge collection root is computed over fixed-size byte chunks of
//! the newline-joined quads:
//!
//! 1. Join quads with `\n` and take the UTF-8 bytes
//! 2. Split into `chunk_size` byte chunks (the last one may be shorter)
//! 3. Leaf `i` = `keccak256(abi.encodePacked(string chunk_i, uint256 i))`
//! 4. Fold pairs bottom-up: parent = `keccak256(min(a, b) || max(a, b))`;
//!    an unpaired trailing node moves up unchanged
//!
//! Chunks are byte-exact: a chunk may end in the middle of a multi-byte code
//! point and is hashed as is.

use crate::constants::CHUNK_BYTE_SIZE;
use crate::error::{MerkleError, MerkleResult};
use crate::hash::{Hash, Packed, keccak256, solidity_keccak256, to_hex_prefixed};

/// Join quads the way the network does before chunking.
fn joined_bytes<S: AsRef<str>>(quads: &[S]) -> Vec<u8> {
    quads
        .iter()
        .map(|q| q.as_ref())
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes()
}

/// Split the newline-joined quads into byte chunks of `chunk_size`.
pub fn split_into_chunks<S: AsRef<str>>(quads: &[S], chunk_size: usize) -> MerkleResult<Vec<Vec<u8>>> {
    if chunk_size == 0 {
        return Err(MerkleError::ZeroChunkSize);
    }
    Ok(joined_bytes(quads)
        .chunks(chunk_size)
        .map(<[u8]>::to_vec)
        .collect())
}

/// `ceil(total_bytes / chunk_size)` for the newline-joined quads.
pub fn calculate_number_of_chunks<S: AsRef<str>>(quads: &[S], chunk_size: usize) -> MerkleResult<usize> {
    if chunk_size == 0 {
        return Err(MerkleError::ZeroChunkSize);
    }
    let total: usize = quads.iter().map(|q| q.as_ref().len()).sum::<usize>()
        + quads.len().saturating_sub(1);
    Ok(total.div_ceil(chunk_size))
}

/// Leaf hash for chunk `index`.
pub fn chunk_leaf(chunk: &[u8], index: usize) -> Hash {
    solidity_keccak256(&[Packed::Bytes(chunk), Packed::Uint256(index as u128)])
}

/// Combine two siblings; the result does not depend on their order.
pub fn hash_pair(a: &Hash, b: &Hash) -> Hash {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(lo);
    buf[32..].copy_from_slice(hi);
    keccak256(&buf)
}

/// Dataset root of `quads` with the given chunk size, as `0x` hex.
pub fn calculate_merkle_root<S: AsRef<str>>(quads: &[S], chunk_size: usize) -> MerkleResult<String> {
    Ok(MerkleTree::from_quads(quads, chunk_size)?.root_hex())
}

/// Dataset root with the network chunk size.
pub fn dataset_root<S: AsRef<str>>(quads: &[S]) -> MerkleResult<String> {
    calculate_merkle_root(quads, CHUNK_BYTE_SIZE)
}

/// Root of a single-asset assertion: one leaf per quad
/// (`keccak256(abi.encodePacked(string quad, uint256 i))`), same folding.
pub fn legacy_assertion_root<S: AsRef<str>>(quads: &[S]) -> MerkleResult<String> {
    let leaves = quads
        .iter()
        .enumerate()
        .map(|(i, q)| {
            solidity_keccak256(&[Packed::String(q.as_ref()), Packed::Uint256(i as u128)])
        })
        .collect();
    Ok(MerkleTree::from_leaves(leaves)?.root_hex())
}

/// Position of a sibling relative to the node being proven.
///
/// Pairs are sorted before hashing, so verification never needs it; it is kept
/// for callers that display or re-encode proofs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Left,
    Right,
}

/// One step of an inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofNode {
    pub hash: Hash,
    pub position: Position,
}

/// A Merkle tree that keeps every level, leaves first.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Build the tree over pre-computed leaves.
    pub fn from_leaves(leaves: Vec<Hash>) -> MerkleResult<Self> {
        if leaves.is_empty() {
            return Err(MerkleError::Empty);
        }
        let mut levels = vec![leaves];
        while let Some(level) = levels.last().filter(|l| l.len() > 1) {
            let next = level
                .chunks(2)
                .map(|pair| match pair {
                    [a, b] => hash_pair(a, b),
                    _ => pair[0],
                })
                .collect();
            levels.push(next);
        }
        Ok(Self { levels })
    }

    /// Build the dataset tree over chunked quads.
    pub fn from_quads<S: AsRef<str>>(quads: &[S], chunk_size: usize) -> MerkleResult<Self> {
        let leaves = split_into_chunks(quads, chunk_size)?
            .iter()
            .enumerate()
            .map(|(i, chunk)| chunk_leaf(chunk, i))
            .collect();
        Self::from_leaves(leaves)
    }

    pub fn root(&self) -> Hash {
        // `from_leaves` guarantees a non-empty top level.
        self.levels[self.levels.len() - 1][0]
    }

    pub fn root_hex(&self) -> String {
        to_hex_prefixed(&self.root())
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    pub fn leaves(&self) -> &[Hash] {
        &self.levels[0]
    }

    /// Inclusion proof for leaf `index`. Levels where the node is carried up
    /// unpaired contribute no step.
    pub fn proof(&self, index: usize) -> MerkleResult<Vec<ProofNode>> {
        if index >= self.leaf_count() {
            return Err(MerkleError::LeafOutOfRange {
                index,
                leaves: self.leaf_count(),
            });
        }
        let mut proof = Vec::new();
        let mut index = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = index ^ 1;
            if let Some(hash) = level.get(sibling) {
                proof.push(ProofNode {
                    hash: *hash,
                    position: if sibling < index {
                        Position::Left
                    } else {
                        Position::Right
                    },
                });
            }
            index /= 2;
        }
        Ok(proof)
    }
}

/// Check that `leaf` folds up to `root` along `proof`.
pub fn verify_proof(leaf: &Hash, proof: &[ProofNode], root: &Hash) -> bool {
    let computed = proof
        .iter()
        .fold(*leaf, |current, node| hash_pair(&current, &node.hash));
    computed == *root
}
