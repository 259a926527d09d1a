//! Blockchain interface and publish signature collection.
//!
//! Contract calls, transaction signing and signature recovery live behind
//! [`ChainApi`]; this crate only decides which node signatures to submit.

use serde::{Deserialize, Serialize};

use crate::constants::OPERATIONAL_KEY_PURPOSE;
use crate::error::{ChainError, ChainResult};
use crate::hash::{Hash, Packed, from_hex, solidity_keccak256};

/// A node's signature over a dataset root, as returned in publish results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSignature {
    pub identity_id: u64,
    pub r: String,
    pub vs: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<u8>,
}

/// Everything the knowledge collection contract needs to register a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionRequest {
    pub publish_operation_id: String,
    pub dataset_root: String,
    pub knowledge_assets_amount: usize,
    pub byte_size: usize,
    pub epochs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_amount: Option<u128>,
    pub is_immutable: bool,
    pub paymaster: String,
    pub publisher_node_identity_id: u64,
    pub publisher_node_r: String,
    pub publisher_node_vs: String,
    pub identity_ids: Vec<u64>,
    pub r: Vec<String>,
    pub vs: Vec<String>,
}

/// Result of a successful collection creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionReceipt {
    pub knowledge_collection_id: u64,
    pub transaction_hash: String,
}

/// The contracts a client talks to.
pub trait ChainApi {
    /// Blockchain id, such as `base:84532`.
    fn blockchain_id(&self) -> &str;

    /// Address of the `KnowledgeCollectionStorage` contract.
    fn knowledge_collection_storage_address(&self) -> ChainResult<String>;

    /// Address (`0x` hex) that signed `dataset_root` with `signature`.
    fn recover_signer(&self, dataset_root: &str, signature: &NodeSignature) -> ChainResult<String>;

    /// Whether `key_hash` is a key of `identity_id` with the given purpose.
    fn key_has_purpose(&self, identity_id: u64, key_hash: &Hash, purpose: u8) -> ChainResult<bool>;

    fn create_knowledge_collection(
        &self,
        request: &CreateCollectionRequest,
    ) -> ChainResult<CollectionReceipt>;

    /// Whether `key_hash` is an operational key of `identity_id`.
    fn is_operational_key(&self, identity_id: u64, key_hash: &Hash) -> ChainResult<bool> {
        self.key_has_purpose(identity_id, key_hash, OPERATIONAL_KEY_PURPOSE)
    }
}

impl<T: ChainApi + ?Sized> ChainApi for &T {
    fn blockchain_id(&self) -> &str {
        (**self).blockchain_id()
    }

    fn knowledge_collection_storage_address(&self) -> ChainResult<String> {
        (**self).knowledge_collection_storage_address()
    }

    fn recover_signer(&self, dataset_root: &str, signature: &NodeSignature) -> ChainResult<String> {
        (**self).recover_signer(dataset_root, signature)
    }

    fn key_has_purpose(&self, identity_id: u64, key_hash: &Hash, purpose: u8) -> ChainResult<bool> {
        (**self).key_has_purpose(identity_id, key_hash, purpose)
    }

    fn create_knowledge_collection(
        &self,
        request: &CreateCollectionRequest,
    ) -> ChainResult<CollectionReceipt> {
        (**self).create_knowledge_collection(request)
    }
}

/// Signatures accepted for submission, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedSignatures {
    pub identity_ids: Vec<u64>,
    pub r: Vec<String>,
    pub vs: Vec<String>,
    pub skipped: usize,
}

impl CollectedSignatures {
    pub fn len(&self) -> usize {
        self.identity_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identity_ids.is_empty()
    }
}

/// `keccak256(abi.encodePacked(address))` of a `0x` hex address.
pub fn address_key_hash(address: &str) -> ChainResult<Hash> {
    let bytes = from_hex(address).map_err(|e| ChainError::Signature {
        message: format!("signer address {address}: {e}"),
    })?;
    let address: [u8; 20] = bytes.try_into().map_err(|b: Vec<u8>| ChainError::Signature {
        message: format!("signer address has {} bytes, expected 20", b.len()),
    })?;
    Ok(solidity_keccak256(&[Packed::Address(&address)]))
}

fn verify_signature<C: ChainApi + ?Sized>(
    chain: &C,
    dataset_root: &str,
    signature: &NodeSignature,
) -> ChainResult<bool> {
    let signer = chain.recover_signer(dataset_root, signature)?;
    let key_hash = address_key_hash(&signer)?;
    chain.is_operational_key(signature.identity_id, &key_hash)
}

/// Keep the signatures made by an operational key of the claimed identity.
///
/// A signature that cannot be recovered or checked is skipped with a warning;
/// one bad node must not block the publish.
pub fn collect_signatures<C: ChainApi + ?Sized>(
    chain: &C,
    dataset_root: &str,
    signatures: &[NodeSignature],
) -> CollectedSignatures {
    let mut collected = CollectedSignatures::default();
    for signature in signatures {
        match verify_signature(chain, dataset_root, signature) {
            Ok(true) => {
                collected.identity_ids.push(signature.identity_id);
                collected.r.push(signature.r.clone());
                collected.vs.push(signature.vs.clone());
            }
            Ok(false) => {
                tracing::warn!(
                    identity_id = signature.identity_id,
                    "signer is not an operational key, skipping signature"
                );
                collected.skipped += 1;
            }
            Err(e) => {
                tracing::warn!(
                    identity_id = signature.identity_id,
                    error = %e,
                    "invalid node signature, skipping"
                );
                collected.skipped += 1;
            }
        }
    }
    tracing::debug!(
        accepted = collected.len(),
        skipped = collected.skipped,
        "node signatures collected"
    );
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::to_hex_prefixed;
    use std::collections::HashMap;

    /// Signatures carry the signer address in `r` for these tests.
    struct FakeChain {
        operational: HashMap<u64, Hash>,
    }

    impl ChainApi for FakeChain {
        fn blockchain_id(&self) -> &str {
            "hardhat1:31337"
        }
        fn knowledge_collection_storage_address(&self) -> ChainResult<String> {
            Ok("0x8f8827f2a5a41a0bdb1fbf6c0a3ab2d7e6e1f6c1".into())
        }
        fn recover_signer(&self, _: &str, signature: &NodeSignature) -> ChainResult<String> {
            if signature.r == "bad" {
                return Err(ChainError::Signature {
                    message: "cannot recover".into(),
                });
            }
            Ok(signature.r.clone())
        }
        fn key_has_purpose(&self, identity_id: u64, key_hash: &Hash, purpose: u8) -> ChainResult<bool> {
            assert_eq!(purpose, OPERATIONAL_KEY_PURPOSE);
            Ok(self.operational.get(&identity_id) == Some(key_hash))
        }
        fn create_knowledge_collection(
            &self,
            _: &CreateCollectionRequest,
        ) -> ChainResult<CollectionReceipt> {
            unimplemented!()
        }
    }

    fn signature(identity_id: u64, r: &str) -> NodeSignature {
        NodeSignature {
            identity_id,
            r: r.into(),
            vs: format!("vs-{identity_id}"),
            s: None,
            v: None,
        }
    }

    const ADDR_A: &str = "0x1111111111111111111111111111111111111111";
    const ADDR_B: &str = "0x2222222222222222222222222222222222222222";

    #[test]
    fn address_hash_uses_raw_20_bytes() {
        let expected = crate::hash::keccak256(&[0x11; 20]);
        assert_eq!(address_key_hash(ADDR_A).unwrap(), expected);
        assert!(address_key_hash("0x1234").is_err());
        assert!(address_key_hash("not hex").is_err());
    }

    #[test]
    fn keeps_only_operational_signers() {
        let chain = FakeChain {
            operational: HashMap::from([
                (1, address_key_hash(ADDR_A).unwrap()),
                (2, address_key_hash(ADDR_B).unwrap()),
            ]),
        };
        let signatures = vec![
            signature(1, ADDR_A),
            signature(2, ADDR_A),
            signature(3, "bad"),
            signature(2, ADDR_B),
        ];
        let collected = collect_signatures(&chain, "0xroot", &signatures);
        assert_eq!(collected.identity_ids, vec![1, 2]);
        assert_eq!(collected.r, vec![ADDR_A.to_string(), ADDR_B.to_string()]);
        assert_eq!(collected.vs, vec!["vs-1".to_string(), "vs-2".to_string()]);
        assert_eq!(collected.skipped, 2);
    }

    #[test]
    fn signature_json_shape() {
        let parsed: NodeSignature = serde_json::from_value(serde_json::json!({
            "identityId": 7,
            "r": "0xaa",
            "vs": "0xbb"
        }))
        .unwrap();
        assert_eq!(parsed.identity_id, 7);
        assert_eq!(parsed.s, None);
        assert_eq!(to_hex_prefixed(&[0xaa]), parsed.r);
    }
}
