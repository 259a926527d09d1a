//! Uniform Asset Locators: `did:dkg:<blockchain>/<contract>/<collection>[/<asset>]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::UAL_PREFIX;
use crate::error::{UalError, UalResult};
use crate::hash::keccak256;

/// A parsed UAL. The contract address is kept EIP-55 checksummed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ual {
    pub blockchain: String,
    pub contract_address: String,
    pub knowledge_collection_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_asset_id: Option<u64>,
}

impl Ual {
    /// The UAL of the enclosing knowledge collection.
    pub fn collection(&self) -> Ual {
        Ual {
            knowledge_asset_id: None,
            ..self.clone()
        }
    }
}

/// Parse and validate a UAL.
pub fn parse_ual(ual: &str) -> UalResult<Ual> {
    let rest = ual.strip_prefix(UAL_PREFIX).ok_or_else(|| UalError::MissingPrefix {
        ual: ual.to_string(),
    })?;
    let segments: Vec<&str> = rest.split('/').collect();
    let (blockchain, address, collection, asset) = match segments.as_slice() {
        [blockchain, address, collection] => (*blockchain, *address, *collection, None),
        [blockchain, address, collection, asset] => (*blockchain, *address, *collection, Some(*asset)),
        _ => {
            return Err(UalError::SegmentCount {
                ual: ual.to_string(),
                segments: segments.len(),
            });
        }
    };

    Ok(Ual {
        blockchain: blockchain.to_string(),
        contract_address: to_checksum_address(address)?,
        knowledge_collection_id: parse_token_id(collection)?,
        knowledge_asset_id: asset.map(parse_token_id).transpose()?,
    })
}

/// Build a UAL string. Blockchain id and address are lowercased.
pub fn format_ual(
    blockchain: &str,
    contract_address: &str,
    knowledge_collection_id: u64,
    knowledge_asset_id: Option<u64>,
) -> String {
    let ual = format!(
        "{UAL_PREFIX}{}/{}/{knowledge_collection_id}",
        blockchain.to_lowercase(),
        contract_address.to_lowercase()
    );
    match knowledge_asset_id {
        Some(asset) => format!("{ual}/{asset}"),
        None => ual,
    }
}

fn parse_token_id(value: &str) -> UalResult<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UalError::TokenId {
            value: value.to_string(),
        });
    }
    value.parse().map_err(|_| UalError::TokenId {
        value: value.to_string(),
    })
}

/// EIP-55 mixed-case checksum encoding of a 20-byte hex address.
pub fn to_checksum_address(address: &str) -> UalResult<String> {
    let hex = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(UalError::Address {
            address: address.to_string(),
        });
    }

    let lower = hex.to_ascii_lowercase();
    let digest = keccak256(lower.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (digest[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

impl fmt::Display for Ual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_ual(
            &self.blockchain,
            &self.contract_address,
            self.knowledge_collection_id,
            self.knowledge_asset_id,
        ))
    }
}

impl FromStr for Ual {
    type Err = UalError;

    fn from_str(s: &str) -> UalResult<Self> {
        parse_ual(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_reference_vectors() {
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            assert_eq!(to_checksum_address(&expected.to_lowercase()).unwrap(), expected);
        }
    }

    #[test]
    fn malformed_addresses_are_rejected() {
        assert!(to_checksum_address("0x1234").is_err());
        assert!(to_checksum_address("0xzzaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_err());
    }

    #[test]
    fn parses_collection_ual() {
        let ual = parse_ual("did:dkg:base:84532/0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed/17").unwrap();
        assert_eq!(ual.blockchain, "base:84532");
        assert_eq!(ual.contract_address, "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
        assert_eq!(ual.knowledge_collection_id, 17);
        assert_eq!(ual.knowledge_asset_id, None);
    }

    #[test]
    fn parses_asset_ual() {
        let ual: Ual = "did:dkg:otp:2043/0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed/17/3"
            .parse()
            .unwrap();
        assert_eq!(ual.knowledge_asset_id, Some(3));
        assert_eq!(ual.collection().knowledge_asset_id, None);
    }

    #[test]
    fn missing_prefix_is_rejected() {
        assert!(matches!(
            parse_ual("dkg:base:84532/0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed/17"),
            Err(UalError::MissingPrefix { .. })
        ));
    }

    #[test]
    fn wrong_segment_count_is_rejected() {
        assert!(matches!(
            parse_ual("did:dkg:base:84532/0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"),
            Err(UalError::SegmentCount { segments: 2, .. })
        ));
        assert!(matches!(
            parse_ual("did:dkg:a/0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed/1/2/3"),
            Err(UalError::SegmentCount { segments: 5, .. })
        ));
    }

    #[test]
    fn non_numeric_ids_are_rejected() {
        assert!(matches!(
            parse_ual("did:dkg:a/0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed/x1"),
            Err(UalError::TokenId { .. })
        ));
        assert!(matches!(
            parse_ual("did:dkg:a/0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed/1/-2"),
            Err(UalError::TokenId { .. })
        ));
    }

    #[test]
    fn format_lowercases_and_roundtrips() {
        let text = format_ual("Base:84532", "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed", 5, Some(1));
        assert_eq!(text, "did:dkg:base:84532/0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed/5/1");
        let ual = parse_ual(&text).unwrap();
        assert_eq!(ual.to_string(), text);
    }
}
