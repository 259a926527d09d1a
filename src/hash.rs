//! Hash primitives shared with the on-chain verifier.
//!
//! Values are packed the way Solidity's `abi.encodePacked` does before hashing:
//! strings and byte strings contribute their raw bytes with no length prefix or
//! padding, `uint256` contributes 32 big-endian bytes, `address` 20 bytes.

use sha2::Sha256;
use sha3::{Digest, Keccak256};

/// A 32-byte digest.
pub type Hash = [u8; 32];

/// One value in a packed encoding.
#[derive(Debug, Clone, Copy)]
pub enum Packed<'a> {
    String(&'a str),
    Bytes(&'a [u8]),
    Uint256(u128),
    Address(&'a [u8; 20]),
}

/// Solidity `abi.encodePacked` over `values`.
pub fn encode_packed(values: &[Packed<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    for value in values {
        match value {
            Packed::String(s) => out.extend_from_slice(s.as_bytes()),
            Packed::Bytes(b) => out.extend_from_slice(b),
            Packed::Uint256(n) => {
                out.extend_from_slice(&[0u8; 16]);
                out.extend_from_slice(&n.to_be_bytes());
            }
            Packed::Address(a) => out.extend_from_slice(&a[..]),
        }
    }
    out
}

/// Keccak-256 (the pre-standard SHA-3 used by Ethereum).
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256.
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `keccak256(abi.encodePacked(values))`, Solidity's `solidityKeccak256`.
pub fn solidity_keccak256(values: &[Packed<'_>]) -> Hash {
    keccak256(&encode_packed(values))
}

/// `sha256(abi.encodePacked(values))`, the subject hash used for private triples.
pub fn solidity_sha256(values: &[Packed<'_>]) -> Hash {
    sha256(&encode_packed(values))
}

/// `0x`-prefixed lowercase hex.
pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode hex with or without a `0x` prefix.
pub fn from_hex(value: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(value.strip_prefix("0x").unwrap_or(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_reference_vectors() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(
            hex::encode(keccak256(b"hello")),
            "1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8"
        );
    }

    #[test]
    fn packed_string_is_raw_bytes() {
        assert_eq!(encode_packed(&[Packed::String("abc")]), b"abc".to_vec());
    }

    #[test]
    fn packed_uint256_is_32_bytes_big_endian() {
        let packed = encode_packed(&[Packed::String("a"), Packed::Uint256(258)]);
        assert_eq!(packed.len(), 33);
        assert_eq!(packed[0], b'a');
        assert_eq!(&packed[31..], &[1, 2]);
        assert!(packed[1..31].iter().all(|&b| b == 0));
    }

    #[test]
    fn packed_sha256_of_subject() {
        let digest = solidity_sha256(&[Packed::String("http://example.org/secret")]);
        assert_eq!(
            to_hex_prefixed(&digest),
            "0xcb449d04ec5484a2e7bafb54b6c825ad81fa9538b6ca32d7c0f0111421eb1d28"
        );
    }

    #[test]
    fn hex_roundtrip_accepts_prefix() {
        assert_eq!(from_hex("0x0aff").unwrap(), vec![0x0a, 0xff]);
        assert_eq!(from_hex("0aff").unwrap(), vec![0x0a, 0xff]);
        assert!(from_hex("0xzz").is_err());
    }
}
