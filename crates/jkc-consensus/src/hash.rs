//! Header and transaction hashing.
//!
//! Hashes are kept in internal byte order, the order the digest functions
//! produce them. Their numeric value is the little-endian reading of those
//! bytes, so the display form (reversed hex) reads as a big-endian number.

use scrypt::{scrypt, Params};
use sha2::{Digest, Sha256};

use crate::error::PowError;

/// A 32-byte hash in internal byte order.
pub type Hash256 = [u8; 32];

/// Double SHA256: SHA256(SHA256(data)).
///
/// Used for header identity hashes, transaction IDs and merkle nodes.
#[inline]
pub fn double_sha256(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second);
    result
}

/// Hash the concatenation of two hashes, as merkle nodes do.
#[inline]
pub fn hash_pair(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut combined = [0u8; 64];
    combined[..32].copy_from_slice(left);
    combined[32..].copy_from_slice(right);
    double_sha256(&combined)
}

/// scrypt with N=1024, r=1, p=1 and a 32-byte output, the data used as both
/// password and salt. This is the proof-of-work hash of a header.
pub fn scrypt_1024_1_1_256(data: &[u8]) -> Result<Hash256, PowError> {
    let params = Params::new(10, 1, 1, 32).map_err(|e| PowError::Hashing(e.to_string()))?;
    let mut out = [0u8; 32];
    scrypt(data, data, &params, &mut out).map_err(|e| PowError::Hashing(e.to_string()))?;
    Ok(out)
}

/// Reverse the byte order of a 32-byte array.
#[inline]
pub fn reverse_bytes(bytes: &Hash256) -> Hash256 {
    let mut reversed = *bytes;
    reversed.reverse();
    reversed
}

/// Convert a hash to its display format (reversed hex).
pub fn hash_to_display_hex(hash: &Hash256) -> String {
    hex::encode(reverse_bytes(hash))
}

/// Parse display-order hex (as printed by explorers) into internal order.
pub fn hash_from_display_hex_str(s: &str) -> Result<Hash256, hex::FromHexError> {
    let mut out = [0u8; 32];
    hex::decode_to_slice(s, &mut out)?;
    out.reverse();
    Ok(out)
}

/// Compile-time variant of [`hash_from_display_hex_str`] for network constants.
///
/// Panics on malformed input, which in a `const` context is a build error.
pub const fn hash_from_display_hex(s: &str) -> Hash256 {
    let bytes = s.as_bytes();
    assert!(bytes.len() == 64, "hash hex must be 64 characters");
    let mut out = [0u8; 32];
    let mut i = 0;
    while i < 32 {
        let hi = hex_nibble(bytes[2 * i]);
        let lo = hex_nibble(bytes[2 * i + 1]);
        out[31 - i] = (hi << 4) | lo;
        i += 1;
    }
    out
}

const fn hex_nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => panic!("invalid hex digit"),
    }
}

/// Serde adapter storing a [`Hash256`] as display-order hex.
pub(crate) mod serde_display_hex {
    use super::{hash_from_display_hex_str, hash_to_display_hex, Hash256};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash256, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hash_to_display_hex(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Hash256, D::Error> {
        let s = String::deserialize(d)?;
        hash_from_display_hex_str(&s).map_err(D::Error::custom)
    }

    /// The same encoding for an optional hash, `null` when absent.
    pub mod option {
        use super::super::{hash_from_display_hex_str, hash_to_display_hex, Hash256};
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(hash: &Option<Hash256>, s: S) -> Result<S::Ok, S::Error> {
            match hash {
                Some(hash) => s.serialize_some(&hash_to_display_hex(hash)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Hash256>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|s| hash_from_display_hex_str(&s).map_err(D::Error::custom))
                .transpose()
        }
    }
}
