//! Compact difficulty target codec.
//!
//! A compact target packs a 256-bit number into 32 bits:
//! `[exponent (1 byte)][mantissa (3 bytes)]` with
//! `target = mantissa * 256^(exponent - 3)`. Bit 23 of the mantissa is a sign
//! flag. Decoding and encoding reproduce the historical arithmetic bit for bit,
//! including the 256-bit truncation of oversized encodings.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::hash::Hash256;

/// Result of decoding a compact target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTarget {
    /// The target, truncated to 256 bits.
    pub target: BigUint,
    /// The sign bit was set on a non-zero mantissa.
    pub negative: bool,
    /// The encoding does not fit in 256 bits.
    pub overflow: bool,
}

/// `2^256 - 1`.
pub fn u256_max() -> BigUint {
    (BigUint::one() << 256u32) - BigUint::one()
}

/// Reduce a value to its low 256 bits.
pub(crate) fn truncate_u256(value: BigUint) -> BigUint {
    if value.bits() > 256 {
        value & u256_max()
    } else {
        value
    }
}

/// Decode compact `bits` into a target plus its sign and overflow flags.
pub fn decode_compact(bits: u32) -> DecodedTarget {
    let size = bits >> 24;
    let mut word = bits & 0x007f_ffff;

    let target = if size <= 3 {
        word >>= 8 * (3 - size);
        BigUint::from(word)
    } else {
        truncate_u256(BigUint::from(word) << (8 * (size - 3)))
    };

    let negative = word != 0 && (bits & 0x0080_0000) != 0;
    let overflow = word != 0
        && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));

    DecodedTarget {
        target,
        negative,
        overflow,
    }
}

/// Decode compact `bits`, ignoring the sign and overflow flags.
///
/// This is how a previous block's already-accepted bits are read back.
pub fn bits_to_target(bits: u32) -> BigUint {
    decode_compact(bits).target
}

/// Encode a target into compact `bits` (never negative).
///
/// Only the top three significant bytes survive; the rest is rounded down.
pub fn target_to_bits(target: &BigUint) -> u32 {
    let target = truncate_u256(target.clone());
    if target.is_zero() {
        return 0;
    }

    let mut size = ((target.bits() + 7) / 8) as u32;
    let mut compact: u32 = if size <= 3 {
        low_u32(&target) << (8 * (3 - size))
    } else {
        low_u32(&(&target >> (8 * (size - 3))))
    };

    // The mantissa's top bit is the sign; move it into the exponent instead.
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }

    compact | (size << 24)
}

fn low_u32(value: &BigUint) -> u32 {
    value.iter_u32_digits().next().unwrap_or(0)
}

/// Numeric value of a hash (little-endian reading of internal bytes).
pub fn hash_to_u256(hash: &Hash256) -> BigUint {
    BigUint::from_bytes_le(hash)
}

/// Check if a hash meets the difficulty target (`hash <= target`).
#[inline]
pub fn hash_meets_target(hash: &Hash256, target: &BigUint) -> bool {
    hash_to_u256(hash) <= *target
}

/// Format a 256-bit value as 64 hex digits, the way targets are logged.
pub fn u256_to_hex(value: &BigUint) -> String {
    format!("{:064x}", value)
}
