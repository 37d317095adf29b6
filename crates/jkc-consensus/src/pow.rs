//! Proof-of-work check of a hash against a compact target.

use log::warn;

use crate::difficulty::{decode_compact, hash_to_u256, u256_to_hex};
use crate::error::PowError;
use crate::hash::{hash_to_display_hex, Hash256};
use crate::network::ConsensusParams;

/// Check that `hash` satisfies the compact target `bits`.
///
/// The target must be positive, encodable in 256 bits and no easier than the
/// network's proof-of-work limit. Rejections are logged, never returned.
pub fn check_proof_of_work(hash: &Hash256, bits: u32, params: &ConsensusParams) -> bool {
    match verify_proof_of_work(hash, bits, params) {
        Ok(()) => true,
        Err(err) => {
            warn!("check_proof_of_work: {}", err);
            false
        }
    }
}

/// [`check_proof_of_work`] with the rejection reason.
pub fn verify_proof_of_work(
    hash: &Hash256,
    bits: u32,
    params: &ConsensusParams,
) -> Result<(), PowError> {
    let decoded = decode_compact(bits);

    if decoded.negative {
        return Err(PowError::NegativeTarget { bits });
    }
    if decoded.overflow {
        return Err(PowError::OverflowTarget { bits });
    }
    if decoded.target.bits() == 0 {
        return Err(PowError::ZeroTarget { bits });
    }
    if decoded.target > params.pow_limit_target() {
        return Err(PowError::AboveLimit { bits });
    }

    let value = hash_to_u256(hash);
    if value > decoded.target {
        return Err(PowError::HashAboveTarget {
            hash: hash_to_display_hex(hash),
            value: u256_to_hex(&value),
            target: u256_to_hex(&decoded.target),
        });
    }

    Ok(())
}
