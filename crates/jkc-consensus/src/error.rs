//! Rejection reasons.
//!
//! The public entry points only ever report `true`/`false`. These enums carry
//! the cause as far as the log line that records it.

use thiserror::Error;

/// Why a hash failed its proof-of-work check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PowError {
    /// The compact target had its sign bit set.
    #[error("compact target {bits:#010x} is negative")]
    NegativeTarget { bits: u32 },

    /// The compact target decodes to zero.
    #[error("compact target {bits:#010x} is zero")]
    ZeroTarget { bits: u32 },

    /// The compact target does not fit in 256 bits.
    #[error("compact target {bits:#010x} overflows 256 bits")]
    OverflowTarget { bits: u32 },

    /// The target is easier than the network allows.
    #[error("compact target {bits:#010x} exceeds the proof-of-work limit")]
    AboveLimit { bits: u32 },

    /// The hash is numerically above the target.
    #[error("hash {hash} ({value}) exceeds target {target}")]
    HashAboveTarget {
        hash: String,
        value: String,
        target: String,
    },

    /// The proof-of-work hash could not be computed.
    #[error("proof-of-work hashing failed: {0}")]
    Hashing(String),
}

/// Why a parent coinbase transaction could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoinbaseError {
    #[error("coinbase transaction truncated at offset {0}")]
    Truncated(usize),

    #[error("coinbase transaction has no inputs")]
    NoInputs,

    #[error("coinbase compact size at offset {0} is not canonical")]
    NonCanonicalSize(usize),
}

/// Why a header's (auxiliary) proof of work was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuxPowError {
    #[error("block does not have our chain ID (got {got}, expected {expected}, full version {version})")]
    WrongChainId { got: i32, expected: i32, version: i32 },

    #[error("no auxpow on block with auxpow version")]
    MissingAuxPow,

    #[error("auxpow on block with non-auxpow version")]
    UnexpectedAuxPow,

    #[error("non-AUX proof of work failed: {0}")]
    OwnPow(PowError),

    #[error("AUX POW is not valid: {0}")]
    InvalidAuxPow(Box<AuxPowError>),

    #[error("AUX proof of work failed: {0}")]
    ParentPow(PowError),

    #[error("auxpow is not a generate (coinbase merkle index {0})")]
    NotGenerate(i32),

    #[error("auxpow parent has our chain ID")]
    ParentHasOurChainId,

    #[error("auxpow chain merkle branch too long ({0} levels)")]
    ChainBranchTooLong(usize),

    #[error("auxpow merkle root incorrect")]
    MerkleRootMismatch,

    #[error("auxpow coinbase unreadable: {0}")]
    Coinbase(CoinbaseError),

    #[error("auxpow missing chain merkle root in parent coinbase")]
    MissingChainRoot,

    #[error("multiple merged mining headers in coinbase")]
    MultipleMergedMiningHeaders,

    #[error("merged mining header is not just before chain merkle root")]
    MisplacedMergedMiningHeader,

    #[error("auxpow chain merkle root must start in the first 20 bytes of the parent coinbase")]
    ChainRootTooLate,

    #[error("auxpow missing chain merkle tree size and nonce in parent coinbase")]
    MissingSizeAndNonce,

    #[error("auxpow merkle branch size does not match parent coinbase (size {size}, branch length {branch_len})")]
    BranchSizeMismatch { size: u32, branch_len: usize },

    #[error("auxpow wrong index (got {got}, expected {expected})")]
    WrongChainIndex { got: i32, expected: i32 },
}

impl From<CoinbaseError> for AuxPowError {
    fn from(e: CoinbaseError) -> Self {
        AuxPowError::Coinbase(e)
    }
}

/// Why a set of consensus parameters was refused.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("invalid consensus parameters: {0}")]
    Invalid(&'static str),

    #[error("malformed consensus parameters: {0}")]
    Json(#[from] serde_json::Error),
}
