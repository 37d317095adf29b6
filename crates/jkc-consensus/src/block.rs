//! Block header serialization, hashing and version semantics.
//!
//! The 32-bit version packs three things: a base version in the low byte,
//! the auxpow flag (bit 8) and the merge-mining chain ID (bits 16..31).

use crate::auxpow::AuxPow;
use crate::error::PowError;
use crate::hash::{double_sha256, scrypt_1024_1_1_256, Hash256};
use crate::network::BLOCK_HEADER_SIZE;

/// Version flag set on headers that carry an auxiliary proof of work.
pub const VERSION_AUXPOW: i32 = 1 << 8;

/// Multiplier placing the chain ID in the version's top half.
pub const VERSION_CHAIN_START: i32 = 1 << 16;

/// A block header, optionally carrying a merge-mining proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Version with auxpow flag and chain ID.
    pub version: i32,
    /// Hash of the previous block (internal byte order).
    pub prev_block_hash: Hash256,
    /// Merkle root of all transactions.
    pub merkle_root: Hash256,
    /// Block timestamp (Unix time).
    pub timestamp: u32,
    /// Difficulty target in compact "bits" format.
    pub bits: u32,
    /// Nonce for proof of work.
    pub nonce: u32,
    /// Merge-mining proof, present on auxpow blocks.
    pub auxpow: Option<Box<AuxPow>>,
}

impl BlockHeader {
    /// Create a new header with a base version and chain ID, without auxpow.
    pub fn new(
        base_version: i32,
        chain_id: i32,
        prev_block_hash: Hash256,
        merkle_root: Hash256,
        timestamp: u32,
        bits: u32,
    ) -> Self {
        let mut header = BlockHeader {
            version: 0,
            prev_block_hash,
            merkle_root,
            timestamp,
            bits,
            nonce: 0,
            auxpow: None,
        };
        header.set_base_version(base_version, chain_id);
        header
    }

    /// Serialize the 80 hashed bytes of the header. The auxpow is not part of it.
    pub fn serialize(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut header = [0u8; BLOCK_HEADER_SIZE];
        header[0..4].copy_from_slice(&self.version.to_le_bytes());
        header[4..36].copy_from_slice(&self.prev_block_hash);
        header[36..68].copy_from_slice(&self.merkle_root);
        header[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        header[72..76].copy_from_slice(&self.bits.to_le_bytes());
        header[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        header
    }

    /// Identity hash (double SHA256 of the serialized header).
    pub fn hash(&self) -> Hash256 {
        double_sha256(&self.serialize())
    }

    /// Proof-of-work hash (scrypt of the serialized header).
    pub fn pow_hash(&self) -> Result<Hash256, PowError> {
        scrypt_1024_1_1_256(&self.serialize())
    }

    /// Block time widened for timespan arithmetic.
    pub fn block_time(&self) -> i64 {
        i64::from(self.timestamp)
    }

    /// Version without the auxpow flag and chain ID.
    pub fn base_version(&self) -> i32 {
        self.version % VERSION_AUXPOW
    }

    /// Merge-mining chain ID carried in the version.
    pub fn chain_id(&self) -> i32 {
        self.version >> 16
    }

    /// Whether the version claims an auxiliary proof of work.
    pub fn is_auxpow(&self) -> bool {
        self.version & VERSION_AUXPOW != 0
    }

    /// Pre-merge-mining header. A stray version-2 header without chain ID
    /// counts as legacy too.
    pub fn is_legacy(&self) -> bool {
        self.version == 1 || (self.version == 2 && self.chain_id() == 0)
    }

    /// Set base version and chain ID, clearing the auxpow flag. Chain IDs
    /// above `0x7fff` spill into the sign bit rather than overflowing.
    pub fn set_base_version(&mut self, base_version: i32, chain_id: i32) {
        self.version = base_version | chain_id.wrapping_mul(VERSION_CHAIN_START);
    }

    /// Set or clear the auxpow version flag.
    pub fn set_auxpow_version(&mut self, auxpow: bool) {
        if auxpow {
            self.version |= VERSION_AUXPOW;
        } else {
            self.version &= !VERSION_AUXPOW;
        }
    }

    /// Attach a merge-mining proof and flag the version accordingly.
    pub fn set_auxpow(&mut self, auxpow: Option<AuxPow>) {
        self.set_auxpow_version(auxpow.is_some());
        self.auxpow = auxpow.map(Box::new);
    }
}
