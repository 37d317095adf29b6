//! Consensus rules for block acceptance on a merge-mined scrypt chain.
//!
//! This crate provides pure Rust implementations of:
//! - Compact difficulty target encoding and proof-of-work checks
//! - Direct and merge-mined (auxpow) proof-of-work verification
//! - Difficulty retargeting across the chain's historical protocols
//! - The block subsidy schedule, including the height-seeded bonus
//!
//! All entry points are pure over a [`ConsensusParams`] and, for
//! retargeting, a read-only [`ChainView`]. Rejections are reported as `false`
//! with the reason sent to the `log` facade.

pub mod auxpow;
pub mod block;
pub mod chain;
pub mod coinbase;
pub mod difficulty;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod network;
pub mod pow;
pub mod random;
pub mod retarget;
pub mod subsidy;

pub use auxpow::{check_auxpow_proof_of_work, AuxPow};
pub use block::BlockHeader;
pub use chain::{BlockIndex, ChainView};
pub use difficulty::{bits_to_target, target_to_bits};
pub use error::{AuxPowError, ParamsError, PowError};
pub use hash::Hash256;
pub use network::{Amount, ConsensusParams, Network, COIN};
pub use pow::check_proof_of_work;
pub use retarget::{calculate_next_work_required, get_next_work_required};
pub use subsidy::get_block_subsidy;
