//! Network definitions and consensus parameters.
//!
//! Every activation height and schedule constant the consensus rules consult
//! lives in [`ConsensusParams`]; the algorithms never carry their own copies.

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::difficulty::target_to_bits;
use crate::error::ParamsError;
use crate::hash::{hash_from_display_hex, serde_display_hex, Hash256};

/// Amount in base units.
pub type Amount = u64;

/// Base units per whole coin.
pub const COIN: Amount = 100_000_000;

/// Size of a serialized block header in bytes.
pub const BLOCK_HEADER_SIZE: usize = 80;

/// Network type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network.
    Mainnet,
    /// Public test network.
    Testnet,
    /// Local regression-test network.
    Regtest,
}

impl Network {
    /// Parse network from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Some(Network::Mainnet),
            "testnet" | "test" => Some(Network::Testnet),
            "regtest" => Some(Network::Regtest),
            _ => None,
        }
    }

    /// Get network name as string.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }

    /// Whether this network follows the staged mainnet halving schedule.
    /// Every other network halves on a fixed cadence from its first halving.
    pub fn has_staged_halvings(&self) -> bool {
        matches!(self, Network::Mainnet)
    }
}

impl core::fmt::Display for Network {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Default for Network {
    fn default() -> Self {
        Network::Mainnet
    }
}

const POW_LIMIT_SCRYPT: Hash256 =
    hash_from_display_hex("00000fffffffffffffffffffffffffffffffffffffffffffffffffffffffffff");
const POW_LIMIT_REGTEST: Hash256 =
    hash_from_display_hex("7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff");

/// Height at which the public networks switched to per-block retargeting.
pub const DIFFICULTY_PROTOCOL_SWITCH_HEIGHT: u32 = 69_360;

/// Retarget timespan multiplier before the difficulty protocol switch.
pub const LEGACY_TIMESPAN_FACTOR: i64 = 12;

/// Parameters that influence chain consensus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Network these parameters belong to. Selects the halving cadence.
    pub network: Network,
    /// Easiest allowed target, stored like a hash (internal byte order).
    #[serde(with = "serde_display_hex")]
    pub pow_limit: Hash256,
    /// Desired time between retargets under the per-block protocol, seconds.
    pub pow_target_timespan: i64,
    /// Desired time between blocks, seconds.
    pub pow_target_spacing: i64,
    /// Allow a minimum-difficulty block after a long gap.
    pub pow_allow_min_difficulty_blocks: bool,
    /// Freeze difficulty in the simple retarget variant.
    pub pow_no_retargeting: bool,
    /// Height from which the minimum-difficulty allowance applies.
    pub min_difficulty_height: u32,
    /// Height from which blocks must land exactly one spacing after their parent.
    pub strict_block_time_height: u32,
    /// Height at which retargeting switches from the coarse to the per-block protocol.
    pub difficulty_change_height: u32,
    /// Require non-legacy headers to carry our chain ID.
    pub strict_chain_id: bool,
    /// Merge-mining chain ID of this chain.
    pub auxpow_chain_id: i32,
    /// Identity hash of the genesis header, exempt from the proof-of-work
    /// check. Required on the public networks; the presets leave it unset.
    #[serde(default, with = "serde_display_hex::option")]
    pub genesis_hash: Option<Hash256>,
    /// Heights of the four scheduled halvings, ascending.
    pub halving_heights: [u32; 4],
    /// Blocks between halvings once the schedule goes periodic.
    pub subsidy_halving_interval: u32,
    /// Last height paying a subsidy; later blocks earn fees only.
    pub reward_cutoff_height: Option<u32>,
}

impl ConsensusParams {
    /// Creates the parameter set for the given network.
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => Self::mainnet(),
            Network::Testnet => Self::testnet(),
            Network::Regtest => Self::regtest(),
        }
    }

    /// Mainnet parameters. The genesis hash must be supplied with
    /// [`with_genesis_hash`](Self::with_genesis_hash) before they validate.
    pub fn mainnet() -> Self {
        ConsensusParams {
            network: Network::Mainnet,
            pow_limit: POW_LIMIT_SCRYPT,
            pow_target_timespan: 60,
            pow_target_spacing: 60,
            pow_allow_min_difficulty_blocks: false,
            pow_no_retargeting: false,
            min_difficulty_height: 0,
            strict_block_time_height: u32::MAX,
            difficulty_change_height: DIFFICULTY_PROTOCOL_SWITCH_HEIGHT,
            strict_chain_id: true,
            auxpow_chain_id: 0x2020,
            genesis_hash: None,
            // 262,800 then +131,400, +525,600, +788,400 blocks.
            halving_heights: [262_800, 394_200, 919_800, 1_708_200],
            subsidy_halving_interval: 788_400,
            reward_cutoff_height: Some(1_707_600),
        }
    }

    pub fn testnet() -> Self {
        ConsensusParams {
            network: Network::Testnet,
            pow_limit: POW_LIMIT_SCRYPT,
            pow_target_timespan: 60,
            pow_target_spacing: 60,
            pow_allow_min_difficulty_blocks: true,
            pow_no_retargeting: false,
            min_difficulty_height: 157_500,
            strict_block_time_height: u32::MAX,
            difficulty_change_height: DIFFICULTY_PROTOCOL_SWITCH_HEIGHT,
            strict_chain_id: true,
            auxpow_chain_id: 0x2021,
            genesis_hash: None,
            halving_heights: [2_880, 31_680, 60_480, 89_280],
            subsidy_halving_interval: 28_800,
            reward_cutoff_height: Some(89_280),
        }
    }

    pub fn regtest() -> Self {
        ConsensusParams {
            network: Network::Regtest,
            pow_limit: POW_LIMIT_REGTEST,
            pow_target_timespan: 60,
            pow_target_spacing: 60,
            pow_allow_min_difficulty_blocks: true,
            pow_no_retargeting: true,
            min_difficulty_height: 0,
            strict_block_time_height: u32::MAX,
            difficulty_change_height: 0,
            strict_chain_id: true,
            auxpow_chain_id: 0x2022,
            genesis_hash: None,
            halving_heights: [150, 300, 450, 600],
            subsidy_halving_interval: 150,
            reward_cutoff_height: None,
        }
    }

    /// Pin the genesis header hash.
    pub fn with_genesis_hash(mut self, hash: Hash256) -> Self {
        self.genesis_hash = Some(hash);
        self
    }

    /// Parse and validate a custom network definition.
    pub fn from_json(json: &str) -> Result<Self, ParamsError> {
        let params: ConsensusParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Reject parameter sets under which the consensus arithmetic is undefined.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.pow_target_spacing <= 0 {
            return Err(ParamsError::Invalid("target spacing must be positive"));
        }
        if self.pow_target_timespan <= 0 {
            return Err(ParamsError::Invalid("target timespan must be positive"));
        }
        if self.pow_target_timespan % self.pow_target_spacing != 0 {
            return Err(ParamsError::Invalid(
                "target timespan must be a multiple of target spacing",
            ));
        }
        if self.pow_limit_target().is_zero() {
            return Err(ParamsError::Invalid("proof-of-work limit must be non-zero"));
        }
        if self.subsidy_halving_interval == 0 {
            return Err(ParamsError::Invalid("halving interval must be non-zero"));
        }
        if self.halving_heights.windows(2).any(|w| w[0] > w[1]) {
            return Err(ParamsError::Invalid("halving heights must be ascending"));
        }
        if !(0..=0x7fff).contains(&self.auxpow_chain_id) {
            return Err(ParamsError::Invalid("chain ID must fit in the version's top 15 bits"));
        }
        if self.genesis_hash.is_none() && self.network != Network::Regtest {
            return Err(ParamsError::Invalid("genesis hash must be configured"));
        }
        Ok(())
    }

    /// The proof-of-work limit as a number.
    pub fn pow_limit_target(&self) -> BigUint {
        BigUint::from_bytes_le(&self.pow_limit)
    }

    /// The proof-of-work limit in compact form.
    pub fn pow_limit_bits(&self) -> u32 {
        target_to_bits(&self.pow_limit_target())
    }

    /// Whether the per-block difficulty protocol is in force at `height`.
    pub fn new_difficulty_protocol(&self, height: u32) -> bool {
        height >= self.difficulty_change_height
    }

    /// Retarget timespan in force at `height`: twelve times coarser before the
    /// protocol switch.
    pub fn effective_timespan(&self, height: u32) -> i64 {
        if self.new_difficulty_protocol(height) {
            self.pow_target_timespan
        } else {
            self.pow_target_timespan * LEGACY_TIMESPAN_FACTOR
        }
    }

    /// Number of blocks between difficulty adjustments at `height`.
    pub fn difficulty_adjustment_interval(&self, height: u32) -> i64 {
        self.effective_timespan(height) / self.pow_target_spacing
    }
}

impl Default for ConsensusParams {
    fn default() -> Self {
        ConsensusParams::mainnet()
    }
}
