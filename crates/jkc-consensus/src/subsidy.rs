//! Block subsidy schedule.
//!
//! The first 5,860 blocks pay flat bounty tiers. From then on the base
//! subsidy halves on the network's schedule and a bonus drawn from a
//! generator seeded with the height may multiply it. Past the reward cutoff
//! blocks earn their fees only.

use log::debug;

use crate::network::{Amount, ConsensusParams, COIN};
use crate::random::seeded_draw;

/// Steady-state subsidy before any halving.
pub const BASE_SUBSIDY: Amount = 50 * COIN;

/// First height paid the steady-state subsidy.
pub const STEADY_STATE_HEIGHT: u32 = 5_861;

const BONUS_RANGE: u32 = 100_000;
const JACKPOT_THRESHOLD: u32 = 99_990;
const JACKPOT_MULTIPLIER: Amount = 20;
const LUCKY_THRESHOLD: u32 = 1_001;
const LUCKY_MULTIPLIER: Amount = 3;

/// Subsidy plus `fees` for the block at `height`.
pub fn get_block_subsidy(height: u32, fees: Amount, params: &ConsensusParams) -> Amount {
    if let Some(cutoff) = params.reward_cutoff_height {
        if height > cutoff {
            return fees;
        }
    }

    let subsidy = match height {
        0..=100 => 1_000 * COIN,
        101..=1_540 => 500 * COIN,
        1_541..=2_980 => 200 * COIN,
        2_981..=5_860 => 100 * COIN,
        _ => apply_bonus(height, halved_subsidy(height, params)),
    };

    subsidy.saturating_add(fees)
}

fn halved_subsidy(height: u32, params: &ConsensusParams) -> Amount {
    let [first, .., fourth] = params.halving_heights;
    let interval = params.subsidy_halving_interval;

    let halvings = if params.network.has_staged_halvings() {
        // One halving per scheduled height passed, then one per interval.
        let staged = params
            .halving_heights
            .iter()
            .take_while(|&&h| height >= h)
            .count() as u32;
        if height >= fourth {
            staged + (height - fourth) / interval
        } else {
            staged
        }
    } else if height >= first {
        1 + (height - first) / interval
    } else {
        0
    };

    BASE_SUBSIDY.checked_shr(halvings).unwrap_or(0)
}

fn apply_bonus(height: u32, subsidy: Amount) -> Amount {
    let draw = seeded_draw(height, BONUS_RANGE);
    if draw > JACKPOT_THRESHOLD {
        debug!("height {}: jackpot bonus (draw {})", height, draw);
        subsidy * JACKPOT_MULTIPLIER
    } else if draw < LUCKY_THRESHOLD {
        debug!("height {}: lucky bonus (draw {})", height, draw);
        subsidy * LUCKY_MULTIPLIER
    } else {
        subsidy
    }
}
