//! Difficulty retargeting.
//!
//! Three regimes coexist on the chain's history. Before the protocol switch
//! the target is recomputed every twelve target timespans; after it every
//! block retargets with a narrow clamp. Independently of the protocol, the
//! lower clamp bound is relaxed on the first 10,000 blocks. On top of that a
//! minimum-difficulty valve and a strict block-spacing rule may override the
//! computed target.

use log::{debug, warn};
use num_bigint::BigUint;

use crate::block::BlockHeader;
use crate::chain::ChainView;
use crate::difficulty::{bits_to_target, target_to_bits, truncate_u256};
use crate::network::ConsensusParams;

/// Heights above which the lower clamp bound is halved, then used in full.
const BOOTSTRAP_TIER_HEIGHT: u32 = 5_000;
const FULL_CLAMP_HEIGHT: u32 = 10_000;

/// Compact target required of `header`, the child of `last`.
///
/// `last` is `None` for the genesis block.
///
/// # Panics
///
/// If the index has no ancestor at the retarget lookback height. That only
/// happens on a corrupted index.
pub fn get_next_work_required<V: ChainView>(
    last: Option<&V>,
    header: &BlockHeader,
    params: &ConsensusParams,
) -> u32 {
    let pow_limit_bits = params.pow_limit_bits();

    let last = match last {
        Some(last) => last,
        None => return pow_limit_bits,
    };

    if allow_digishield_min_difficulty(last, header, params) {
        return pow_limit_bits;
    }

    let next_height = last.height() + 1;
    if !on_strict_schedule(last, header, params) {
        warn!(
            "block time {} at height {} not at expected time {}, enforcing high difficulty",
            header.block_time(),
            next_height,
            last.block_time() + params.pow_target_spacing
        );
        return pow_limit_bits;
    }

    let new_protocol = params.new_difficulty_protocol(next_height);
    let timespan = params.effective_timespan(next_height);
    let interval = params.difficulty_adjustment_interval(next_height);

    if i64::from(next_height) % interval != 0 {
        return last.bits();
    }

    // Go back the full interval except on the first retarget after genesis.
    let lookback = if i64::from(next_height) == interval {
        interval - 1
    } else {
        interval
    };

    let first_height = i64::from(last.height()) - lookback;
    assert!(
        first_height >= 0,
        "retarget lookback below genesis at height {}",
        next_height
    );
    let first = match last.ancestor(first_height as u32) {
        Some(first) => first,
        None => panic!("block index has no ancestor at height {}", first_height),
    };

    calculate_tiered_next_work_required(new_protocol, timespan, last, first.block_time(), params)
}

/// Plain retarget with a single `[timespan / 4, timespan * 4]` clamp.
///
/// Networks with retargeting disabled keep `last`'s target.
pub fn calculate_next_work_required<V: ChainView>(
    last: &V,
    first_block_time: i64,
    params: &ConsensusParams,
) -> u32 {
    if params.pow_no_retargeting {
        return last.bits();
    }

    let timespan = params.pow_target_timespan;
    let actual = (last.block_time() - first_block_time).clamp(timespan / 4, timespan * 4);

    retarget(last.bits(), actual, timespan, params)
}

/// Whether `header` may be mined at minimum difficulty.
///
/// Once strict spacing is active, an off-schedule block never qualifies.
pub fn allow_min_difficulty_for_block<V: ChainView>(
    last: &V,
    header: &BlockHeader,
    params: &ConsensusParams,
) -> bool {
    if !on_strict_schedule(last, header, params) {
        warn!(
            "block time {} not at expected time {}",
            header.block_time(),
            last.block_time() + params.pow_target_spacing
        );
        return false;
    }

    params.pow_allow_min_difficulty_blocks
}

/// With per-block retargeting, a block more than two spacings late may be
/// mined at minimum difficulty on networks that allow it.
fn allow_digishield_min_difficulty<V: ChainView>(
    last: &V,
    header: &BlockHeader,
    params: &ConsensusParams,
) -> bool {
    if !params.pow_allow_min_difficulty_blocks {
        return false;
    }

    if last.height() < params.min_difficulty_height {
        return false;
    }

    header.block_time() > last.block_time() + params.pow_target_spacing * 2
}

/// False when strict spacing is active and `header` is not exactly one
/// spacing after `last`.
fn on_strict_schedule<V: ChainView>(
    last: &V,
    header: &BlockHeader,
    params: &ConsensusParams,
) -> bool {
    if last.height() + 1 < params.strict_block_time_height {
        return true;
    }
    header.block_time() == last.block_time() + params.pow_target_spacing
}

fn calculate_tiered_next_work_required<V: ChainView>(
    new_protocol: bool,
    timespan: i64,
    last: &V,
    first_block_time: i64,
    params: &ConsensusParams,
) -> u32 {
    let height = last.height() + 1;

    let (min, max) = if new_protocol {
        (timespan - timespan / 4, timespan + timespan / 4)
    } else {
        (timespan / 4, timespan * 4)
    };

    let floor = if height > FULL_CLAMP_HEIGHT {
        min
    } else if height > BOOTSTRAP_TIER_HEIGHT {
        min / 2
    } else {
        min / 4
    };

    let measured = last.block_time() - first_block_time;
    let actual = measured.clamp(floor, max);

    debug!(
        "retarget at height {}: timespan {} measured {} clamped to {} in [{}, {}]",
        height, timespan, measured, actual, floor, max
    );

    retarget(last.bits(), actual, timespan, params)
}

/// Scale the target of `bits` by `actual / timespan`, capped at the limit.
fn retarget(bits: u32, actual: i64, timespan: i64, params: &ConsensusParams) -> u32 {
    let new_bits = target_to_bits(&scaled_target(bits, actual, timespan, params));
    debug!("retarget: {:08x} -> {:08x}", bits, new_bits);
    new_bits
}

/// The product wraps at 256 bits before the division; the cap is the raw
/// limit, not its compact rounding.
fn scaled_target(bits: u32, actual: i64, timespan: i64, params: &ConsensusParams) -> BigUint {
    let limit = params.pow_limit_target();

    // Clamp bounds are non-negative for any validated timespan.
    let actual = BigUint::from(actual.max(0) as u64);
    let timespan = BigUint::from(timespan as u64);

    let target = truncate_u256(bits_to_target(bits) * actual) / timespan;
    if target > limit {
        limit
    } else {
        target
    }
}
