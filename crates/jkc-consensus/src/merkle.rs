//! Merkle trees and merkle branches.
//!
//! Branches prove that a leaf sits at a given index under a root. The auxpow
//! proof carries two of them: coinbase-in-parent-block and block-in-chain-tree.

use crate::hash::{hash_pair, Hash256};

/// Compute the merkle root of a list of leaves.
///
/// A single leaf is its own root. Odd levels duplicate their last node.
pub fn compute_merkle_root(leaves: &[Hash256]) -> Hash256 {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    let mut current_level: Vec<Hash256> = leaves.to_vec();
    while current_level.len() > 1 {
        current_level = next_level(&current_level);
    }
    current_level[0]
}

fn next_level(level: &[Hash256]) -> Vec<Hash256> {
    level
        .chunks(2)
        .map(|pair| {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            hash_pair(left, right)
        })
        .collect()
}

/// Build the branch proving the leaf at `index` under [`compute_merkle_root`].
pub fn merkle_branch(leaves: &[Hash256], mut index: usize) -> Vec<Hash256> {
    let mut branch = Vec::new();
    let mut level: Vec<Hash256> = leaves.to_vec();
    while level.len() > 1 {
        let sibling = (index ^ 1).min(level.len() - 1);
        branch.push(level[sibling]);
        level = next_level(&level);
        index >>= 1;
    }
    branch
}

/// Fold `leaf` up `branch`, taking the side at each level from the low bit
/// of `index`. An index of -1 yields the zero hash.
pub fn check_merkle_branch(leaf: Hash256, branch: &[Hash256], index: i32) -> Hash256 {
    if index == -1 {
        return [0u8; 32];
    }

    let mut hash = leaf;
    let mut index = index;
    for node in branch {
        hash = if index & 1 != 0 {
            hash_pair(node, &hash)
        } else {
            hash_pair(&hash, node)
        };
        index >>= 1;
    }
    hash
}
