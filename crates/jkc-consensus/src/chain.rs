//! Read-only view of the block index consulted by difficulty retargeting.
//!
//! The node's chain state implements [`ChainView`] over its own storage.
//! [`BlockIndex`] is an in-memory implementation: an append-only tree of
//! reference-counted entries with skip pointers, so ancestor lookups take
//! O(log n) steps instead of a walk over every parent.

use std::sync::Arc;

use crate::block::BlockHeader;
use crate::hash::Hash256;

/// Per-block metadata the retarget engine reads.
pub trait ChainView {
    /// Height of this block; genesis is 0.
    fn height(&self) -> u32;

    /// Block time, seconds since the Unix epoch.
    fn block_time(&self) -> i64;

    /// Compact target the block was mined at.
    fn bits(&self) -> u32;

    /// The ancestor of this block at `height`, or `None` above this block.
    fn ancestor(&self, height: u32) -> Option<&Self>;
}

/// An entry of the in-memory block index.
#[derive(Debug)]
pub struct BlockIndex {
    hash: Hash256,
    height: u32,
    timestamp: u32,
    bits: u32,
    prev: Option<Arc<BlockIndex>>,
    skip: Option<Arc<BlockIndex>>,
}

impl BlockIndex {
    /// Index entry for the genesis header.
    pub fn genesis(header: &BlockHeader) -> Arc<Self> {
        Arc::new(BlockIndex {
            hash: header.hash(),
            height: 0,
            timestamp: header.timestamp,
            bits: header.bits,
            prev: None,
            skip: None,
        })
    }

    /// Index entry for `header` on top of `prev`.
    pub fn extend(prev: &Arc<Self>, header: &BlockHeader) -> Arc<Self> {
        let height = prev.height + 1;
        let skip_to = skip_height(height);
        let skip = if skip_to == prev.height {
            Some(Arc::clone(prev))
        } else {
            prev.ancestor_link(skip_to).cloned()
        };

        Arc::new(BlockIndex {
            hash: header.hash(),
            height,
            timestamp: header.timestamp,
            bits: header.bits,
            prev: Some(Arc::clone(prev)),
            skip,
        })
    }

    /// Identity hash of the indexed header.
    pub fn hash(&self) -> &Hash256 {
        &self.hash
    }

    /// Parent entry; `None` at genesis.
    pub fn prev(&self) -> Option<&Arc<BlockIndex>> {
        self.prev.as_ref()
    }

    /// Link to the ancestor at `height`, which must be below this entry.
    fn ancestor_link(&self, height: u32) -> Option<&Arc<BlockIndex>> {
        let mut link = self.step_towards(height)?;
        while link.height > height {
            link = link.step_towards(height)?;
        }
        Some(link)
    }

    /// Follow the skip pointer when it does not overshoot `target` and is not
    /// beaten by the parent's skip pointer, otherwise the parent.
    fn step_towards(&self, target: u32) -> Option<&Arc<BlockIndex>> {
        let height_skip = skip_height(self.height);
        let height_skip_prev = skip_height(self.height - 1);
        if let Some(skip) = &self.skip {
            let parent_skip_better =
                height_skip_prev < height_skip.saturating_sub(2) && height_skip_prev >= target;
            if height_skip == target || (height_skip > target && !parent_skip_better) {
                return Some(skip);
            }
        }
        self.prev.as_ref()
    }
}

impl ChainView for BlockIndex {
    fn height(&self) -> u32 {
        self.height
    }

    fn block_time(&self) -> i64 {
        i64::from(self.timestamp)
    }

    fn bits(&self) -> u32 {
        self.bits
    }

    fn ancestor(&self, height: u32) -> Option<&Self> {
        if height > self.height {
            return None;
        }
        if height == self.height {
            return Some(self);
        }
        self.ancestor_link(height).map(|link| link.as_ref())
    }
}

// Unlink parents iteratively; a long chain would otherwise drop recursively.
impl Drop for BlockIndex {
    fn drop(&mut self) {
        let mut prev = self.prev.take();
        while let Some(entry) = prev {
            match Arc::try_unwrap(entry) {
                Ok(mut entry) => prev = entry.prev.take(),
                Err(_) => break,
            }
        }
    }
}

/// Clear the lowest set bit.
fn invert_lowest_one(n: u32) -> u32 {
    n & n.wrapping_sub(1)
}

/// Height the skip pointer of a block at `height` points to.
fn skip_height(height: u32) -> u32 {
    if height < 2 {
        return 0;
    }
    // Odd heights skip a little less far so that any ancestor can be reached
    // in few steps from every starting point.
    if height & 1 != 0 {
        invert_lowest_one(invert_lowest_one(height - 1)) + 1
    } else {
        invert_lowest_one(height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_chain(len: u32) -> Arc<BlockIndex> {
        let header = |n: u32| {
            let mut header =
                BlockHeader::new(1, 0, [0; 32], [0; 32], 1_000 + n * 60, 0x1e0fffff);
            header.nonce = n;
            header
        };
        let mut tip = BlockIndex::genesis(&header(0));
        for n in 1..len {
            tip = BlockIndex::extend(&tip, &header(n));
        }
        tip
    }

    #[test]
    fn test_skip_height() {
        assert_eq!(skip_height(0), 0);
        assert_eq!(skip_height(1), 0);
        assert_eq!(skip_height(2), 0);
        assert_eq!(skip_height(3), 1);
        assert_eq!(skip_height(4), 0);
        assert_eq!(skip_height(6), 4);
        assert_eq!(skip_height(7), 1);
        assert_eq!(skip_height(15), 9);
        assert_eq!(skip_height(12), 8);
        assert_eq!(skip_height(1000), 992);
    }

    #[test]
    fn test_ancestor_matches_parent_walk() {
        let tip = build_chain(1_000);
        assert_eq!(tip.height(), 999);

        let mut walk: &BlockIndex = &tip;
        loop {
            let found = tip.ancestor(walk.height()).unwrap();
            assert_eq!(found.hash(), walk.hash());
            assert_eq!(found.block_time(), 1_000 + i64::from(walk.height()) * 60);
            match walk.prev() {
                Some(prev) => walk = &**prev,
                None => break,
            }
        }
    }

    #[test]
    fn test_ancestor_bounds() {
        let tip = build_chain(10);
        assert!(tip.ancestor(10).is_none());
        assert_eq!(tip.ancestor(9).unwrap().height(), 9);
        assert_eq!(tip.ancestor(0).unwrap().height(), 0);

        let mid = tip.ancestor(5).unwrap();
        assert_eq!(mid.ancestor(2).unwrap().height(), 2);
        assert!(mid.ancestor(6).is_none());
    }

    #[test]
    fn test_forks_share_ancestors() {
        let base = build_chain(20);
        let fork = |prev: u8| BlockHeader::new(1, 0, [prev; 32], [0; 32], 5_000, 0x1e0fffff);
        let a = BlockIndex::extend(&base, &fork(1));
        let b = BlockIndex::extend(&base, &fork(2));
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.ancestor(7).unwrap().hash(), b.ancestor(7).unwrap().hash());
    }

    #[test]
    fn test_long_chain_drops() {
        let tip = build_chain(200_000);
        assert_eq!(tip.ancestor(123_456).unwrap().height(), 123_456);
        drop(tip);
    }
}
