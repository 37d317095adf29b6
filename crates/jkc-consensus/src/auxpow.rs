//! Auxiliary (merge-mined) proof of work.
//!
//! A merge miner solves a parent-chain header whose coinbase commits to a
//! merkle tree of child-chain block hashes. The proof carries the parent
//! header, that coinbase, the branch linking the coinbase to the parent's
//! merkle root and the branch linking our block hash to the committed root.
//!
//! Inside the coinbase input script the commitment reads
//! `[fa be 6d 6d] [chain root, reversed] [tree size u32 LE] [nonce u32 LE]`,
//! the magic being optional on old proofs.

use log::warn;

use crate::block::BlockHeader;
use crate::coinbase::{CoinbaseBuilder, CoinbaseTransaction};
use crate::error::{AuxPowError, PowError};
use crate::hash::{reverse_bytes, Hash256};
use crate::merkle::check_merkle_branch;
use crate::network::ConsensusParams;
use crate::pow::verify_proof_of_work;

/// Magic marking the chain merkle root in a parent coinbase.
pub const MERGED_MINING_HEADER: [u8; 4] = [0xfa, 0xbe, b'm', b'm'];

/// Deepest chain merkle tree accepted.
pub const MAX_CHAIN_MERKLE_BRANCH: usize = 30;

/// Without the magic, the chain root must start within this many script bytes.
const MAX_ROOT_OFFSET_WITHOUT_HEADER: usize = 20;

/// A merge-mining proof attached to a block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxPow {
    /// The parent chain's coinbase transaction.
    pub coinbase_tx: CoinbaseTransaction,
    /// Branch from the coinbase txid to the parent merkle root.
    pub coinbase_branch: Vec<Hash256>,
    /// Position of the coinbase in the parent block; must be 0.
    pub coinbase_index: i32,
    /// Branch from our block hash to the committed chain merkle root.
    pub chain_branch: Vec<Hash256>,
    /// Our slot in the chain merkle tree.
    pub chain_index: i32,
    /// The parent chain header that carries the work.
    pub parent_block: BlockHeader,
}

impl AuxPow {
    /// Assemble a proof from the parent coinbase as transmitted.
    pub fn new(
        raw_coinbase_tx: Vec<u8>,
        coinbase_branch: Vec<Hash256>,
        coinbase_index: i32,
        chain_branch: Vec<Hash256>,
        chain_index: i32,
        parent_block: BlockHeader,
    ) -> Result<Self, AuxPowError> {
        Ok(AuxPow {
            coinbase_tx: CoinbaseTransaction::from_raw(raw_coinbase_tx)?,
            coinbase_branch,
            coinbase_index,
            chain_branch,
            chain_index,
            parent_block,
        })
    }

    /// Attach a minimal merge-mining proof to `header`: a one-chain tree,
    /// a coinbase committing to it, and a parent header whose merkle root is
    /// that coinbase. The parent's nonce is left for the miner to grind.
    pub fn attach_minimal(header: &mut BlockHeader) {
        // The version is part of the committed hash.
        header.set_auxpow_version(true);
        let block_hash = header.hash();

        let mut commitment = Vec::with_capacity(40);
        commitment.extend_from_slice(&reverse_bytes(&block_hash));
        commitment.extend_from_slice(&1u32.to_le_bytes());
        commitment.extend_from_slice(&0u32.to_le_bytes());

        let mut script_sig = Vec::with_capacity(41);
        script_sig.push(commitment.len() as u8);
        script_sig.extend_from_slice(&commitment);

        let coinbase_tx = CoinbaseBuilder::new(script_sig).build();
        let parent_block = BlockHeader {
            version: 1,
            prev_block_hash: [0u8; 32],
            merkle_root: coinbase_tx.txid,
            timestamp: header.timestamp,
            bits: header.bits,
            nonce: 0,
            auxpow: None,
        };

        header.set_auxpow(Some(AuxPow {
            coinbase_tx,
            coinbase_branch: Vec::new(),
            coinbase_index: 0,
            chain_branch: Vec::new(),
            chain_index: 0,
            parent_block,
        }));
    }

    /// Proof-of-work hash of the parent block.
    pub fn parent_pow_hash(&self) -> Result<Hash256, PowError> {
        self.parent_block.pow_hash()
    }

    /// Check that this proof commits to `aux_block_hash` for `chain_id`.
    ///
    /// The parent block's own work is not checked here.
    pub fn check(
        &self,
        aux_block_hash: &Hash256,
        chain_id: i32,
        params: &ConsensusParams,
    ) -> Result<(), AuxPowError> {
        if self.coinbase_index != 0 {
            return Err(AuxPowError::NotGenerate(self.coinbase_index));
        }

        if params.strict_chain_id && self.parent_block.chain_id() == chain_id {
            return Err(AuxPowError::ParentHasOurChainId);
        }

        if self.chain_branch.len() > MAX_CHAIN_MERKLE_BRANCH {
            return Err(AuxPowError::ChainBranchTooLong(self.chain_branch.len()));
        }

        let chain_root =
            check_merkle_branch(*aux_block_hash, &self.chain_branch, self.chain_index);
        let root_bytes = reverse_bytes(&chain_root);

        let coinbase_root = check_merkle_branch(
            self.coinbase_tx.txid,
            &self.coinbase_branch,
            self.coinbase_index,
        );
        if coinbase_root != self.parent_block.merkle_root {
            return Err(AuxPowError::MerkleRootMismatch);
        }

        let script = &self.coinbase_tx.script_sig;
        let root_pos = find(script, &root_bytes).ok_or(AuxPowError::MissingChainRoot)?;

        match find(script, &MERGED_MINING_HEADER) {
            Some(head_pos) => {
                // Only one commitment may exist, directly behind the magic.
                if find(&script[head_pos + 1..], &MERGED_MINING_HEADER).is_some() {
                    return Err(AuxPowError::MultipleMergedMiningHeaders);
                }
                if head_pos + MERGED_MINING_HEADER.len() != root_pos {
                    return Err(AuxPowError::MisplacedMergedMiningHeader);
                }
            }
            None => {
                if root_pos > MAX_ROOT_OFFSET_WITHOUT_HEADER {
                    return Err(AuxPowError::ChainRootTooLate);
                }
            }
        }

        let tail = &script[root_pos + root_bytes.len()..];
        if tail.len() < 8 {
            return Err(AuxPowError::MissingSizeAndNonce);
        }
        let size = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
        let nonce = u32::from_le_bytes([tail[4], tail[5], tail[6], tail[7]]);

        let merkle_height = self.chain_branch.len() as u32;
        if size != 1u32 << merkle_height {
            return Err(AuxPowError::BranchSizeMismatch {
                size,
                branch_len: self.chain_branch.len(),
            });
        }

        let expected = expected_index(nonce, chain_id, merkle_height);
        if self.chain_index != expected {
            return Err(AuxPowError::WrongChainIndex {
                got: self.chain_index,
                expected,
            });
        }

        Ok(())
    }
}

/// Slot a chain must occupy in a chain merkle tree of height `merkle_height`.
///
/// Two linear congruential steps over the coinbase nonce, the chain ID mixed
/// in between.
pub fn expected_index(nonce: u32, chain_id: i32, merkle_height: u32) -> i32 {
    let mut rand = nonce;
    rand = rand.wrapping_mul(1_103_515_245).wrapping_add(12_345);
    rand = rand.wrapping_add(chain_id as u32);
    rand = rand.wrapping_mul(1_103_515_245).wrapping_add(12_345);
    (rand % (1u32 << merkle_height)) as i32
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Check a header's proof of work, direct or merge-mined.
///
/// Rejections are logged; callers only learn accept or reject.
pub fn check_auxpow_proof_of_work(header: &BlockHeader, params: &ConsensusParams) -> bool {
    match verify_auxpow_proof_of_work(header, params) {
        Ok(()) => true,
        Err(err) => {
            warn!("check_auxpow_proof_of_work: {}", err);
            false
        }
    }
}

/// [`check_auxpow_proof_of_work`] with the rejection reason.
pub fn verify_auxpow_proof_of_work(
    header: &BlockHeader,
    params: &ConsensusParams,
) -> Result<(), AuxPowError> {
    // Legacy headers predate chain IDs; their placement is policed where the
    // height is known.
    if !header.is_legacy() && params.strict_chain_id && header.chain_id() != params.auxpow_chain_id
    {
        return Err(AuxPowError::WrongChainId {
            got: header.chain_id(),
            expected: params.auxpow_chain_id,
            version: header.version,
        });
    }

    let auxpow = match &header.auxpow {
        None => {
            if header.is_auxpow() {
                return Err(AuxPowError::MissingAuxPow);
            }

            // The genesis header does not meet its own target.
            if header.is_legacy() && params.genesis_hash == Some(header.hash()) {
                return Ok(());
            }

            let pow_hash = header.pow_hash().map_err(AuxPowError::OwnPow)?;
            return verify_proof_of_work(&pow_hash, header.bits, params)
                .map_err(AuxPowError::OwnPow);
        }
        Some(auxpow) => auxpow,
    };

    if !header.is_auxpow() {
        return Err(AuxPowError::UnexpectedAuxPow);
    }

    auxpow
        .check(&header.hash(), header.chain_id(), params)
        .map_err(|e| AuxPowError::InvalidAuxPow(Box::new(e)))?;

    // The parent only has to meet our target, not its own chain's.
    let parent_hash = auxpow.parent_pow_hash().map_err(AuxPowError::ParentPow)?;
    verify_proof_of_work(&parent_hash, header.bits, params).map_err(AuxPowError::ParentPow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoinbaseError;
    use crate::merkle::{compute_merkle_root, merkle_branch};

    const CHAIN_ID: i32 = 0x2022;
    const EASY_BITS: u32 = 0x207fffff;
    const IMPOSSIBLE_BITS: u32 = 0x03000001;

    fn child_header(bits: u32) -> BlockHeader {
        BlockHeader::new(4, CHAIN_ID, [0x11; 32], [0x22; 32], 1_700_000_000, bits)
    }

    fn grind_parent(header: &mut BlockHeader, params: &ConsensusParams) {
        for _ in 0..256 {
            let auxpow = header.auxpow.as_mut().unwrap();
            let hash = auxpow.parent_pow_hash().unwrap();
            if verify_proof_of_work(&hash, header.bits, params).is_ok() {
                return;
            }
            auxpow.parent_block.nonce += 1;
        }
        panic!("no parent nonce found");
    }

    fn grind_own(header: &mut BlockHeader, params: &ConsensusParams) {
        for _ in 0..256 {
            let hash = header.pow_hash().unwrap();
            if verify_proof_of_work(&hash, header.bits, params).is_ok() {
                return;
            }
            header.nonce += 1;
        }
        panic!("no nonce found");
    }

    fn mined_auxpow_header(params: &ConsensusParams) -> BlockHeader {
        let mut header = child_header(EASY_BITS);
        AuxPow::attach_minimal(&mut header);
        grind_parent(&mut header, params);
        header
    }

    #[test]
    fn test_minimal_auxpow_accepted() {
        let params = ConsensusParams::regtest();
        let header = mined_auxpow_header(&params);
        assert!(header.is_auxpow());
        assert!(check_auxpow_proof_of_work(&header, &params));
    }

    #[test]
    fn test_direct_pow_accepted_and_rejected() {
        let params = ConsensusParams::regtest();
        let mut header = child_header(EASY_BITS);
        grind_own(&mut header, &params);
        assert!(check_auxpow_proof_of_work(&header, &params));

        let hard = child_header(IMPOSSIBLE_BITS);
        assert!(matches!(
            verify_auxpow_proof_of_work(&hard, &params),
            Err(AuxPowError::OwnPow(PowError::HashAboveTarget { .. }))
        ));
    }

    #[test]
    fn test_wrong_chain_id_rejected() {
        let params = ConsensusParams::regtest();
        let header = BlockHeader::new(4, 0x1234, [0; 32], [0; 32], 0, EASY_BITS);
        assert_eq!(
            verify_auxpow_proof_of_work(&header, &params),
            Err(AuxPowError::WrongChainId {
                got: 0x1234,
                expected: CHAIN_ID,
                version: header.version,
            })
        );

        let mut relaxed = params.clone();
        relaxed.strict_chain_id = false;
        assert_ne!(
            verify_auxpow_proof_of_work(&header, &relaxed),
            Err(AuxPowError::WrongChainId {
                got: 0x1234,
                expected: CHAIN_ID,
                version: header.version,
            })
        );
    }

    #[test]
    fn test_version_and_payload_must_agree() {
        let params = ConsensusParams::regtest();

        let mut flagged = child_header(EASY_BITS);
        flagged.set_auxpow_version(true);
        assert_eq!(
            verify_auxpow_proof_of_work(&flagged, &params),
            Err(AuxPowError::MissingAuxPow)
        );

        let mut unflagged = mined_auxpow_header(&params);
        unflagged.set_auxpow_version(false);
        assert_eq!(
            verify_auxpow_proof_of_work(&unflagged, &params),
            Err(AuxPowError::UnexpectedAuxPow)
        );
    }

    #[test]
    fn test_genesis_exception() {
        let mut params = ConsensusParams::regtest();
        let genesis = BlockHeader::new(1, 0, [0; 32], [0x33; 32], 1_600_000_000, IMPOSSIBLE_BITS);
        assert!(!check_auxpow_proof_of_work(&genesis, &params));

        params.genesis_hash = Some(genesis.hash());
        assert!(check_auxpow_proof_of_work(&genesis, &params));

        // Only legacy-versioned headers get the exception.
        let mut modern = genesis.clone();
        modern.set_base_version(4, CHAIN_ID);
        params.genesis_hash = Some(modern.hash());
        assert!(!check_auxpow_proof_of_work(&modern, &params));
    }

    #[test]
    fn test_no_genesis_exception_without_configured_hash() {
        // Unconfigured presets exempt nothing, whatever the header hashes to.
        for params in [ConsensusParams::mainnet(), ConsensusParams::regtest()] {
            assert_eq!(params.genesis_hash, None);
            for merkle_root in [[0x00; 32], [0x33; 32], [0xff; 32]] {
                let header =
                    BlockHeader::new(1, 0, [0; 32], merkle_root, 1_600_000_000, IMPOSSIBLE_BITS);
                assert!(matches!(
                    verify_auxpow_proof_of_work(&header, &params),
                    Err(AuxPowError::OwnPow(_))
                ));
            }
        }
    }

    #[test]
    fn test_parent_failing_target_rejected() {
        let params = ConsensusParams::regtest();
        let mut header = child_header(IMPOSSIBLE_BITS);
        AuxPow::attach_minimal(&mut header);

        // The commitment itself is sound.
        let auxpow = header.auxpow.as_ref().unwrap();
        assert_eq!(auxpow.check(&header.hash(), CHAIN_ID, &params), Ok(()));

        assert!(matches!(
            verify_auxpow_proof_of_work(&header, &params),
            Err(AuxPowError::ParentPow(PowError::HashAboveTarget { .. }))
        ));
    }

    #[test]
    fn test_broken_commitment_rejected_despite_parent_work() {
        let params = ConsensusParams::regtest();
        let mut header = mined_auxpow_header(&params);

        // Changing our header changes the hash the coinbase must commit to.
        header.nonce += 1;
        assert!(matches!(
            verify_auxpow_proof_of_work(&header, &params),
            Err(AuxPowError::InvalidAuxPow(inner)) if *inner == AuxPowError::MissingChainRoot
        ));
    }

    #[test]
    fn test_check_rejections() {
        let params = ConsensusParams::regtest();
        let header = mined_auxpow_header(&params);
        let hash = header.hash();
        let good = header.auxpow.as_ref().unwrap();

        let mut not_generate = (**good).clone();
        not_generate.coinbase_index = 1;
        assert_eq!(
            not_generate.check(&hash, CHAIN_ID, &params),
            Err(AuxPowError::NotGenerate(1))
        );

        let mut own_chain_parent = (**good).clone();
        own_chain_parent.parent_block.set_base_version(4, CHAIN_ID);
        assert_eq!(
            own_chain_parent.check(&hash, CHAIN_ID, &params),
            Err(AuxPowError::ParentHasOurChainId)
        );

        let mut too_deep = (**good).clone();
        too_deep.chain_branch = vec![[0u8; 32]; MAX_CHAIN_MERKLE_BRANCH + 1];
        assert_eq!(
            too_deep.check(&hash, CHAIN_ID, &params),
            Err(AuxPowError::ChainBranchTooLong(MAX_CHAIN_MERKLE_BRANCH + 1))
        );

        let mut wrong_root = (**good).clone();
        wrong_root.parent_block.merkle_root = [0x99; 32];
        assert_eq!(
            wrong_root.check(&hash, CHAIN_ID, &params),
            Err(AuxPowError::MerkleRootMismatch)
        );
    }

    /// Build a proof for a coinbase script; parent merkle tree has two leaves.
    fn auxpow_with_script(
        script_sig: Vec<u8>,
        chain_branch: Vec<Hash256>,
        chain_index: i32,
    ) -> AuxPow {
        let coinbase_tx = CoinbaseBuilder::new(script_sig).build();
        let leaves = [coinbase_tx.txid, [0x77; 32]];
        let parent_block = BlockHeader {
            version: 1,
            prev_block_hash: [0; 32],
            merkle_root: compute_merkle_root(&leaves),
            timestamp: 0,
            bits: EASY_BITS,
            nonce: 0,
            auxpow: None,
        };
        AuxPow {
            coinbase_tx,
            coinbase_branch: merkle_branch(&leaves, 0),
            coinbase_index: 0,
            chain_branch,
            chain_index,
            parent_block,
        }
    }

    fn commitment(root: &Hash256, size: u32, nonce: u32) -> Vec<u8> {
        let mut out = reverse_bytes(root).to_vec();
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&nonce.to_le_bytes());
        out
    }

    #[test]
    fn test_multi_chain_tree_with_header() {
        let params = ConsensusParams::regtest();
        let our_hash = [0xab; 32];
        let nonce = 7;
        let height = 2;
        let slot = expected_index(nonce, CHAIN_ID, height) as usize;

        let mut leaves: Vec<Hash256> = (0..4u8).map(|i| [i; 32]).collect();
        leaves[slot] = our_hash;
        let root = compute_merkle_root(&leaves);

        let mut script = vec![0x03, 0x10, 0x27, 0x00];
        script.extend_from_slice(&MERGED_MINING_HEADER);
        script.extend_from_slice(&commitment(&root, 4, nonce));

        let auxpow = auxpow_with_script(script, merkle_branch(&leaves, slot), slot as i32);
        assert_eq!(auxpow.check(&our_hash, CHAIN_ID, &params), Ok(()));

        // Another chain ID expects a different slot or fails the root.
        assert!(auxpow.check(&our_hash, CHAIN_ID + 1, &params).is_err());
    }

    #[test]
    fn test_script_layout_rules() {
        let params = ConsensusParams::regtest();
        let our_hash = [0xcd; 32];
        let good = commitment(&our_hash, 1, 0);

        // Root too late without magic.
        let mut late = vec![0u8; 21];
        late.extend_from_slice(&good);
        assert_eq!(
            auxpow_with_script(late, vec![], 0).check(&our_hash, CHAIN_ID, &params),
            Err(AuxPowError::ChainRootTooLate)
        );

        // Magic not directly before the root.
        let mut gap = MERGED_MINING_HEADER.to_vec();
        gap.push(0x00);
        gap.extend_from_slice(&good);
        assert_eq!(
            auxpow_with_script(gap, vec![], 0).check(&our_hash, CHAIN_ID, &params),
            Err(AuxPowError::MisplacedMergedMiningHeader)
        );

        // Magic twice.
        let mut twice = MERGED_MINING_HEADER.to_vec();
        twice.extend_from_slice(&good);
        twice.extend_from_slice(&MERGED_MINING_HEADER);
        assert_eq!(
            auxpow_with_script(twice, vec![], 0).check(&our_hash, CHAIN_ID, &params),
            Err(AuxPowError::MultipleMergedMiningHeaders)
        );

        // Size and nonce cut short.
        let mut short = MERGED_MINING_HEADER.to_vec();
        short.extend_from_slice(&good[..36]);
        assert_eq!(
            auxpow_with_script(short, vec![], 0).check(&our_hash, CHAIN_ID, &params),
            Err(AuxPowError::MissingSizeAndNonce)
        );

        // Declared tree size disagrees with the branch.
        let mut wrong_size = MERGED_MINING_HEADER.to_vec();
        wrong_size.extend_from_slice(&commitment(&our_hash, 2, 0));
        assert_eq!(
            auxpow_with_script(wrong_size, vec![], 0).check(&our_hash, CHAIN_ID, &params),
            Err(AuxPowError::BranchSizeMismatch { size: 2, branch_len: 0 })
        );

        // Missing root entirely.
        assert_eq!(
            auxpow_with_script(vec![0x00; 40], vec![], 0).check(&our_hash, CHAIN_ID, &params),
            Err(AuxPowError::MissingChainRoot)
        );
    }

    #[test]
    fn test_wrong_chain_index() {
        let params = ConsensusParams::regtest();
        let our_hash = [0xef; 32];
        let nonce = 0x1234_5678;
        let slot = expected_index(nonce, CHAIN_ID, 1);
        let other = 1 - slot;

        let sibling = [0x01; 32];
        let leaves = if other == 0 { [our_hash, sibling] } else { [sibling, our_hash] };
        let root = compute_merkle_root(&leaves);

        let mut script = MERGED_MINING_HEADER.to_vec();
        script.extend_from_slice(&commitment(&root, 2, nonce));
        let auxpow = auxpow_with_script(script, vec![sibling], other);
        assert_eq!(
            auxpow.check(&our_hash, CHAIN_ID, &params),
            Err(AuxPowError::WrongChainIndex {
                got: other,
                expected: slot,
            })
        );
    }

    #[test]
    fn test_new_parses_raw_coinbase() {
        let params = ConsensusParams::regtest();
        let header = mined_auxpow_header(&params);
        let good = header.auxpow.as_ref().unwrap();

        let rebuilt = AuxPow::new(
            good.coinbase_tx.raw_tx.clone(),
            Vec::new(),
            0,
            Vec::new(),
            0,
            good.parent_block.clone(),
        )
        .unwrap();
        assert_eq!(&rebuilt, good.as_ref());

        let parent = good.parent_block.clone();
        assert_eq!(
            AuxPow::new(vec![1, 0, 0], Vec::new(), 0, Vec::new(), 0, parent),
            Err(AuxPowError::Coinbase(CoinbaseError::Truncated(0)))
        );
    }

    #[test]
    fn test_expected_index_is_bounded() {
        assert_eq!(expected_index(0, CHAIN_ID, 0), 0);
        for nonce in 0..64 {
            assert!(expected_index(nonce, CHAIN_ID, 3) < 8);
        }
        // A zero nonce reduces the first step to its increment.
        let rand = 12_345u32
            .wrapping_add(CHAIN_ID as u32)
            .wrapping_mul(1_103_515_245)
            .wrapping_add(12_345);
        assert_eq!(expected_index(0, CHAIN_ID, 4), (rand % 16) as i32);
    }
}
