//! Parent-chain coinbase transactions.
//!
//! A merge-mining proof commits to our block through the input script of the
//! parent block's coinbase. Only two things are read from it: its txid, which
//! must sit at the bottom of the parent's merkle tree, and that input script.

use crate::error::CoinbaseError;
use crate::hash::{double_sha256, Hash256};

/// A parent coinbase transaction in legacy (non-witness) serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinbaseTransaction {
    /// Raw transaction bytes, the preimage of the txid.
    pub raw_tx: Vec<u8>,
    /// Transaction ID (double SHA256 of raw_tx).
    pub txid: Hash256,
    /// Input script of the first input.
    pub script_sig: Vec<u8>,
}

impl CoinbaseTransaction {
    /// Read the txid and first input script from raw transaction bytes.
    pub fn from_raw(raw_tx: Vec<u8>) -> Result<Self, CoinbaseError> {
        let mut reader = Reader::new(&raw_tx);
        reader.skip(4)?; // version
        let input_count = reader.compact_size()?;
        if input_count == 0 {
            return Err(CoinbaseError::NoInputs);
        }
        reader.skip(36)?; // prevout
        let script_len = reader.compact_size()?;
        let script_sig = reader.take(script_len)?.to_vec();

        Ok(CoinbaseTransaction {
            txid: double_sha256(&raw_tx),
            raw_tx,
            script_sig,
        })
    }
}

/// Builder for parent coinbase transactions, as a merge miner assembles them.
pub struct CoinbaseBuilder {
    script_sig: Vec<u8>,
    outputs: Vec<TxOutput>,
}

struct TxOutput {
    value: u64,
    script_pubkey: Vec<u8>,
}

impl CoinbaseBuilder {
    /// Create a builder with the given input script.
    pub fn new(script_sig: Vec<u8>) -> Self {
        CoinbaseBuilder {
            script_sig,
            outputs: Vec::new(),
        }
    }

    /// Add an output.
    pub fn with_output(mut self, value: u64, script_pubkey: Vec<u8>) -> Self {
        self.outputs.push(TxOutput {
            value,
            script_pubkey,
        });
        self
    }

    /// Serialize and hash the transaction.
    pub fn build(&self) -> CoinbaseTransaction {
        let mut raw_tx = Vec::with_capacity(128 + self.script_sig.len());

        raw_tx.extend_from_slice(&1u32.to_le_bytes());

        // One input spending the null outpoint
        raw_tx.push(0x01);
        raw_tx.extend_from_slice(&[0u8; 32]);
        raw_tx.extend_from_slice(&0xFFFFFFFFu32.to_le_bytes());
        encode_varint(self.script_sig.len() as u64, &mut raw_tx);
        raw_tx.extend_from_slice(&self.script_sig);
        raw_tx.extend_from_slice(&0xFFFFFFFFu32.to_le_bytes());

        encode_varint(self.outputs.len() as u64, &mut raw_tx);
        for output in &self.outputs {
            raw_tx.extend_from_slice(&output.value.to_le_bytes());
            encode_varint(output.script_pubkey.len() as u64, &mut raw_tx);
            raw_tx.extend_from_slice(&output.script_pubkey);
        }

        // Locktime
        raw_tx.extend_from_slice(&0u32.to_le_bytes());

        CoinbaseTransaction {
            txid: double_sha256(&raw_tx),
            raw_tx,
            script_sig: self.script_sig.clone(),
        }
    }
}

/// Encode a variable-length integer (Bitcoin varint).
fn encode_varint(value: u64, output: &mut Vec<u8>) {
    if value < 0xfd {
        output.push(value as u8);
    } else if value <= 0xffff {
        output.push(0xfd);
        output.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffffffff {
        output.push(0xfe);
        output.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        output.push(0xff);
        output.extend_from_slice(&value.to_le_bytes());
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn take(&mut self, len: u64) -> Result<&'a [u8], CoinbaseError> {
        let remaining = (self.bytes.len() - self.pos) as u64;
        if len > remaining {
            return Err(CoinbaseError::Truncated(self.pos));
        }
        let start = self.pos;
        self.pos += len as usize;
        Ok(&self.bytes[start..self.pos])
    }

    fn skip(&mut self, len: u64) -> Result<(), CoinbaseError> {
        self.take(len).map(|_| ())
    }

    fn compact_size(&mut self) -> Result<u64, CoinbaseError> {
        let start = self.pos;
        let first = self.take(1)?[0];
        let (value, min) = match first {
            0xfd => {
                let b = self.take(2)?;
                (u64::from(u16::from_le_bytes([b[0], b[1]])), 0xfd)
            }
            0xfe => {
                let b = self.take(4)?;
                (u64::from(u32::from_le_bytes([b[0], b[1], b[2], b[3]])), 0x1_0000)
            }
            0xff => {
                let b = self.take(8)?;
                let mut arr = [0u8; 8];
                arr.copy_from_slice(b);
                (u64::from_le_bytes(arr), 0x1_0000_0000)
            }
            n => return Ok(u64::from(n)),
        };
        if value < min {
            return Err(CoinbaseError::NonCanonicalSize(start));
        }
        Ok(value)
    }
}
