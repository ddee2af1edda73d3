//! Block data model and hash computation (spec §3).

use crate::address::Address;
use crate::transaction::Transaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smx_crypto::hash_hex;

/// Sentinel `previousHash` carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Produces the block's self-signature over its own hash. Real signing
/// material is owned by the node's external key-derivation collaborator
/// (spec §1, §6); the chain engine only needs *some* deterministic stand-in
/// so `is_valid` can be checked without a live signer, which is why this is
/// a trait rather than a hardcoded call into a keystore.
pub trait BlockSigner {
    fn sign(&self, hash: &str) -> String;
}

/// Stand-in signer: the "signature" is just a second hash of the block
/// hash. Used wherever no real signing key is wired in (tests, genesis).
pub struct NullSigner;

impl BlockSigner for NullSigner {
    fn sign(&self, hash: &str) -> String {
        hash_hex(hash.as_bytes())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub previous_hash: String,
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub transactions: Vec<Transaction>,
    pub miner_address: Address,
    pub validators: Vec<Address>,
    pub nonce: u64,
    pub signature: String,
}

impl Block {
    /// `H(index‖previousHash‖timestamp‖canonical(transactions)‖minerAddress‖nonce)`
    /// (spec §3). Canonical transaction bytes are this type's own
    /// `serde_json` encoding, which is stable because field order follows
    /// struct declaration order.
    pub fn compute_hash(
        index: u64,
        previous_hash: &str,
        timestamp: DateTime<Utc>,
        transactions: &[Transaction],
        miner_address: &Address,
        nonce: u64,
    ) -> String {
        let canonical_txs =
            serde_json::to_vec(transactions).expect("transactions must be JSON-serializable");
        let mut buf = Vec::new();
        buf.extend_from_slice(&index.to_be_bytes());
        buf.extend_from_slice(previous_hash.as_bytes());
        buf.extend_from_slice(timestamp.to_rfc3339().as_bytes());
        buf.extend_from_slice(&canonical_txs);
        buf.extend_from_slice(miner_address.as_str().as_bytes());
        buf.extend_from_slice(&nonce.to_be_bytes());
        hash_hex(&buf)
    }

    pub fn genesis(miner: Address, timestamp: DateTime<Utc>, signer: &dyn BlockSigner) -> Self {
        let hash = Block::compute_hash(0, GENESIS_PREVIOUS_HASH, timestamp, &[], &miner, 0);
        let signature = signer.sign(&hash);
        Block {
            index: 0,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            hash,
            timestamp,
            transactions: Vec::new(),
            miner_address: miner,
            validators: Vec::new(),
            nonce: 0,
            signature,
        }
    }

    /// True iff the stored `hash` matches a fresh recomputation from the
    /// block's own fields.
    pub fn hash_is_consistent(&self) -> bool {
        let recomputed = Block::compute_hash(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.transactions,
            &self.miner_address,
            self.nonce,
        );
        recomputed == self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_hash_is_self_consistent() {
        let block = Block::genesis(Address::system(), Utc::now(), &NullSigner);
        assert!(block.hash_is_consistent());
        assert_eq!(block.previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(block.index, 0);
    }

    #[test]
    fn tampering_with_nonce_breaks_hash_consistency() {
        let mut block = Block::genesis(Address::system(), Utc::now(), &NullSigner);
        block.nonce = 1;
        assert!(!block.hash_is_consistent());
    }
}
