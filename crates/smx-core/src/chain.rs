//! Chain Engine: ordered blocks, pending pool, mining, balance replay
//! (spec §4.3).

use crate::address::Address;
use crate::auth::{AuthError, UserRegistry};
use crate::block::{Block, BlockSigner};
use crate::transaction::{Transaction, TransactionType, TxError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::{Mutex, RwLock};

/// Fixed reward credited to the miner of a block (spec §4.3 `minePending`).
pub const MINER_REWARD: &str = "50";
/// Fixed reward credited to each block validator (spec §9 Open Question 3
/// resolution: every accepted block's validator list is paid unconditionally,
/// quorum only gates *acceptance* of peer-sourced blocks).
pub const VALIDATOR_REWARD: &str = "1";
/// Default maximum pending-pool size before `appendTransaction` rejects with
/// `PoolFull` (spec §7).
pub const DEFAULT_POOL_MAX: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendError {
    Tx(TxError),
    PoolFull,
}

impl From<TxError> for AppendError {
    fn from(e: TxError) -> Self {
        AppendError::Tx(e)
    }
}

impl std::fmt::Display for AppendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppendError::Tx(e) => write!(f, "{e}"),
            AppendError::PoolFull => write!(f, "PoolFull"),
        }
    }
}

impl std::error::Error for AppendError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    DuplicateBlock,
    IndexSkip,
    ChainLinkBroken,
    HashMismatch,
    TxInvalid(TxError),
    /// Peer-sourced block carries no validator attestations (spec §9 Open
    /// Question 3 resolution: locally mined blocks are trusted
    /// unconditionally; blocks from peers must carry at least one
    /// validator address to be accepted).
    UnattestedBlock,
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::DuplicateBlock => write!(f, "DuplicateBlock"),
            ChainError::IndexSkip => write!(f, "IndexSkip"),
            ChainError::ChainLinkBroken => write!(f, "ChainLinkBroken"),
            ChainError::HashMismatch => write!(f, "HashMismatch"),
            ChainError::TxInvalid(e) => write!(f, "TxInvalid: {e}"),
            ChainError::UnattestedBlock => write!(f, "UnattestedBlock"),
        }
    }
}

impl std::error::Error for ChainError {}

struct ChainState {
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
    auth: UserRegistry,
}

/// The chain, its pending pool, and the sender-authentication table, behind
/// a reader/writer lock, with a dedicated mutex serializing mining attempts
/// (spec §5: "all chain reads take a shared lock, all chain writes an
/// exclusive lock... a dedicated mining operation acquires a chain mutex").
pub struct ChainEngine {
    state: RwLock<ChainState>,
    mining_lock: Mutex<()>,
    pool_max: usize,
}

impl ChainEngine {
    pub fn new(genesis: Block, pool_max: usize) -> Self {
        ChainEngine {
            state: RwLock::new(ChainState {
                blocks: vec![genesis],
                pending: Vec::new(),
                auth: UserRegistry::new(),
            }),
            mining_lock: Mutex::new(()),
            pool_max,
        }
    }

    /// Rebuilds a chain engine from a previously persisted block list
    /// (spec §4.8: "rebuild pool (empty on boot)"). Does not validate; call
    /// [`ChainEngine::is_valid`] after loading (spec §6: "Integrity is
    /// verified on load by `isValid()`").
    pub fn from_blocks(blocks: Vec<Block>, pool_max: usize) -> Self {
        ChainEngine {
            state: RwLock::new(ChainState {
                blocks,
                pending: Vec::new(),
                auth: UserRegistry::new(),
            }),
            mining_lock: Mutex::new(()),
            pool_max,
        }
    }

    pub fn len(&self) -> u64 {
        self.state.read().unwrap().blocks.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tip_hash(&self) -> String {
        self.state.read().unwrap().blocks.last().expect("chain always has genesis").hash.clone()
    }

    pub fn blocks_snapshot(&self) -> Vec<Block> {
        self.state.read().unwrap().blocks.clone()
    }

    pub fn block_at(&self, index: u64) -> Option<Block> {
        self.state.read().unwrap().blocks.get(index as usize).cloned()
    }

    pub fn pending_snapshot(&self) -> Vec<Transaction> {
        self.state.read().unwrap().pending.clone()
    }

    pub fn register_user(&self, address: Address, raw_key: &str) -> Result<(), AuthError> {
        self.state.write().unwrap().auth.register(address, raw_key)
    }

    /// Admits `tx` to the pending pool (spec §4.3 `appendTransaction`).
    pub fn append_transaction(&self, tx: Transaction, raw_key: &str) -> Result<(), AppendError> {
        let mut state = self.state.write().unwrap();
        if state.pending.len() >= self.pool_max {
            return Err(AppendError::PoolFull);
        }
        if !tx.kind.is_reward() && !state.auth.authenticate(&tx.sender, raw_key) {
            return Err(TxError::NotAuthenticated.into());
        }
        // Project balances through the pool itself, not just committed
        // blocks, so two pending transactions from the same sender can't
        // jointly overspend a balance neither alone would exceed.
        let mut balances = replay_balances(&state.blocks);
        for pending in &state.pending {
            apply_tx(&mut balances, pending);
        }
        tx.validate(|addr| *balances.get(addr).unwrap_or(&Decimal::ZERO))?;
        state.pending.push(tx);
        Ok(())
    }

    /// Mines the current pool into a new block (spec §4.3 `minePending`).
    /// Serialized by `mining_lock` so concurrent callers never race on the
    /// pool-copy-then-clear sequence.
    pub fn mine_pending(
        &self,
        miner: Address,
        validators: &[Address],
        now: DateTime<Utc>,
        signer: &dyn BlockSigner,
    ) -> Block {
        let _guard = self.mining_lock.lock().unwrap();
        let mut state = self.state.write().unwrap();

        let mut transactions = std::mem::take(&mut state.pending);
        let reward = Decimal::from_str_exact(MINER_REWARD).unwrap();
        transactions.push(Transaction::new(
            TransactionType::MinerReward,
            Address::system(),
            miner.clone(),
            reward,
            now,
            vec![],
            "block reward",
            Decimal::ZERO,
        ));
        let validator_reward = Decimal::from_str_exact(VALIDATOR_REWARD).unwrap();
        for validator in validators {
            transactions.push(Transaction::new(
                TransactionType::ValidatorReward,
                Address::system(),
                validator.clone(),
                validator_reward,
                now,
                vec![],
                "validator reward",
                Decimal::ZERO,
            ));
        }

        let index = state.blocks.len() as u64;
        let previous_hash = state.blocks.last().expect("chain always has genesis").hash.clone();
        let hash = Block::compute_hash(index, &previous_hash, now, &transactions, &miner, 0);
        let signature = signer.sign(&hash);
        let block = Block {
            index,
            previous_hash,
            hash,
            timestamp: now,
            transactions,
            miner_address: miner,
            validators: validators.to_vec(),
            nonce: 0,
            signature,
        };
        state.blocks.push(block.clone());
        block
    }

    /// Validates and appends a block received from a peer, or re-appends a
    /// locally-mined one (spec §4.3 `addBlock`). `trusted` is true only for
    /// blocks this node produced itself via [`ChainEngine::mine_pending`];
    /// peer-sourced blocks (`trusted = false`) additionally require a
    /// non-empty `validators` list (spec §9 Open Question 3 resolution).
    pub fn add_block(&self, block: Block, trusted: bool) -> Result<(), ChainError> {
        let mut state = self.state.write().unwrap();
        let expected_index = state.blocks.len() as u64;
        if block.index < expected_index {
            return Err(ChainError::DuplicateBlock);
        }
        if block.index > expected_index {
            return Err(ChainError::IndexSkip);
        }
        let expected_previous =
            state.blocks.last().expect("chain always has genesis").hash.clone();
        if block.previous_hash != expected_previous {
            return Err(ChainError::ChainLinkBroken);
        }
        if !block.hash_is_consistent() {
            return Err(ChainError::HashMismatch);
        }
        if !trusted && block.validators.is_empty() {
            return Err(ChainError::UnattestedBlock);
        }
        let mut balances = replay_balances(&state.blocks);
        for tx in &block.transactions {
            tx.validate(|addr| *balances.get(addr).unwrap_or(&Decimal::ZERO))
                .map_err(ChainError::TxInvalid)?;
            apply_tx(&mut balances, tx);
        }
        state.blocks.push(block);
        Ok(())
    }

    /// Sum over all blocks/transactions of credits minus non-reward debits
    /// (spec §4.3 `balance`, §8 invariant 3).
    pub fn balance(&self, address: &Address) -> Decimal {
        let state = self.state.read().unwrap();
        *replay_balances(&state.blocks).get(address).unwrap_or(&Decimal::ZERO)
    }

    /// True iff every block's links and hash are consistent and every
    /// transaction is individually valid under its block's projected
    /// balances (spec §4.3 `isValid`, §8 invariant 2).
    pub fn is_valid(&self) -> bool {
        let state = self.state.read().unwrap();
        let mut balances = std::collections::HashMap::new();
        for (i, block) in state.blocks.iter().enumerate() {
            if block.index != i as u64 {
                return false;
            }
            if i == 0 {
                if block.previous_hash != crate::block::GENESIS_PREVIOUS_HASH {
                    return false;
                }
            } else if block.previous_hash != state.blocks[i - 1].hash {
                return false;
            }
            if !block.hash_is_consistent() {
                return false;
            }
            for tx in &block.transactions {
                if tx.validate(|addr| *balances.get(addr).unwrap_or(&Decimal::ZERO)).is_err() {
                    return false;
                }
                apply_tx(&mut balances, tx);
            }
        }
        true
    }
}

fn replay_balances(blocks: &[Block]) -> std::collections::HashMap<Address, Decimal> {
    let mut balances = std::collections::HashMap::new();
    for block in blocks {
        for tx in &block.transactions {
            apply_tx(&mut balances, tx);
        }
    }
    balances
}

fn apply_tx(balances: &mut std::collections::HashMap<Address, Decimal>, tx: &Transaction) {
    if !tx.kind.touches_balance() {
        return;
    }
    *balances.entry(tx.recipient.clone()).or_insert(Decimal::ZERO) += tx.amount;
    if !tx.kind.is_reward() {
        *balances.entry(tx.sender.clone()).or_insert(Decimal::ZERO) -= tx.amount;
    }
}

/// True iff `candidate` should replace `local` under the longest-valid-chain
/// rule with lowest-tip-hash tie-break (spec §4.3 "Tie-break and ordering
/// rules", §9 Open Question 2).
pub fn prefer_candidate(
    local_len: u64,
    local_tip_hash: &str,
    candidate_len: u64,
    candidate_tip_hash: &str,
) -> bool {
    match candidate_len.cmp(&local_len) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => candidate_tip_hash < local_tip_hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::NullSigner;
    use std::str::FromStr;

    fn addr(suffix: char) -> Address {
        Address::parse(format!("smartX{}", suffix.to_string().repeat(40))).unwrap()
    }

    fn new_engine() -> ChainEngine {
        let genesis = Block::genesis(Address::system(), Utc::now(), &NullSigner);
        ChainEngine::new(genesis, DEFAULT_POOL_MAX)
    }

    #[test]
    fn mining_with_empty_pool_still_pays_miner_reward() {
        let engine = new_engine();
        let miner = addr('1');
        let block = engine.mine_pending(miner.clone(), &[], Utc::now(), &NullSigner);
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.transactions[0].kind, TransactionType::MinerReward);
        assert_eq!(block.transactions[0].recipient, miner);
        assert!(engine.pending_snapshot().is_empty());
    }

    #[test]
    fn mining_is_atomic_and_clears_pool() {
        let engine = new_engine();
        let a = addr('a');
        engine.register_user(a.clone(), "K").unwrap();
        // seed a's balance via a reward so the subsequent transfer has funds
        let _ = engine.mine_pending(a.clone(), &[], Utc::now(), &NullSigner);

        let tx = Transaction::new(
            TransactionType::NativeTransfer,
            a.clone(),
            addr('b'),
            Decimal::from_str("1").unwrap(),
            Utc::now(),
            vec![],
            "",
            Decimal::ZERO,
        );
        engine.append_transaction(tx, "K").unwrap();
        assert_eq!(engine.pending_snapshot().len(), 1);

        let miner = addr('1');
        let block = engine.mine_pending(miner.clone(), &[], Utc::now(), &NullSigner);
        assert_eq!(block.transactions.len(), 2); // transfer + reward
        assert!(engine.pending_snapshot().is_empty());
    }

    #[test]
    fn add_block_rejects_index_skip() {
        let engine = new_engine();
        let miner = addr('1');
        let now = Utc::now();
        let bad_hash = Block::compute_hash(5, &engine.tip_hash(), now, &[], &miner, 0);
        let block = Block {
            index: 5,
            previous_hash: engine.tip_hash(),
            hash: bad_hash,
            timestamp: now,
            transactions: vec![],
            miner_address: miner,
            validators: vec![addr('3')],
            nonce: 0,
            signature: String::new(),
        };
        assert_eq!(engine.add_block(block, false), Err(ChainError::IndexSkip));
    }

    #[test]
    fn add_block_rejects_hash_mismatch() {
        let engine = new_engine();
        let miner = addr('1');
        let now = Utc::now();
        let block = Block {
            index: 1,
            previous_hash: engine.tip_hash(),
            hash: "deadbeef".to_string(),
            timestamp: now,
            transactions: vec![],
            miner_address: miner,
            validators: vec![addr('3')],
            nonce: 0,
            signature: String::new(),
        };
        assert_eq!(engine.add_block(block, false), Err(ChainError::HashMismatch));
    }

    #[test]
    fn add_block_from_peer_requires_validators() {
        let engine = new_engine();
        let miner = addr('1');
        let now = Utc::now();
        let hash = Block::compute_hash(1, &engine.tip_hash(), now, &[], &miner, 0);
        let block = Block {
            index: 1,
            previous_hash: engine.tip_hash(),
            hash,
            timestamp: now,
            transactions: vec![],
            miner_address: miner,
            validators: vec![],
            nonce: 0,
            signature: String::new(),
        };
        assert_eq!(engine.add_block(block, false), Err(ChainError::UnattestedBlock));
    }

    #[test]
    fn locally_mined_block_needs_no_validators() {
        let engine = new_engine();
        let block = engine.mine_pending(addr('1'), &[], Utc::now(), &NullSigner);
        assert!(block.validators.is_empty());
        assert!(engine.is_valid());
        assert_eq!(engine.len(), 2);
    }

    #[test]
    fn balance_reflects_credits_and_debits() {
        let engine = new_engine();
        let a = addr('a');
        engine.register_user(a.clone(), "K").unwrap();
        let _ = engine.mine_pending(a.clone(), &[], Utc::now(), &NullSigner);
        assert_eq!(engine.balance(&a), Decimal::from_str(MINER_REWARD).unwrap());

        let tx = Transaction::new(
            TransactionType::NativeTransfer,
            a.clone(),
            addr('b'),
            Decimal::from_str("20").unwrap(),
            Utc::now(),
            vec![],
            "",
            Decimal::ZERO,
        );
        engine.append_transaction(tx, "K").unwrap();
        let _ = engine.mine_pending(addr('1'), &[], Utc::now(), &NullSigner);
        assert_eq!(
            engine.balance(&a),
            Decimal::from_str(MINER_REWARD).unwrap() - Decimal::from_str("20").unwrap()
        );
        assert_eq!(engine.balance(&addr('b')), Decimal::from_str("20").unwrap());
    }

    #[test]
    fn is_valid_holds_after_honest_mining() {
        let engine = new_engine();
        let _ = engine.mine_pending(addr('1'), &[], Utc::now(), &NullSigner);
        let _ = engine.mine_pending(addr('2'), &[], Utc::now(), &NullSigner);
        assert!(engine.is_valid());
    }

    #[test]
    fn tip_hash_tie_break_prefers_lowest_hash() {
        assert!(prefer_candidate(5, "ffff", 5, "0001"));
        assert!(!prefer_candidate(5, "0001", 5, "ffff"));
        assert!(prefer_candidate(5, "anything", 6, "zzzz"));
        assert!(!prefer_candidate(6, "anything", 5, "zzzz"));
    }

    #[test]
    fn not_authenticated_blocks_pool_admission() {
        let engine = new_engine();
        let a = addr('a');
        engine.register_user(a.clone(), "K").unwrap();
        let tx = Transaction::new(
            TransactionType::NativeTransfer,
            a,
            addr('b'),
            Decimal::from_str("1").unwrap(),
            Utc::now(),
            vec![],
            "",
            Decimal::ZERO,
        );
        let err = engine.append_transaction(tx, "WRONG").unwrap_err();
        assert_eq!(err, AppendError::Tx(TxError::NotAuthenticated));
        assert!(engine.pending_snapshot().is_empty());
    }

    #[test]
    fn pool_admission_rejects_a_second_transfer_that_would_jointly_overspend() {
        let engine = new_engine();
        let a = addr('a');
        engine.register_user(a.clone(), "K").unwrap();
        let _ = engine.mine_pending(a.clone(), &[], Utc::now(), &NullSigner); // funds a with MINER_REWARD (50)

        let first = Transaction::new(
            TransactionType::NativeTransfer,
            a.clone(),
            addr('b'),
            Decimal::from_str("40").unwrap(),
            Utc::now(),
            vec![],
            "",
            Decimal::ZERO,
        );
        engine.append_transaction(first, "K").unwrap();

        let second = Transaction::new(
            TransactionType::NativeTransfer,
            a.clone(),
            addr('c'),
            Decimal::from_str("40").unwrap(),
            Utc::now(),
            vec![],
            "",
            Decimal::ZERO,
        );
        let err = engine.append_transaction(second, "K").unwrap_err();
        assert_eq!(err, AppendError::Tx(TxError::InsufficientBalance));
        assert_eq!(engine.pending_snapshot().len(), 1);
    }
}
