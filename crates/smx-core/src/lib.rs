// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SMARTX CHAIN - CORE MODULE
//
// Data model (Address, Transaction, Block) and the Chain Engine: pending
// pool admission, mining, peer-block validation, and balance replay.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod address;
pub mod auth;
pub mod block;
pub mod chain;
pub mod transaction;

pub use address::{Address, InvalidAddress};
pub use auth::{AuthError, UserRegistry};
pub use block::{Block, BlockSigner, NullSigner, GENESIS_PREVIOUS_HASH};
pub use chain::{
    prefer_candidate, AppendError, ChainEngine, ChainError, DEFAULT_POOL_MAX, MINER_REWARD,
    VALIDATOR_REWARD,
};
pub use transaction::{Transaction, TransactionType, TxError};
