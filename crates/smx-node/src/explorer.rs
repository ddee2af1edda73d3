//! Read-only query surface used by a block explorer (spec §6, SPEC_FULL
//! §4): plain query functions over the chain and contract store. The
//! explorer's own HTTP/JSON front door is an excluded external collaborator
//! (spec §1) — these functions are what the peer TCP server's
//! `GetBlockCount`/`GetContractCode`/`GetUserTransactions` forms call into.

use rust_decimal::Decimal;
use serde::Serialize;
use smx_contracts::ContractStore;
use smx_core::{Address, Block, ChainEngine, Transaction};

pub fn block_count(chain: &ChainEngine) -> u64 {
    chain.len()
}

pub fn get_block(chain: &ChainEngine, index: u64) -> Option<Block> {
    chain.block_at(index)
}

#[derive(Debug, Serialize)]
pub struct ContractCodeView {
    pub name: String,
    pub owner: Address,
    pub gas: Decimal,
    pub serialized_code: String,
}

/// `GetContractCode/<name>` (spec §6): the deployed source envelope plus
/// the metadata an explorer would show alongside it.
pub fn get_contract_code(store: &ContractStore, name: &str) -> Option<ContractCodeView> {
    store.get(name).map(|record| ContractCodeView {
        name: record.name,
        owner: record.owner,
        gas: record.gas,
        serialized_code: record.serialized_code,
    })
}

/// `GetUserTransactions/<address>` (spec §6): every transaction across the
/// whole chain where `address` is sender or recipient, in chain order.
pub fn get_user_transactions(chain: &ChainEngine, address: &Address) -> Vec<Transaction> {
    chain
        .blocks_snapshot()
        .into_iter()
        .flat_map(|block| block.transactions)
        .filter(|tx| &tx.sender == address || &tx.recipient == address)
        .collect()
}
