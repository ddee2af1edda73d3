//! Contract Store: mapping from contract name to its deployed record
//! (spec §2, §3 "Contract Record", §4.1).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smx_core::Address;
use std::collections::HashMap;
use std::sync::RwLock;

/// Fields: `name`, `owner`, `serializedCode`, `gas`, `serializedState`
/// (spec §3). `serializedCode`/`serializedState` are Codec envelopes
/// (`smx_codec::encode`/`decode`), opaque to this module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractRecord {
    pub name: String,
    pub owner: Address,
    pub serialized_code: String,
    pub gas: Decimal,
    pub serialized_state: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// `name` is already deployed (spec §3 invariant: "`name` is unique
    /// within a chain").
    NameTaken,
    UnknownContract,
    /// Caller is not the contract's `owner` (spec §7 `NotOwner`).
    NotOwner,
    /// A concurrent writer updated the record between this caller's read
    /// and its compare-and-swap (spec §5: "the store updates atomically via
    /// compare-and-swap on the contract name key").
    Conflict,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StoreError::NameTaken => "contract name already deployed",
            StoreError::UnknownContract => "UnknownContract",
            StoreError::NotOwner => "NotOwner",
            StoreError::Conflict => "concurrent update conflict, retry",
        };
        write!(f, "{s}")
    }
}
impl std::error::Error for StoreError {}

/// Contract records keyed by name, behind a single lock (spec §4.1). State
/// updates go through [`ContractStore::update_state`], which performs a
/// compare-and-swap against the serialized state the caller last read
/// rather than blindly overwriting (spec §5's contract-state CAS policy).
#[derive(Default)]
pub struct ContractStore {
    records: RwLock<HashMap<String, ContractRecord>>,
}

impl ContractStore {
    pub fn new() -> Self {
        ContractStore { records: RwLock::new(HashMap::new()) }
    }

    pub fn from_records(records: Vec<ContractRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.name.clone(), r)).collect();
        ContractStore { records: RwLock::new(map) }
    }

    pub fn snapshot(&self) -> Vec<ContractRecord> {
        self.records.read().unwrap().values().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<ContractRecord> {
        self.records.read().unwrap().get(name).cloned()
    }

    /// Deploys a new contract (spec §4.5 `compile` precedes this; this is
    /// the `ContractCode` transaction's chain-level bookkeeping step).
    /// Fails with `NameTaken` if `name` is already in use.
    pub fn deploy(&self, record: ContractRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap();
        if records.contains_key(&record.name) {
            return Err(StoreError::NameTaken);
        }
        records.insert(record.name.clone(), record);
        Ok(())
    }

    /// Replaces `name`'s `serializedState` by compare-and-swap: the update
    /// is only applied if the stored state still equals `expected_state`
    /// (spec §3 "updates to state are always by appending a `ContractState`
    /// transaction"; spec §5's CAS policy on the contract-name key).
    pub fn update_state(
        &self,
        name: &str,
        expected_state: &str,
        new_state: String,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap();
        let record = records.get_mut(name).ok_or(StoreError::UnknownContract)?;
        if record.serialized_state != expected_state {
            return Err(StoreError::Conflict);
        }
        record.serialized_state = new_state;
        Ok(())
    }

    /// Authorization gate for owner-only operations (spec §7 `NotOwner`).
    pub fn check_owner(&self, name: &str, caller: &Address) -> Result<(), StoreError> {
        let records = self.records.read().unwrap();
        let record = records.get(name).ok_or(StoreError::UnknownContract)?;
        if &record.owner != caller {
            return Err(StoreError::NotOwner);
        }
        Ok(())
    }
}
