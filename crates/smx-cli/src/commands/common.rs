//! Shared archive loading/saving for the offline subcommands: the CLI
//! talks to a node's persisted chain archive directly rather than over the
//! peer wire protocol, since spec.md's wire table has no transaction-submit
//! request form and HTTP/REST is an excluded external collaborator
//! (spec.md §1, §6).

use chrono::Utc;
use colored::Colorize;
use smx_contracts::ContractStore;
use smx_core::{Address, Block, ChainEngine, NullSigner, DEFAULT_POOL_MAX};
use smx_network::PeerRecord;
use smx_node::{Archive, ArchiveStore, NodeConfig};

pub fn load_config(path: &str) -> Result<NodeConfig, String> {
    NodeConfig::from_file(path).map_err(|e| format!("{path}: {e}"))
}

pub struct OpenedArchive {
    pub chain: ChainEngine,
    pub contracts: ContractStore,
    pub peers: Vec<PeerRecord>,
    pub store: ArchiveStore,
}

/// Loads the archive named by `config.blockchain_path`, creating a fresh
/// genesis-only chain if no archive exists yet (mirrors
/// [`smx_node::Supervisor::boot`]'s own fallback, so `smartx-cli` can bring
/// up a brand-new chain id without first starting a node).
pub fn open_archive(config: &NodeConfig) -> Result<OpenedArchive, String> {
    let store = ArchiveStore::new(config.blockchain_path.clone());
    let archive = store.load().map_err(|e| e.to_string())?;
    let genesis_miner =
        Address::parse(config.miner_address.clone()).unwrap_or_else(|_| Address::system());

    let blocks = if archive.blocks.is_empty() {
        vec![Block::genesis(genesis_miner, Utc::now(), &NullSigner)]
    } else {
        archive.blocks
    };
    let chain = ChainEngine::from_blocks(blocks, DEFAULT_POOL_MAX);
    if !chain.is_valid() {
        return Err("persisted chain failed isValid()".to_string());
    }
    Ok(OpenedArchive {
        chain,
        contracts: ContractStore::from_records(archive.contracts),
        peers: archive.peers,
        store,
    })
}

pub fn persist(opened: &OpenedArchive) -> Result<(), String> {
    let archive = Archive {
        blocks: opened.chain.blocks_snapshot(),
        contracts: opened.contracts.snapshot(),
        peers: opened.peers.clone(),
    };
    opened.store.save(&archive).map_err(|e| e.to_string())
}

pub fn print_success(message: &str) {
    println!("{} {message}", "✔".green());
}

pub fn print_failure(message: &str) {
    eprintln!("{} {message}", "✘".red());
}
