//! Node Supervisor (spec §4.8): boots every component, wires them
//! together, and drives the periodic heartbeat/sync/prune loops plus the
//! peer request server until told to shut down.

use crate::config::NodeConfig;
use crate::db::{Archive, ArchiveStore, DbError};
use crate::external::{KeyProvider, Keypair};
use crate::server::{self, ServerContext};
use chrono::Utc;
use smx_contracts::ContractStore;
use smx_core::{Address, Block, ChainEngine, NullSigner, DEFAULT_POOL_MAX};
use smx_network::{
    fetch_full_chain_if_longer, register_with_peer, sync_tick, PeerRegistry, PeerTransport,
    TcpTransport, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TICK_INTERVAL,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Peer-prune loop interval. Not specified by spec §4.7 (only the sync
/// tick's 20s default is), chosen coarser than the sync tick since stale
/// peers change slowly.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);
/// A peer not seen within this window is dropped from the registry.
const PRUNE_MAX_AGE: chrono::Duration = chrono::Duration::minutes(10);
/// Heartbeat loop interval: finer-grained than the sync tick so liveness is
/// detected faster than a full chain-comparison pass.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
/// Upper bound on the peer registry (spec §4.6 `addPeer`'s "up to a
/// configured maximum").
const MAX_PEERS: usize = 256;

#[derive(Debug)]
pub enum BootError {
    Db(DbError),
    KeyProvider(String),
    ChainInvalid,
}

impl std::fmt::Display for BootError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BootError::Db(e) => write!(f, "{e}"),
            BootError::KeyProvider(e) => write!(f, "key provider failed: {e}"),
            BootError::ChainInvalid => write!(f, "persisted chain failed isValid() on load"),
        }
    }
}
impl std::error::Error for BootError {}

pub struct Supervisor {
    pub config: NodeConfig,
    pub chain: Arc<ChainEngine>,
    pub peers: Arc<PeerRegistry>,
    pub contracts: Arc<ContractStore>,
    pub keypair: Keypair,
    archive_store: ArchiveStore,
    shutdown: Arc<AtomicBool>,
}

impl Supervisor {
    /// Loads configuration-driven state and wires the three long-lived
    /// components together (spec §4.8 "Boots:" sequence, steps 1-6).
    pub fn boot(config: NodeConfig, key_provider: &dyn KeyProvider) -> Result<Self, BootError> {
        let archive_store = ArchiveStore::new(config.blockchain_path.clone());
        let archive = archive_store.load().map_err(BootError::Db)?;

        let keypair = key_provider
            .load_or_create(Some(&config.miner_address))
            .map_err(BootError::KeyProvider)?;
        let self_address = Address::parse(keypair.address.clone())
            .unwrap_or_else(|_| Address::system());

        let blocks = if archive.blocks.is_empty() {
            vec![Block::genesis(self_address, Utc::now(), &NullSigner)]
        } else {
            archive.blocks
        };
        let chain = ChainEngine::from_blocks(blocks, DEFAULT_POOL_MAX);
        if !chain.is_valid() {
            return Err(BootError::ChainInvalid);
        }

        let peers = PeerRegistry::from_peers(archive.peers, MAX_PEERS);
        let now = Utc::now();
        for peer_url in &config.peers {
            let _ = peers.add_peer(peer_url, &config.chain_id, now);
        }

        let contracts = ContractStore::from_records(archive.contracts);

        println!("🚀 node booted: chain_id={}, chain_len={}", config.chain_id, chain.len());

        Ok(Supervisor {
            config,
            chain: Arc::new(chain),
            peers: Arc::new(peers),
            contracts: Arc::new(contracts),
            keypair,
            archive_store,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    fn self_url(&self) -> String {
        format!("http://{}:{}", self.config.ip, self.config.port)
    }

    /// Registers with every configured bootstrap peer (spec §4.8: "register
    /// with configured bootstrap peers"). Failures are logged, not fatal:
    /// an unreachable bootstrap peer at boot is routine, not a config error.
    fn register_with_bootstrap_peers(&self) {
        let transport = TcpTransport;
        let self_url = self.self_url();
        for peer_url in &self.config.peers {
            match register_with_peer(&self_url, &self.config.chain_id, peer_url, &transport, DEFAULT_REQUEST_TIMEOUT)
            {
                Ok(()) => println!("🤝 registered with bootstrap peer {peer_url}"),
                Err(e) => eprintln!("⚠️  could not register with {peer_url}: {e}"),
            }
        }
    }

    /// Runs the heartbeat, sync, and prune loops plus the request server
    /// until `shutdown` is set, then persists and returns (spec §4.8 "On
    /// shutdown: persist chain and peer list; stop all periodic tasks").
    pub fn run(self: Arc<Self>) -> std::io::Result<()> {
        self.register_with_bootstrap_peers();

        let heartbeat_handle = {
            let supervisor = Arc::clone(&self);
            std::thread::spawn(move || supervisor.heartbeat_loop())
        };
        let sync_handle = {
            let supervisor = Arc::clone(&self);
            std::thread::spawn(move || supervisor.sync_loop())
        };
        let prune_handle = {
            let supervisor = Arc::clone(&self);
            std::thread::spawn(move || supervisor.prune_loop())
        };

        let server_ctx = Arc::new(ServerContext {
            chain: Arc::clone(&self.chain),
            peers: Arc::clone(&self.peers),
            contracts: Arc::clone(&self.contracts),
            chain_id: self.config.chain_id.clone(),
        });
        let bind_addr = self.config.bind_addr();
        let result = server::serve(server_ctx, &bind_addr, Arc::clone(&self.shutdown));

        self.shutdown.store(true, Ordering::Relaxed);
        let _ = heartbeat_handle.join();
        let _ = sync_handle.join();
        let _ = prune_handle.join();

        if let Err(e) = self.persist() {
            eprintln!("⚠️  failed to persist archive on shutdown: {e}");
        }
        println!("👋 node shut down cleanly");
        result
    }

    fn heartbeat_loop(&self) {
        let transport = TcpTransport;
        let self_url = self.self_url();
        while !self.shutdown.load(Ordering::Relaxed) {
            for peer in self.peers.list() {
                let request = smx_network::Request::Heartbeat { url: self_url.clone() };
                let _ = transport.request(&peer.url, &request, DEFAULT_REQUEST_TIMEOUT);
            }
            sleep_while_not_shutdown(&self.shutdown, HEARTBEAT_INTERVAL);
        }
    }

    fn sync_loop(&self) {
        let transport = TcpTransport;
        let self_url = self.self_url();
        while !self.shutdown.load(Ordering::Relaxed) {
            let peer_urls: Vec<String> = self.peers.list().into_iter().map(|p| p.url).collect();
            let outcomes =
                sync_tick(&self.chain, &peer_urls, &self_url, &transport, DEFAULT_REQUEST_TIMEOUT);
            let extended = outcomes.iter().any(|o| o.blocks_added > 0);

            // GetChain path: adopt a strictly-longer validated chain wholesale
            // if the incremental BlockCount/GetBlock path above didn't fully
            // catch up (spec §4.7's secondary full-chain request form).
            for peer_url in &peer_urls {
                if let Ok(Some(blocks)) =
                    fetch_full_chain_if_longer(&self.chain, peer_url, &self_url, &transport, DEFAULT_REQUEST_TIMEOUT)
                {
                    println!("⛓️  adopted {} blocks from {peer_url}", blocks.len());
                }
            }

            if extended {
                if let Err(e) = self.persist() {
                    eprintln!("⚠️  failed to persist chain after sync: {e}");
                }
            }
            sleep_while_not_shutdown(&self.shutdown, DEFAULT_TICK_INTERVAL);
        }
    }

    fn prune_loop(&self) {
        while !self.shutdown.load(Ordering::Relaxed) {
            self.peers.prune(PRUNE_MAX_AGE, Utc::now());
            sleep_while_not_shutdown(&self.shutdown, PRUNE_INTERVAL);
        }
    }

    fn persist(&self) -> Result<(), DbError> {
        let archive = Archive {
            blocks: self.chain.blocks_snapshot(),
            contracts: self.contracts.snapshot(),
            peers: self.peers.list(),
        };
        self.archive_store.save(&archive)
    }
}

/// Sleeps in short increments so a shutdown request is observed promptly
/// instead of only between full-length intervals (spec §5: "every periodic
/// loop observes a cancellation token checked between iterations").
fn sleep_while_not_shutdown(shutdown: &AtomicBool, total: Duration) {
    const STEP: Duration = Duration::from_millis(200);
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        let step = remaining.min(STEP);
        std::thread::sleep(step);
        remaining -= step;
    }
}
