//! Sync Engine: periodic chain-length comparison and missing-block fetch
//! with conflict resolution (spec §4.7).

use crate::protocol::{Reply, Request};
use crate::transport::{PeerTransport, TransportError};
use smx_core::{Block, ChainEngine};
use std::time::Duration;

/// Default tick interval (spec §4.7: "Periodic loop (every tick, default 20 s)").
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    Transport(TransportError),
    UnexpectedReply(String),
    ChainNotValidated,
    Decode(String),
    Rejected(String),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Transport(e) => write!(f, "{e}"),
            SyncError::UnexpectedReply(s) => write!(f, "unexpected reply: {s}"),
            SyncError::ChainNotValidated => write!(f, "peer reported 'invalid' to ValidateChain"),
            SyncError::Decode(s) => write!(f, "CodecFailed: {s}"),
            SyncError::Rejected(s) => write!(f, "block rejected: {s}"),
        }
    }
}
impl std::error::Error for SyncError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSyncOutcome {
    pub peer_url: String,
    pub blocks_added: u64,
    pub error: Option<SyncError>,
}

/// Runs one sync tick over `peers` against `chain`, per spec §4.7's
/// numbered steps. Returns one [`PeerSyncOutcome`] per peer, in order; a
/// peer whose first step fails (unreachable, shorter chain, failed
/// validation) is simply skipped in favor of the next one (spec: "Abort the
/// loop on the first failure and move on to the next peer").
pub fn sync_tick(
    chain: &ChainEngine,
    peers: &[String],
    self_url: &str,
    transport: &dyn PeerTransport,
    timeout: Duration,
) -> Vec<PeerSyncOutcome> {
    let mut outcomes = Vec::with_capacity(peers.len());
    for peer_url in peers {
        outcomes.push(sync_with_peer(chain, peer_url, self_url, transport, timeout));
    }
    outcomes
}

fn sync_with_peer(
    chain: &ChainEngine,
    peer_url: &str,
    self_url: &str,
    transport: &dyn PeerTransport,
    timeout: Duration,
) -> PeerSyncOutcome {
    let local_len = chain.len();
    let no_change = |error: Option<SyncError>| PeerSyncOutcome {
        peer_url: peer_url.to_string(),
        blocks_added: 0,
        error,
    };

    // Step 1: BlockCount.
    let remote_len = match transport.request(
        peer_url,
        &Request::BlockCount { requester_url: self_url.to_string(), remote_len: local_len },
        timeout,
    ) {
        Ok(line) => match line.parse::<u64>() {
            Ok(n) => n,
            Err(_) => return no_change(Some(SyncError::UnexpectedReply(line))),
        },
        Err(e) => return no_change(Some(SyncError::Transport(e))),
    };

    // Step 2: nothing to do if the peer is not ahead.
    if remote_len <= local_len {
        return no_change(None);
    }

    // Step 3: ValidateChain.
    match transport.request(peer_url, &Request::ValidateChain, timeout) {
        Ok(line) => match Reply::parse_ok_or_error(&line) {
            Reply::Ok => {}
            _ => return no_change(Some(SyncError::ChainNotValidated)),
        },
        Err(e) => return no_change(Some(SyncError::Transport(e))),
    }

    // Step 4: fetch and append each missing block in order.
    let mut added = 0u64;
    for index in local_len..remote_len {
        let line = match transport.request(peer_url, &Request::GetBlock { index }, timeout) {
            Ok(line) => line,
            Err(e) => return no_change_with_progress(peer_url, added, SyncError::Transport(e)),
        };
        if line.starts_with("error") {
            return no_change_with_progress(peer_url, added, SyncError::UnexpectedReply(line));
        }
        let block: Block = match smx_codec::decode(&line) {
            Ok(b) => b,
            Err(e) => return no_change_with_progress(peer_url, added, SyncError::Decode(e.to_string())),
        };
        if let Err(e) = chain.add_block(block, false) {
            return no_change_with_progress(peer_url, added, SyncError::Rejected(e.to_string()));
        }
        added += 1;
    }

    PeerSyncOutcome { peer_url: peer_url.to_string(), blocks_added: added, error: None }
}

fn no_change_with_progress(peer_url: &str, added: u64, error: SyncError) -> PeerSyncOutcome {
    PeerSyncOutcome { peer_url: peer_url.to_string(), blocks_added: added, error: Some(error) }
}

/// `GetChain` path (spec §4.7): fetches the peer's whole encoded chain and
/// adopts it only if it is strictly longer than the local chain and
/// decodes to a chain that validates end to end. Returns the adopted blocks
/// on success, for the caller to rebuild its `ChainEngine` from.
pub fn fetch_full_chain_if_longer(
    chain: &ChainEngine,
    peer_url: &str,
    self_url: &str,
    transport: &dyn PeerTransport,
    timeout: Duration,
) -> Result<Option<Vec<Block>>, SyncError> {
    let line = transport
        .request(peer_url, &Request::GetChain { requester_url: self_url.to_string() }, timeout)
        .map_err(SyncError::Transport)?;
    if line.starts_with("error") {
        return Err(SyncError::UnexpectedReply(line));
    }
    let blocks: Vec<Block> = smx_codec::decode(&line).map_err(|e| SyncError::Decode(e.to_string()))?;
    if (blocks.len() as u64) <= chain.len() {
        return Ok(None);
    }
    let candidate = ChainEngine::from_blocks(blocks.clone(), smx_core::DEFAULT_POOL_MAX);
    if !candidate.is_valid() {
        return Err(SyncError::Rejected("fetched chain failed isValid()".to_string()));
    }
    Ok(Some(blocks))
}

/// Registers with `peer_url` by sending a `Register` request (spec §4.7:
/// "Peer registration uses `Register:<url>|<HMAC(url, chainId)>`; the hub
/// replies `ok` and the requester then keeps the peer").
pub fn register_with_peer(
    self_url: &str,
    chain_id: &str,
    peer_url: &str,
    transport: &dyn PeerTransport,
    timeout: Duration,
) -> Result<(), SyncError> {
    let request = Request::register(self_url, chain_id);
    let line = transport.request(peer_url, &request, timeout).map_err(SyncError::Transport)?;
    match Reply::parse_ok_or_error(&line) {
        Reply::Ok => Ok(()),
        other => Err(SyncError::UnexpectedReply(other.to_wire())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use chrono::Utc;
    use smx_core::{Address, Block as CoreBlock, NullSigner, DEFAULT_POOL_MAX};

    fn new_chain() -> ChainEngine {
        let genesis = CoreBlock::genesis(Address::system(), Utc::now(), &NullSigner);
        ChainEngine::new(genesis, DEFAULT_POOL_MAX)
    }

    fn mine_n(chain: &ChainEngine, n: usize) {
        let miner = Address::parse(format!("smartX{}", "1".repeat(40))).unwrap();
        let validator = Address::parse(format!("smartX{}", "3".repeat(40))).unwrap();
        for _ in 0..n {
            let _ = chain.mine_pending(miner.clone(), &[validator.clone()], Utc::now(), &NullSigner);
        }
    }

    #[test]
    fn peer_with_shorter_chain_causes_no_change() {
        let chain = new_chain();
        mine_n(&chain, 3);
        let transport = MockTransport::new().on("peer", |_req| "1".to_string());
        let outcomes = sync_tick(&chain, &["peer".to_string()], "self", &transport, Duration::from_secs(1));
        assert_eq!(outcomes[0].blocks_added, 0);
        assert!(outcomes[0].error.is_none());
        assert_eq!(chain.len(), 4);
    }

    #[test]
    fn peer_with_longer_chain_is_caught_up() {
        let local = new_chain();
        let remote = new_chain();
        mine_n(&remote, 5);
        let remote_blocks = remote.blocks_snapshot();

        let blocks_for_closure = remote_blocks.clone();
        let transport = MockTransport::new().on("peer", move |req| match req {
            Request::BlockCount { .. } => blocks_for_closure.len().to_string(),
            Request::ValidateChain => "ok".to_string(),
            Request::GetBlock { index } => smx_codec::encode(&blocks_for_closure[*index as usize]),
            _ => "error:unsupported".to_string(),
        });

        let outcomes = sync_tick(&local, &["peer".to_string()], "self", &transport, Duration::from_secs(1));
        assert_eq!(outcomes[0].blocks_added, 5);
        assert!(outcomes[0].error.is_none());
        assert_eq!(local.len(), 6);
        assert_eq!(local.tip_hash(), remote.tip_hash());
    }

    #[test]
    fn failed_validate_chain_skips_the_peer() {
        let local = new_chain();
        let transport = MockTransport::new().on("peer", |req| match req {
            Request::BlockCount { .. } => "9".to_string(),
            Request::ValidateChain => "invalid".to_string(),
            _ => "error:unsupported".to_string(),
        });
        let outcomes = sync_tick(&local, &["peer".to_string()], "self", &transport, Duration::from_secs(1));
        assert_eq!(outcomes[0].blocks_added, 0);
        assert_eq!(outcomes[0].error, Some(SyncError::ChainNotValidated));
    }

    #[test]
    fn unreachable_peer_is_recorded_and_skipped() {
        let local = new_chain();
        let transport = MockTransport::new();
        let outcomes = sync_tick(&local, &["peer".to_string()], "self", &transport, Duration::from_secs(1));
        assert!(matches!(outcomes[0].error, Some(SyncError::Transport(_))));
    }
}
