//! Peer request-reply TCP server (spec §4.8, §6). Lives in `smx-node`
//! rather than `smx-network` because handling a request needs the node's
//! wired-together state (chain, peer registry, contract store) that only
//! the Node Supervisor owns.

use crate::explorer;
use chrono::{DateTime, Utc};
use smx_contracts::ContractStore;
use smx_core::{Address, ChainEngine};
use smx_network::{verify_registration, PeerRegistry, Request};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How often the accept loop checks the shutdown flag while the listener
/// has no pending connection (spec §5: "every periodic loop observes a
/// cancellation token checked between iterations").
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct ServerContext {
    pub chain: Arc<ChainEngine>,
    pub peers: Arc<PeerRegistry>,
    pub contracts: Arc<ContractStore>,
    pub chain_id: String,
}

/// Computes the raw reply line for one parsed request (spec §6's table).
/// Unparseable input produces `error:malformed request` rather than
/// panicking, since the wire is untrusted input from a peer.
pub fn handle_line(ctx: &ServerContext, line: &str, now: DateTime<Utc>) -> String {
    let Some(request) = Request::parse(line) else {
        return "error:malformed request".to_string();
    };
    handle_request(ctx, &request, now)
}

fn handle_request(ctx: &ServerContext, request: &Request, now: DateTime<Utc>) -> String {
    match request {
        Request::Register { url, hmac_b64 } => {
            if !verify_registration(url, hmac_b64, &ctx.chain_id) {
                return "error:bad registration hmac".to_string();
            }
            match ctx.peers.add_peer(url, &ctx.chain_id, now) {
                Ok(()) => "ok".to_string(),
                Err(e) => format!("error:{e}"),
            }
        }
        Request::Heartbeat { url } => {
            ctx.peers.touch(url, now);
            "ok".to_string()
        }
        Request::Nodes => ctx.peers.list().into_iter().map(|p| p.url).collect::<Vec<_>>().join(","),
        Request::BlockCount { requester_url, remote_len: _ } => {
            // Observing another node's request is itself a liveness signal
            // (spec §4.7 step 1 implies peers learn about each other by
            // talking, not only by explicit `Register`).
            ctx.peers.touch(requester_url, now);
            explorer::block_count(&ctx.chain).to_string()
        }
        Request::ValidateChain => {
            if ctx.chain.is_valid() {
                "ok".to_string()
            } else {
                "invalid".to_string()
            }
        }
        Request::GetBlock { index } => match explorer::get_block(&ctx.chain, *index) {
            Some(block) => smx_codec::encode(&block),
            None => "error:unknown block index".to_string(),
        },
        Request::GetChain { requester_url } => {
            ctx.peers.touch(requester_url, now);
            smx_codec::encode(&ctx.chain.blocks_snapshot())
        }
        Request::ExplorerBlockCount => explorer::block_count(&ctx.chain).to_string(),
        Request::ExplorerGetContractCode { name } => {
            match explorer::get_contract_code(&ctx.contracts, name) {
                Some(view) => serde_json::to_string(&view).unwrap_or_else(|_| "error:encoding".to_string()),
                None => "error:unknown contract".to_string(),
            }
        }
        Request::ExplorerGetUserTransactions { address } => match Address::parse(address.clone()) {
            Ok(addr) => {
                let txs = explorer::get_user_transactions(&ctx.chain, &addr);
                serde_json::to_string(&txs).unwrap_or_else(|_| "error:encoding".to_string())
            }
            Err(_) => "error:invalid address".to_string(),
        },
    }
}

/// Runs the accept loop until `shutdown` is set, handling each connection
/// on its own thread (spec §5: "parallel worker threads coordinated by
/// message passing and explicit locks").
pub fn serve(
    ctx: Arc<ServerContext>,
    bind_addr: &str,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr)?;
    listener.set_nonblocking(true)?;
    println!("🌐 peer server listening on {bind_addr}");
    loop {
        if shutdown.load(Ordering::Relaxed) {
            println!("🛑 peer server shutting down");
            return Ok(());
        }
        match listener.accept() {
            Ok((stream, _addr)) => {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || handle_connection(&ctx, stream));
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => return Err(e),
        }
    }
}

fn handle_connection(ctx: &ServerContext, stream: TcpStream) {
    let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_else(|_| "unknown".to_string());
    let mut reader = BufReader::new(match stream.try_clone() {
        Ok(s) => s,
        Err(_) => return,
    });
    let mut writer = stream;
    let mut line = String::new();
    if reader.read_line(&mut line).unwrap_or(0) == 0 {
        return;
    }
    let reply = handle_line(ctx, &line, Utc::now());
    if let Err(e) = writeln!(writer, "{reply}") {
        eprintln!("⚠️  failed to reply to {peer}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use smx_core::{Block, NullSigner, DEFAULT_POOL_MAX};
    use smx_network::Request as NetworkRequest;

    fn ctx() -> ServerContext {
        let genesis = Block::genesis(Address::system(), Utc::now(), &NullSigner);
        ServerContext {
            chain: Arc::new(ChainEngine::new(genesis, DEFAULT_POOL_MAX)),
            peers: Arc::new(PeerRegistry::new(10)),
            contracts: Arc::new(ContractStore::new()),
            chain_id: "test-chain".to_string(),
        }
    }

    #[test]
    fn validate_chain_replies_ok_for_a_fresh_chain() {
        assert_eq!(handle_request(&ctx(), &Request::ValidateChain, Utc::now()), "ok");
    }

    #[test]
    fn block_count_reflects_chain_length_and_touches_requester() {
        let context = ctx();
        let reply = handle_request(
            &context,
            &Request::BlockCount { requester_url: "http://127.0.0.1:9000".to_string(), remote_len: 0 },
            Utc::now(),
        );
        assert_eq!(reply, "1");
    }

    #[test]
    fn get_block_out_of_range_is_an_error() {
        let reply = handle_request(&ctx(), &Request::GetBlock { index: 99 }, Utc::now());
        assert!(reply.starts_with("error:"));
    }

    #[test]
    fn register_with_bad_hmac_is_rejected() {
        let context = ctx();
        let reply = handle_request(
            &context,
            &Request::Register { url: "http://127.0.0.1:9000".to_string(), hmac_b64: "bogus".to_string() },
            Utc::now(),
        );
        assert!(reply.starts_with("error:"));
    }

    #[test]
    fn register_with_correct_hmac_is_accepted() {
        let context = ctx();
        let request = NetworkRequest::register("http://127.0.0.1:9000", "test-chain");
        assert_eq!(handle_request(&context, &request, Utc::now()), "ok");
        assert_eq!(context.peers.len(), 1);
    }

    #[test]
    fn malformed_line_is_rejected() {
        assert_eq!(handle_line(&ctx(), "Nonsense", Utc::now()), "error:malformed request");
    }
}
