//! Cross-crate end-to-end scenarios: a token contract's full lifecycle
//! through the sandbox, an unauthenticated transfer rejection, a sandbox
//! timeout, and a two-node chain sync over a real TCP socket.

use chrono::Utc;
use rust_decimal::Decimal;
use smx_contracts::dsl::ContractState;
use smx_contracts::Sandbox;
use smx_core::{
    Address, AppendError, Block, ChainEngine, NullSigner, Transaction, TransactionType, TxError,
    DEFAULT_POOL_MAX,
};
use smx_network::{sync_tick, TcpTransport, DEFAULT_REQUEST_TIMEOUT};
use smx_node::server::{serve, ServerContext};
use smx_contracts::ContractStore;
use smx_network::PeerRegistry;
use std::net::{TcpListener, TcpStream};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn addr(suffix: char) -> Address {
    Address::parse(format!("smartX{}", suffix.to_string().repeat(40))).unwrap()
}

const TOKEN_CONTRACT: &str = r#"
fn execute(inputs, state) {
    let action = inputs[0];
    if (action == "init") {
        let owner = inputs[1];
        let supply = decimal(inputs[2]);
        state.credit(owner, supply);
        state.set("total_supply", supply);
        return tuple(state.balance_of(owner), 0, state.get("total_supply"));
    } else if (action == "mint-burn") {
        let owner = inputs[1];
        let recipient = inputs[2];
        let burn_amount = decimal(inputs[3]);
        let mint_amount = decimal(inputs[4]);
        let burned = state.debit(owner, burn_amount);
        if (burned) {
            state.set("total_supply", state.get("total_supply") - burn_amount);
        }
        state.credit(recipient, mint_amount);
        state.set("total_supply", state.get("total_supply") + mint_amount);
        return tuple(state.balance_of(owner), state.balance_of(recipient), state.get("total_supply"));
    } else if (action == "snapshot") {
        let owner = inputs[1];
        let recipient = inputs[2];
        return tuple(state.balance_of(owner), state.balance_of(recipient), state.get("total_supply"));
    }
    return tuple(0, 0, 0);
}
"#;

/// Deploys a token contract, mints the initial supply, burns from the owner
/// while minting to a recipient in the same call, and confirms a read-only
/// snapshot afterward reproduces the identical result and serialized state.
#[test]
fn token_contract_mint_and_burn_tracks_balances_and_supply() {
    let mut sandbox = Sandbox::default();
    sandbox.compile(TOKEN_CONTRACT).unwrap();
    let empty_state = smx_codec::encode(&ContractState::default());
    sandbox.load_state(empty_state.clone()).unwrap();

    let owner = "smartXaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string();
    let recipient = "smartXbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".to_string();

    let (init_result, state1) = sandbox.execute(
        vec!["init".to_string(), owner.clone(), "500".to_string()],
        &empty_state,
    );
    assert_eq!(init_result, "[500, 0, 500]");

    let (mint_burn_result, state2) = sandbox.execute(
        vec![
            "mint-burn".to_string(),
            owner.clone(),
            recipient.clone(),
            "50".to_string(),
            "200".to_string(),
        ],
        &state1,
    );
    assert_eq!(mint_burn_result, "[450, 200, 650]");

    let (snapshot_result, state3) = sandbox.execute(
        vec!["snapshot".to_string(), owner.clone(), recipient.clone()],
        &state2,
    );
    assert_eq!(snapshot_result, mint_burn_result);
    assert_eq!(state3, state2); // a read-only action leaves the serialized state byte-identical
}

/// An unregistered transfer attempt is rejected before touching the pool or
/// any balance, regardless of the amount or funds available.
#[test]
fn unauthenticated_transfer_is_rejected_and_leaves_no_trace() {
    let genesis = Block::genesis(Address::system(), Utc::now(), &NullSigner);
    let chain = ChainEngine::new(genesis, DEFAULT_POOL_MAX);

    let sender = addr('1');
    chain.register_user(sender.clone(), "correct-key").unwrap();
    let _ = chain.mine_pending(sender.clone(), &[], Utc::now(), &NullSigner);
    let funded_balance = chain.balance(&sender);
    assert!(funded_balance > Decimal::ZERO);

    let tx = Transaction::new(
        TransactionType::NativeTransfer,
        sender.clone(),
        addr('2'),
        Decimal::from_str("1").unwrap(),
        Utc::now(),
        vec![],
        "",
        Decimal::ZERO,
    );
    let err = chain.append_transaction(tx, "wrong-key").unwrap_err();
    assert_eq!(err, AppendError::Tx(TxError::NotAuthenticated));
    assert!(chain.pending_snapshot().is_empty());
    assert_eq!(chain.balance(&sender), funded_balance);
}

/// A contract that never returns trips the sandbox's wall-clock timeout and
/// leaves the caller's state exactly as it was handed in.
#[test]
fn runaway_contract_times_out_without_mutating_state() {
    let mut sandbox = Sandbox::new(Duration::from_millis(100), None);
    sandbox.compile("fn execute(inputs, state) { while (true) {} }").unwrap();
    let state = smx_codec::encode(&ContractState::default());
    let (result, new_state) = sandbox.execute(vec![], &state);
    assert_eq!(result, "Execution timeout");
    assert_eq!(new_state, state);
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

fn wait_until_listening(port: u16) {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    loop {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        if std::time::Instant::now() >= deadline {
            panic!("peer server never started listening on port {port}");
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// A node with an empty chain catches up to a peer's longer chain over a
/// real TCP connection, ending with matching tip hashes and balances.
#[test]
fn sync_tick_catches_up_a_lagging_node_over_tcp() {
    let genesis_time = Utc::now();
    let validator = addr('3');

    let remote_chain = ChainEngine::new(
        Block::genesis(Address::system(), genesis_time, &NullSigner),
        DEFAULT_POOL_MAX,
    );
    let miner = addr('1');
    for _ in 0..6 {
        let _ = remote_chain.mine_pending(miner.clone(), &[validator.clone()], Utc::now(), &NullSigner);
    }
    let remote_ctx = Arc::new(ServerContext {
        chain: Arc::new(remote_chain),
        peers: Arc::new(PeerRegistry::new(10)),
        contracts: Arc::new(ContractStore::new()),
        chain_id: "scenario-chain".to_string(),
    });

    let remote_port = free_port();
    let remote_shutdown = Arc::new(AtomicBool::new(false));
    let server_handle = {
        let ctx = Arc::clone(&remote_ctx);
        let shutdown = Arc::clone(&remote_shutdown);
        std::thread::spawn(move || serve(ctx, &format!("127.0.0.1:{remote_port}"), shutdown))
    };
    wait_until_listening(remote_port);

    let local_chain = ChainEngine::new(
        Block::genesis(Address::system(), genesis_time, &NullSigner),
        DEFAULT_POOL_MAX,
    );
    assert_eq!(local_chain.len(), 1);

    let transport = TcpTransport;
    let peer_url = format!("http://127.0.0.1:{remote_port}");
    let outcomes = sync_tick(
        &local_chain,
        &[peer_url],
        "http://127.0.0.1:0",
        &transport,
        DEFAULT_REQUEST_TIMEOUT,
    );
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].error.is_none(), "sync failed: {:?}", outcomes[0].error);
    assert_eq!(outcomes[0].blocks_added, 6);

    assert_eq!(local_chain.len(), remote_ctx.chain.len());
    assert_eq!(local_chain.tip_hash(), remote_ctx.chain.tip_hash());
    assert_eq!(local_chain.balance(&miner), remote_ctx.chain.balance(&miner));
    assert_eq!(local_chain.balance(&validator), remote_ctx.chain.balance(&validator));
    assert!(local_chain.is_valid());

    remote_shutdown.store(true, Ordering::Relaxed);
    let _ = server_handle.join();
}
