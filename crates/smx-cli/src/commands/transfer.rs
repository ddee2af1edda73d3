//! `smartx-cli transfer`: submits a `NativeTransfer` against a node's
//! persisted archive and immediately mines it, since the peer wire
//! protocol (spec §6) has no transaction-submit request form and this CLI
//! talks to the archive directly rather than to a live node.

use crate::commands::common::{load_config, open_archive, persist, print_failure, print_success};
use chrono::Utc;
use rust_decimal::Decimal;
use smx_core::{Address, NullSigner, Transaction, TransactionType};

pub struct TransferArgs {
    pub config_path: String,
    pub sender: String,
    pub sender_key: String,
    pub recipient: String,
    pub amount: Decimal,
    pub memo: String,
}

pub fn run(args: TransferArgs) -> i32 {
    let config = match load_config(&args.config_path) {
        Ok(c) => c,
        Err(e) => {
            print_failure(&e);
            return 1;
        }
    };
    let sender = match Address::parse(args.sender) {
        Ok(a) => a,
        Err(_) => {
            print_failure("invalid sender address");
            return 1;
        }
    };
    let recipient = match Address::parse(args.recipient) {
        Ok(a) => a,
        Err(_) => {
            print_failure("invalid recipient address");
            return 1;
        }
    };

    let opened = match open_archive(&config) {
        Ok(o) => o,
        Err(e) => {
            print_failure(&e);
            return 1;
        }
    };

    // Re-register the sender's key for this one-shot process: the
    // Authenticated User Table is deliberately excluded from the persisted
    // archive (spec.md's Lifecycle section names only chain/pool/store/peers).
    let _ = opened.chain.register_user(sender.clone(), &args.sender_key);

    let now = Utc::now();
    let tx = Transaction::new(
        TransactionType::NativeTransfer,
        sender.clone(),
        recipient,
        args.amount,
        now,
        vec![],
        args.memo,
        Decimal::ZERO,
    );
    if let Err(e) = opened.chain.append_transaction(tx, &args.sender_key) {
        print_failure(&format!("{e}"));
        return 1;
    }

    let miner = sender;
    let block = opened.chain.mine_pending(miner, &[], now, &NullSigner);
    print_success(&format!("mined block #{} with {} transaction(s)", block.index, block.transactions.len()));

    if let Err(e) = persist(&opened) {
        print_failure(&format!("failed to persist archive: {e}"));
        return 1;
    }
    0
}
