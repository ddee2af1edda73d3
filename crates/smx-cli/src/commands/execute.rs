//! `smartx-cli execute`: runs a deployed contract's `execute` entry point
//! inside the Sandbox Runtime against one or more input strings (spec
//! §4.5), then commits the resulting state transition as a `ContractState`
//! transaction if the call produced a new state.

use crate::commands::common::{load_config, open_archive, persist, print_failure, print_success};
use chrono::Utc;
use rust_decimal::Decimal;
use smx_contracts::Sandbox;
use smx_core::{Address, NullSigner, Transaction, TransactionType};

pub struct ExecuteArgs {
    pub config_path: String,
    pub caller: String,
    pub caller_key: String,
    pub name: String,
    pub inputs: Vec<String>,
}

pub fn run(args: ExecuteArgs) -> i32 {
    let config = match load_config(&args.config_path) {
        Ok(c) => c,
        Err(e) => {
            print_failure(&e);
            return 1;
        }
    };
    let caller = match Address::parse(args.caller) {
        Ok(a) => a,
        Err(_) => {
            print_failure("invalid caller address");
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
    let record = match opened.contracts.get(&args.name) {
        Some(r) => r,
        None => {
            print_failure(&format!("unknown contract '{}'", args.name));
            return 1;
        }
    };
    let source: String = match smx_codec::decode(&record.serialized_code) {
        Ok(s) => s,
        Err(e) => {
            print_failure(&format!("corrupt contract code: {e}"));
            return 1;
        }
    };

    let mut sandbox = Sandbox::default();
    if let Err(e) = sandbox.compile(&source) {
        print_failure(&format!("{e}"));
        return 1;
    }
    if let Err(e) = sandbox.load_state(record.serialized_state.clone()) {
        print_failure(&format!("{e}"));
        return 1;
    }

    let (result, new_state) = sandbox.execute(args.inputs.clone(), &record.serialized_state);
    println!("result: {result}");

    if new_state == record.serialized_state {
        print_success("execution left state unchanged; nothing to commit");
        return 0;
    }
    if let Err(e) = opened.contracts.update_state(&args.name, &record.serialized_state, new_state) {
        print_failure(&format!("{e}"));
        return 1;
    }

    let _ = opened.chain.register_user(caller.clone(), &args.caller_key);
    let now = Utc::now();
    let tx = Transaction::new(
        TransactionType::ContractState,
        caller.clone(),
        caller.clone(),
        Decimal::ZERO,
        now,
        args.inputs.join("\u{1f}").into_bytes(),
        format!("execute {}", args.name),
        Decimal::ZERO,
    );
    if let Err(e) = opened.chain.append_transaction(tx, &args.caller_key) {
        print_failure(&format!("{e}"));
        return 1;
    }
    let block = opened.chain.mine_pending(caller, &[], now, &NullSigner);
    print_success(&format!("committed new state in block #{}", block.index));

    if let Err(e) = persist(&opened) {
        print_failure(&format!("failed to persist archive: {e}"));
        return 1;
    }
    0
}
