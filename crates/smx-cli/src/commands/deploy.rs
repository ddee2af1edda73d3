//! `smartx-cli deploy`: runs the Safety Analyzer and compiles the given
//! source (spec §4.4, §4.5), then deploys it as a new [`ContractRecord`] if
//! it passes, storing the static gas estimate (spec §3, §4.5: "gas: decimal
//! (static estimate)... a static cost function over the source") on the
//! record and charging it as a `ContractCode` transaction.

use crate::commands::common::{load_config, open_archive, persist, print_failure, print_success};
use chrono::Utc;
use rust_decimal::Decimal;
use smx_contracts::dsl::{ContractState, GasEstimator, NodeCountEstimator};
use smx_contracts::{ContractRecord, Sandbox};
use smx_core::{Address, NullSigner, Transaction, TransactionType};

pub struct DeployArgs {
    pub config_path: String,
    pub owner: String,
    pub owner_key: String,
    pub name: String,
    pub source_path: String,
    /// Overrides the computed static gas estimate when set (spec §9.1's
    /// `GasEstimator` is pluggable; an operator-supplied figure still wins
    /// over the default `NodeCountEstimator`).
    pub gas_override: Option<Decimal>,
}

pub fn run(args: DeployArgs) -> i32 {
    let config = match load_config(&args.config_path) {
        Ok(c) => c,
        Err(e) => {
            print_failure(&e);
            return 1;
        }
    };
    let owner = match Address::parse(args.owner) {
        Ok(a) => a,
        Err(_) => {
            print_failure("invalid owner address");
            return 1;
        }
    };
    let source = match std::fs::read_to_string(&args.source_path) {
        Ok(s) => s,
        Err(e) => {
            print_failure(&format!("{}: {e}", args.source_path));
            return 1;
        }
    };

    let mut sandbox = Sandbox::default();
    if let Err(e) = sandbox.compile(&source) {
        print_failure(&format!("{e}"));
        return 1;
    }
    let gas = args.gas_override.unwrap_or_else(|| {
        let program = sandbox.program().expect("just compiled above");
        NodeCountEstimator::default().estimate(program)
    });

    let opened = match open_archive(&config) {
        Ok(o) => o,
        Err(e) => {
            print_failure(&e);
            return 1;
        }
    };

    let serialized_code = smx_codec::encode(&source);
    let serialized_state = smx_codec::encode(&ContractState::default());
    let record = ContractRecord {
        name: args.name.clone(),
        owner: owner.clone(),
        serialized_code,
        gas,
        serialized_state,
    };
    if let Err(e) = opened.contracts.deploy(record) {
        print_failure(&format!("{e}"));
        return 1;
    }

    let _ = opened.chain.register_user(owner.clone(), &args.owner_key);

    let now = Utc::now();
    let tx = Transaction::new(
        TransactionType::ContractCode,
        owner.clone(),
        owner.clone(),
        Decimal::ZERO,
        now,
        args.name.clone().into_bytes(),
        format!("deploy {}", args.name),
        gas,
    );
    if let Err(e) = opened.chain.append_transaction(tx, &args.owner_key) {
        print_failure(&format!("{e}"));
        return 1;
    }
    let block = opened.chain.mine_pending(owner, &[], now, &NullSigner);
    print_success(&format!("deployed '{}' in block #{}", args.name, block.index));

    if let Err(e) = persist(&opened) {
        print_failure(&format!("failed to persist archive: {e}"));
        return 1;
    }
    0
}
