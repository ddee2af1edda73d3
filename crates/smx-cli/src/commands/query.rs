//! `smartx-cli query`: read-only lookups against a node's persisted
//! archive, mirroring the explorer query surface (spec §4.8 supplement;
//! `smx_node::explorer`) without requiring a running node to answer them.

use crate::commands::common::{load_config, open_archive, print_failure};
use smx_core::Address;
use smx_node::explorer;

pub enum QueryArgs {
    BlockCount,
    Block { index: u64 },
    Balance { address: String },
    Contract { name: String },
    Transactions { address: String },
}

pub fn run(config_path: &str, args: QueryArgs) -> i32 {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            print_failure(&e);
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

    match args {
        QueryArgs::BlockCount => {
            println!("{}", explorer::block_count(&opened.chain));
        }
        QueryArgs::Block { index } => match explorer::get_block(&opened.chain, index) {
            Some(block) => match serde_json::to_string_pretty(&block) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    print_failure(&format!("{e}"));
                    return 1;
                }
            },
            None => {
                print_failure("unknown block index");
                return 1;
            }
        },
        QueryArgs::Balance { address } => {
            let address = match Address::parse(address) {
                Ok(a) => a,
                Err(_) => {
                    print_failure("invalid address");
                    return 1;
                }
            };
            println!("{}", opened.chain.balance(&address));
        }
        QueryArgs::Contract { name } => match explorer::get_contract_code(&opened.contracts, &name) {
            Some(view) => match serde_json::to_string_pretty(&view) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    print_failure(&format!("{e}"));
                    return 1;
                }
            },
            None => {
                print_failure(&format!("unknown contract '{name}'"));
                return 1;
            }
        },
        QueryArgs::Transactions { address } => {
            let address = match Address::parse(address) {
                Ok(a) => a,
                Err(_) => {
                    print_failure("invalid address");
                    return 1;
                }
            };
            let txs = explorer::get_user_transactions(&opened.chain, &address);
            match serde_json::to_string_pretty(&txs) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    print_failure(&format!("{e}"));
                    return 1;
                }
            }
        }
    }
    0
}
