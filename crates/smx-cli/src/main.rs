// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SMARTX CLI - Node Operator & Wallet Command Line Interface
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::str::FromStr;

mod commands;

use commands::{deploy, execute, query, run, transfer};

#[derive(Parser)]
#[command(name = "smartx-cli")]
#[command(about = "SmartX chain node operator & offline wallet CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the node's config file (spec §6's `[Config]`/`[Peers]`/
    /// `[Miner]`/`[Server]` INI layout)
    #[arg(short, long, default_value = "smartx.conf")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot a full node and serve peer requests until shutdown
    Run,

    /// Submit and mine a native transfer
    Transfer {
        /// Sender address
        #[arg(long)]
        from: String,
        /// Sender's raw authentication key
        #[arg(long)]
        key: String,
        /// Recipient address
        #[arg(long)]
        to: String,
        /// Amount to transfer
        #[arg(long)]
        amount: String,
        /// Optional memo
        #[arg(long, default_value = "")]
        memo: String,
    },

    /// Compile, safety-check, and deploy a contract
    Deploy {
        /// Owner address
        #[arg(long)]
        owner: String,
        /// Owner's raw authentication key
        #[arg(long)]
        key: String,
        /// Unique contract name
        #[arg(long)]
        name: String,
        /// Path to the contract's DSL source file
        #[arg(long)]
        source: String,
        /// Overrides the computed static gas estimate (spec §4.5's "static
        /// cost function over the source" is used when this is omitted)
        #[arg(long)]
        gas: Option<String>,
    },

    /// Execute a deployed contract's entry point
    Execute {
        /// Caller address
        #[arg(long)]
        caller: String,
        /// Caller's raw authentication key
        #[arg(long)]
        key: String,
        /// Contract name
        #[arg(long)]
        name: String,
        /// Positional inputs passed to the contract's execute()
        inputs: Vec<String>,
    },

    /// Read-only lookups against the persisted archive
    Query {
        #[command(subcommand)]
        action: QueryCommands,
    },
}

#[derive(Subcommand)]
enum QueryCommands {
    /// Current block count
    BlockCount,
    /// A single block by index
    Block { index: u64 },
    /// An address's replayed balance
    Balance { address: String },
    /// A deployed contract's public record
    Contract { name: String },
    /// All transactions touching an address
    Transactions { address: String },
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Run => run::run(&cli.config),

        Commands::Transfer { from, key, to, amount, memo } => {
            let amount = match Decimal::from_str(&amount) {
                Ok(a) => a,
                Err(_) => {
                    eprintln!("invalid amount '{amount}'");
                    std::process::exit(1);
                }
            };
            transfer::run(transfer::TransferArgs {
                config_path: cli.config,
                sender: from,
                sender_key: key,
                recipient: to,
                amount,
                memo,
            })
        }

        Commands::Deploy { owner, key, name, source, gas } => {
            let gas_override = match gas.as_deref().map(Decimal::from_str) {
                Some(Ok(g)) => Some(g),
                Some(Err(_)) => {
                    eprintln!("invalid gas amount '{}'", gas.unwrap());
                    std::process::exit(1);
                }
                None => None,
            };
            deploy::run(deploy::DeployArgs {
                config_path: cli.config,
                owner,
                owner_key: key,
                name,
                source_path: source,
                gas_override,
            })
        }

        Commands::Execute { caller, key, name, inputs } => execute::run(execute::ExecuteArgs {
            config_path: cli.config,
            caller,
            caller_key: key,
            name,
            inputs,
        }),

        Commands::Query { action } => {
            let args = match action {
                QueryCommands::BlockCount => query::QueryArgs::BlockCount,
                QueryCommands::Block { index } => query::QueryArgs::Block { index },
                QueryCommands::Balance { address } => query::QueryArgs::Balance { address },
                QueryCommands::Contract { name } => query::QueryArgs::Contract { name },
                QueryCommands::Transactions { address } => {
                    query::QueryArgs::Transactions { address }
                }
            };
            query::run(&cli.config, args)
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    // ── CLI Argument Parsing ────────────────────────────────────

    #[test]
    fn test_cli_run() {
        let cli = Cli::try_parse_from(["smartx-cli", "run"]);
        assert!(cli.is_ok(), "Failed to parse: {:?}", cli.err().map(|e| e.to_string()));
        assert!(matches!(cli.unwrap().command, Commands::Run));
    }

    #[test]
    fn test_cli_transfer() {
        let cli = Cli::try_parse_from([
            "smartx-cli",
            "transfer",
            "--from",
            "smartXaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "--key",
            "secret",
            "--to",
            "smartXbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
            "--amount",
            "10.5",
        ]);
        assert!(cli.is_ok());
        match cli.unwrap().command {
            Commands::Transfer { from, to, amount, memo, .. } => {
                assert_eq!(from, "smartXaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
                assert_eq!(to, "smartXbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
                assert_eq!(amount, "10.5");
                assert_eq!(memo, "");
            }
            _ => panic!("expected Commands::Transfer"),
        }
    }

    #[test]
    fn test_cli_deploy_leaves_gas_unset_by_default() {
        let cli = Cli::try_parse_from([
            "smartx-cli",
            "deploy",
            "--owner",
            "smartXaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "--key",
            "secret",
            "--name",
            "Token",
            "--source",
            "token.dsl",
        ]);
        assert!(cli.is_ok());
        match cli.unwrap().command {
            Commands::Deploy { name, gas, .. } => {
                assert_eq!(name, "Token");
                assert_eq!(gas, None);
            }
            _ => panic!("expected Commands::Deploy"),
        }
    }

    #[test]
    fn test_cli_deploy_accepts_a_gas_override() {
        let cli = Cli::try_parse_from([
            "smartx-cli",
            "deploy",
            "--owner",
            "smartXaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "--key",
            "secret",
            "--name",
            "Token",
            "--source",
            "token.dsl",
            "--gas",
            "42",
        ]);
        assert!(cli.is_ok());
        match cli.unwrap().command {
            Commands::Deploy { gas, .. } => assert_eq!(gas, Some("42".to_string())),
            _ => panic!("expected Commands::Deploy"),
        }
    }

    #[test]
    fn test_cli_execute_collects_positional_inputs() {
        let cli = Cli::try_parse_from([
            "smartx-cli",
            "execute",
            "--caller",
            "smartXaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "--key",
            "secret",
            "--name",
            "Token",
            "init",
            "500",
        ]);
        assert!(cli.is_ok());
        match cli.unwrap().command {
            Commands::Execute { inputs, .. } => {
                assert_eq!(inputs, vec!["init".to_string(), "500".to_string()]);
            }
            _ => panic!("expected Commands::Execute"),
        }
    }

    #[test]
    fn test_cli_query_block_requires_an_index() {
        let cli = Cli::try_parse_from(["smartx-cli", "query", "block", "3"]);
        assert!(cli.is_ok());
        match cli.unwrap().command {
            Commands::Query { action: QueryCommands::Block { index } } => assert_eq!(index, 3),
            _ => panic!("expected Commands::Query(Block)"),
        }

        assert!(Cli::try_parse_from(["smartx-cli", "query", "block"]).is_err());
    }

    #[test]
    fn test_cli_config_defaults_to_smartx_conf() {
        let cli = Cli::try_parse_from(["smartx-cli", "query", "block-count"]).unwrap();
        assert_eq!(cli.config, "smartx.conf");
    }

    #[test]
    fn test_cli_rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["smartx-cli", "nope"]).is_err());
    }
}
