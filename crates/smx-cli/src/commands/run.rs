//! `smartx-cli run`: boots a full node (spec §4.8) and blocks until a
//! shutdown signal arrives. Thin wrapper over [`smx_node::Supervisor`] so
//! the node can be launched either via `smartx-node` directly or via this
//! CLI's unified entry point.

use crate::commands::common::print_failure;
use smx_node::{ConfiguredKeyProvider, NodeConfig, Supervisor};
use std::sync::Arc;

pub fn run(config_path: &str) -> i32 {
    let config = match NodeConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            print_failure(&format!("invalid configuration at {config_path}: {e}"));
            return 1;
        }
    };

    let key_provider = ConfiguredKeyProvider {
        public_key: config.server_public_key.clone(),
        private_key: config.server_private_key.clone(),
    };

    let supervisor = match Supervisor::boot(config, &key_provider) {
        Ok(supervisor) => Arc::new(supervisor),
        Err(e) => {
            print_failure(&format!("boot failed: {e}"));
            return 1;
        }
    };

    match supervisor.run() {
        Ok(()) => 0,
        Err(e) => {
            print_failure(&format!("peer server failed: {e}"));
            1
        }
    }
}
