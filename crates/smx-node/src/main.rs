// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SMARTX CHAIN - NODE BINARY
//
// Entry point: loads configuration, boots the Node Supervisor, and runs
// until a shutdown signal arrives (spec §4.8, §6 "CLI: exit code 0 on
// clean shutdown; non-zero on fatal configuration error").
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use smx_node::{ConfiguredKeyProvider, NodeConfig, Supervisor};
use std::sync::Arc;

#[cfg(unix)]
static SIGNAL_RECEIVED: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_signal(_: i32) {
    SIGNAL_RECEIVED.store(true, std::sync::atomic::Ordering::SeqCst);
}

/// Forwards SIGINT/SIGTERM to the supervisor's shutdown flag. Installed on
/// unix only: the reimplementation has no other platform target in scope.
#[cfg(unix)]
fn install_signal_handlers(supervisor: &Arc<Supervisor>) {
    unsafe {
        libc::signal(libc::SIGINT, on_signal as usize);
        libc::signal(libc::SIGTERM, on_signal as usize);
    }
    let shutdown = supervisor.shutdown_handle();
    std::thread::spawn(move || loop {
        if SIGNAL_RECEIVED.load(std::sync::atomic::Ordering::SeqCst) {
            shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
            return;
        }
        std::thread::sleep(std::time::Duration::from_millis(200));
    });
}

#[cfg(not(unix))]
fn install_signal_handlers(_supervisor: &Arc<Supervisor>) {}

fn main() {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "smartx.conf".to_string());

    let config = match NodeConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fatal: invalid configuration at {config_path}: {e}");
            std::process::exit(1);
        }
    };

    let key_provider = ConfiguredKeyProvider {
        public_key: config.server_public_key.clone(),
        private_key: config.server_private_key.clone(),
    };

    let supervisor = match Supervisor::boot(config, &key_provider) {
        Ok(supervisor) => Arc::new(supervisor),
        Err(e) => {
            eprintln!("fatal: boot failed: {e}");
            std::process::exit(1);
        }
    };

    install_signal_handlers(&supervisor);

    match supervisor.run() {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("fatal: peer server failed: {e}");
            std::process::exit(1);
        }
    }
}
