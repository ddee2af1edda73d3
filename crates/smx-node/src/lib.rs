// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SMARTX CHAIN - NODE MODULE
//
// Node Supervisor: configuration, persistence, the external key-derivation
// and secret-store collaborator traits, the peer request server, and the
// read-only explorer query surface (spec §4.8, §6).
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod config;
pub mod db;
pub mod explorer;
pub mod external;
pub mod server;
pub mod supervisor;

pub use config::{ConfigError, NodeConfig};
pub use db::{Archive, ArchiveStore, DbError};
pub use external::{ConfiguredKeyProvider, EnvSecretStore, KeyProvider, Keypair, SecretStore};
pub use supervisor::{BootError, Supervisor};
