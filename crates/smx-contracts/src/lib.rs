// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SMARTX CHAIN - CONTRACTS MODULE
//
// Contract Store, Safety Analyzer, and Sandbox Runtime: the deployment and
// execution path for user-submitted contract code (spec §2, §4.1, §4.4,
// §4.5).
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod dsl;
pub mod memory;
pub mod safety;
pub mod sandbox;
pub mod store;

pub use safety::{check_input, check_source, UnsafeCode};
pub use sandbox::{Sandbox, SandboxError, SandboxState, DEFAULT_TIMEOUT};
pub use store::{ContractRecord, ContractStore, StoreError};
