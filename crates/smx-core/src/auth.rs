//! Registered-user table used to authenticate pending-pool submitters
//! (spec §3 "Authenticated User Table", §4.3 `appendTransaction`).
//!
//! This is the chain-level analogue of the per-contract table described in
//! spec §3; `smx-contracts`'s DSL carries its own copy scoped to contract
//! state (spec §8 scenario S6).

use crate::address::Address;
use smx_crypto::hash_key;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    AlreadyRegistered,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AlreadyRegistered")
    }
}

impl std::error::Error for AuthError {}

#[derive(Debug, Clone, Default)]
pub struct UserRegistry {
    hashed_keys: HashMap<Address, String>,
}

impl UserRegistry {
    pub fn new() -> Self {
        UserRegistry::default()
    }

    /// Registers `address` with the hash of `raw_key`. The stored hash
    /// never changes across repeat registrations (spec §8 scenario S6):
    /// the first call succeeds, later calls fail with `AlreadyRegistered`.
    pub fn register(&mut self, address: Address, raw_key: &str) -> Result<(), AuthError> {
        if self.hashed_keys.contains_key(&address) {
            return Err(AuthError::AlreadyRegistered);
        }
        self.hashed_keys.insert(address, hash_key(raw_key));
        Ok(())
    }

    /// True iff `address` is registered and `raw_key` hashes to the stored
    /// value.
    pub fn authenticate(&self, address: &Address, raw_key: &str) -> bool {
        match self.hashed_keys.get(address) {
            Some(stored) => *stored == hash_key(raw_key),
            None => false,
        }
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.hashed_keys.contains_key(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> Address {
        Address::parse(format!("smartX{}", "a".repeat(40))).unwrap()
    }

    #[test]
    fn registers_and_authenticates() {
        let mut reg = UserRegistry::new();
        reg.register(addr(), "K").unwrap();
        assert!(reg.authenticate(&addr(), "K"));
        assert!(!reg.authenticate(&addr(), "WRONG"));
    }

    #[test]
    fn duplicate_registration_is_rejected_and_keeps_first_key() {
        let mut reg = UserRegistry::new();
        reg.register(addr(), "K").unwrap();
        assert_eq!(reg.register(addr(), "OTHER"), Err(AuthError::AlreadyRegistered));
        assert!(reg.authenticate(&addr(), "K"));
        assert!(!reg.authenticate(&addr(), "OTHER"));
    }

    #[test]
    fn unregistered_address_never_authenticates() {
        let reg = UserRegistry::new();
        assert!(!reg.authenticate(&addr(), "anything"));
    }
}
