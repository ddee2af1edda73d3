//! Address type: `smartX` + 40 hex digits (spec §3).

use serde::{Deserialize, Serialize};
use smx_crypto::{is_system_address, system_address, valid_address};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidAddress;

impl fmt::Display for InvalidAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "address does not match smartX[0-9a-fA-F]{{40}}")
    }
}

impl std::error::Error for InvalidAddress {}

impl Address {
    pub fn parse(s: impl Into<String>) -> Result<Self, InvalidAddress> {
        let s = s.into();
        if valid_address(&s) {
            Ok(Address(s))
        } else {
            Err(InvalidAddress)
        }
    }

    pub fn system() -> Self {
        Address(system_address())
    }

    pub fn is_system(&self) -> bool {
        is_system_address(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_address() {
        let addr = format!("smartX{}", "a".repeat(40));
        assert!(Address::parse(addr).is_ok());
    }

    #[test]
    fn rejects_malformed_address() {
        assert!(Address::parse("not-an-address").is_err());
    }

    #[test]
    fn system_address_is_flagged() {
        assert!(Address::system().is_system());
        let other = Address::parse(format!("smartX{}", "1".repeat(40))).unwrap();
        assert!(!other.is_system());
    }
}
