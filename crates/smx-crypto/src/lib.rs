// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SMARTX CHAIN - CRYPTOGRAPHY MODULE
//
// Content hashing (SHA-256), HMAC peer-authentication, address validity,
// and hashed-key comparison for contract user tables.
//
// Key generation and signing are out of scope here: the node consumes an
// external key-derivation collaborator (see smx-node::external) rather than
// owning a wallet implementation.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

/// Address prefix every valid account string starts with.
pub const ADDRESS_PREFIX: &str = "smartX";
/// Hex digits following the prefix.
pub const ADDRESS_HEX_LEN: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    InvalidKeyLength,
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CryptoError::InvalidKeyLength => write!(f, "HMAC key of invalid length"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// SHA-256 over arbitrary bytes.
pub fn hash(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Hex-encoded SHA-256, the form used inside block/transaction hash fields.
pub fn hash_hex(bytes: &[u8]) -> String {
    hex::encode(hash(bytes))
}

/// HMAC-SHA256(key, bytes). Used for peer registration authentication
/// (spec §4.7: `HMAC(url, chainId)`, key = chainId, message = url).
pub fn hmac(key: &[u8], bytes: &[u8]) -> [u8; 32] {
    // HMAC accepts keys of any length (it pads/hashes internally), so this
    // never actually fails, but the signature stays fallible to mirror the
    // underlying `Mac::new_from_slice` contract.
    let mut mac =
        Hmac::<Sha256>::new_from_slice(key).expect("HMAC-SHA256 accepts keys of any length");
    mac.update(bytes);
    mac.finalize().into_bytes().into()
}

/// `base64(HMAC-SHA256(key, message))`, the literal wire form spec §6 asks
/// the `Register:<url>|<hmac>` request to carry.
pub fn hmac_b64(key: &[u8], bytes: &[u8]) -> String {
    B64.encode(hmac(key, bytes))
}

/// `base64(SHA-256(utf8(key)))` — the Authenticated User Table's stored
/// form (spec §3). Access control compares these hashes, never raw keys.
pub fn hash_key(key: &str) -> String {
    B64.encode(hash(key.as_bytes()))
}

/// True iff `s` matches `smartX[0-9a-fA-F]{40}`.
pub fn valid_address(s: &str) -> bool {
    match s.strip_prefix(ADDRESS_PREFIX) {
        Some(rest) => rest.len() == ADDRESS_HEX_LEN && rest.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// The reserved system address: prefix followed by 40 zero hex digits.
/// Marks protocol-originated transfers (rewards, genesis).
pub fn system_address() -> String {
    format!("{ADDRESS_PREFIX}{}", "0".repeat(ADDRESS_HEX_LEN))
}

pub fn is_system_address(s: &str) -> bool {
    s == system_address()
}

/// Stable fingerprint of the running binary, exchanged in the peer
/// handshake (spec §4.2, §4.7) only for cross-version compatibility
/// warnings — a mismatch never severs the link by itself.
pub fn assembly_fingerprint() -> String {
    hash_hex(env!("CARGO_PKG_VERSION").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash(b"abc"), hash(b"abc"));
        assert_ne!(hash(b"abc"), hash(b"abd"));
    }

    #[test]
    fn valid_address_accepts_well_formed() {
        let addr = format!("smartX{}", "a".repeat(40));
        assert!(valid_address(&addr));
    }

    #[test]
    fn valid_address_rejects_short_hex() {
        let addr = format!("smartX{}", "a".repeat(39));
        assert!(!valid_address(&addr));
    }

    #[test]
    fn valid_address_rejects_bad_prefix() {
        let addr = format!("SMARTX{}", "a".repeat(40));
        assert!(!valid_address(&addr));
    }

    #[test]
    fn valid_address_rejects_non_hex() {
        let addr = format!("smartX{}g", "a".repeat(39));
        assert!(!valid_address(&addr));
    }

    #[test]
    fn system_address_is_valid_and_flagged() {
        let sys = system_address();
        assert!(valid_address(&sys));
        assert!(is_system_address(&sys));
    }

    #[test]
    fn hmac_b64_matches_manual_computation() {
        let a = hmac_b64(b"chain-id", b"http://peer:9000");
        let b = hmac_b64(b"chain-id", b"http://peer:9000");
        assert_eq!(a, b);
        let c = hmac_b64(b"other-chain", b"http://peer:9000");
        assert_ne!(a, c);
    }

    #[test]
    fn hash_key_is_base64_of_sha256() {
        let expected = B64.encode(hash(b"my-secret"));
        assert_eq!(hash_key("my-secret"), expected);
    }
}
