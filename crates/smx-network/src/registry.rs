//! Peer Registry: known peers and their liveness timestamps (spec §3 "Peer
//! Record", §4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::ToSocketAddrs;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    /// Normalized `scheme://host:port` (spec §3: "URL is normalized...to
    /// deduplicate peers reached by different aliases").
    pub url: String,
    pub chain_id: String,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    InvalidUrl,
    RegistryFull,
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::InvalidUrl => write!(f, "peer URL is not a valid http(s)://host:port"),
            RegistryError::RegistryFull => write!(f, "peer registry at configured maximum"),
        }
    }
}
impl std::error::Error for RegistryError {}

/// Parses `url` into `(scheme, host, port)`, requiring a numeric port (spec
/// §4.6: "`http(s)://host:port` with numeric port").
fn parse_peer_url(url: &str) -> Option<(&str, &str, u16)> {
    let (scheme, rest) = if let Some(rest) = url.strip_prefix("https://") {
        ("https", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        ("http", rest)
    } else {
        return None;
    };
    let rest = rest.trim_end_matches('/');
    let (host, port_str) = rest.rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    let port: u16 = port_str.parse().ok()?;
    Some((scheme, host, port))
}

/// Normalizes `url` to `scheme://ip:port`, resolving the hostname to its
/// canonical IPv4 form where possible so peers reached by hostname and by
/// IP collapse to one registry entry (spec §3 Peer Record invariant).
/// Falls back to the bare host string if resolution fails (e.g. offline
/// tests, `.onion`-style names this node cannot resolve).
pub fn normalize_peer_url(url: &str) -> Result<String, RegistryError> {
    let (scheme, host, port) = parse_peer_url(url).ok_or(RegistryError::InvalidUrl)?;
    let resolved = (host, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.find(|a| a.is_ipv4()))
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| host.to_string());
    Ok(format!("{scheme}://{resolved}:{port}"))
}

/// Known peers behind a single lock, preserving insertion order (spec §4.6
/// `list()`: "iterate peers in insertion order").
pub struct PeerRegistry {
    peers: Mutex<Vec<PeerRecord>>,
    max_peers: usize,
}

impl PeerRegistry {
    pub fn new(max_peers: usize) -> Self {
        PeerRegistry { peers: Mutex::new(Vec::new()), max_peers }
    }

    pub fn from_peers(peers: Vec<PeerRecord>, max_peers: usize) -> Self {
        PeerRegistry { peers: Mutex::new(peers), max_peers }
    }

    pub fn len(&self) -> usize {
        self.peers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normalizes `url` and adds it if not already present, up to
    /// `max_peers` (spec §4.6 `addPeer`). Re-adding a URL that normalizes to
    /// an already-known peer is a no-op (spec §8 invariant 8: dedup by
    /// resolved host:port).
    pub fn add_peer(&self, url: &str, chain_id: &str, now: DateTime<Utc>) -> Result<(), RegistryError> {
        let normalized = normalize_peer_url(url)?;
        let mut peers = self.peers.lock().unwrap();
        if peers.iter().any(|p| p.url == normalized) {
            return Ok(());
        }
        if peers.len() >= self.max_peers {
            return Err(RegistryError::RegistryFull);
        }
        peers.push(PeerRecord { url: normalized, chain_id: chain_id.to_string(), last_seen: now });
        Ok(())
    }

    /// Updates `lastSeen` to `now` for the peer matching `url` (spec §4.6
    /// `touch`). A no-op if the URL does not normalize or is not known.
    pub fn touch(&self, url: &str, now: DateTime<Utc>) {
        let Ok(normalized) = normalize_peer_url(url) else { return };
        let mut peers = self.peers.lock().unwrap();
        if let Some(peer) = peers.iter_mut().find(|p| p.url == normalized) {
            peer.last_seen = now;
        }
    }

    /// Removes peers not seen within `max_age` of `now` (spec §4.6 `prune`).
    pub fn prune(&self, max_age: chrono::Duration, now: DateTime<Utc>) {
        let mut peers = self.peers.lock().unwrap();
        peers.retain(|p| now.signed_duration_since(p.last_seen) <= max_age);
    }

    pub fn list(&self) -> Vec<PeerRecord> {
        self.peers.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn adds_and_lists_in_insertion_order() {
        let registry = PeerRegistry::new(10);
        registry.add_peer("http://127.0.0.1:9000", "chain-1", now()).unwrap();
        registry.add_peer("http://127.0.0.1:9001", "chain-1", now()).unwrap();
        let list = registry.list();
        assert_eq!(list[0].url, "http://127.0.0.1:9000");
        assert_eq!(list[1].url, "http://127.0.0.1:9001");
    }

    #[test]
    fn duplicate_ip_peer_is_deduplicated() {
        let registry = PeerRegistry::new(10);
        registry.add_peer("http://127.0.0.1:9000", "chain-1", now()).unwrap();
        registry.add_peer("http://127.0.0.1:9000", "chain-1", now()).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rejects_url_without_scheme_or_port() {
        let registry = PeerRegistry::new(10);
        assert_eq!(registry.add_peer("127.0.0.1:9000", "c", now()), Err(RegistryError::InvalidUrl));
        assert_eq!(registry.add_peer("http://127.0.0.1", "c", now()), Err(RegistryError::InvalidUrl));
    }

    #[test]
    fn registry_full_is_enforced() {
        let registry = PeerRegistry::new(1);
        registry.add_peer("http://127.0.0.1:9000", "c", now()).unwrap();
        assert_eq!(
            registry.add_peer("http://127.0.0.1:9001", "c", now()),
            Err(RegistryError::RegistryFull)
        );
    }

    #[test]
    fn prune_removes_stale_peers() {
        let registry = PeerRegistry::new(10);
        let old = now() - chrono::Duration::hours(2);
        registry.add_peer("http://127.0.0.1:9000", "c", old).unwrap();
        registry.prune(chrono::Duration::minutes(30), now());
        assert!(registry.is_empty());
    }

    #[test]
    fn touch_updates_last_seen() {
        let registry = PeerRegistry::new(10);
        let old = now() - chrono::Duration::hours(2);
        registry.add_peer("http://127.0.0.1:9000", "c", old).unwrap();
        registry.touch("http://127.0.0.1:9000", now());
        registry.prune(chrono::Duration::minutes(30), now());
        assert!(!registry.is_empty());
    }
}
