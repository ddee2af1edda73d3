//! Peer wire protocol: request/reply framing over a reliable stream, each
//! message a single UTF-8 string (spec §6).

use smx_crypto::hmac_b64;

/// A single request line, parsed from or formatted to the literal wire
/// forms in spec §6's table. `Explorer*` variants are the supplemented
/// read-only query surface (SPEC_FULL §4) riding the same framing, since the
/// actual HTTP/REST explorer front door is an excluded external
/// collaborator (spec §1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Register { url: String, hmac_b64: String },
    Heartbeat { url: String },
    Nodes,
    BlockCount { requester_url: String, remote_len: u64 },
    ValidateChain,
    GetBlock { index: u64 },
    GetChain { requester_url: String },
    ExplorerBlockCount,
    ExplorerGetContractCode { name: String },
    ExplorerGetUserTransactions { address: String },
}

impl Request {
    pub fn parse(line: &str) -> Option<Request> {
        let line = line.trim_end_matches(['\n', '\r']);
        if let Some(rest) = line.strip_prefix("Register:") {
            let (url, hmac) = rest.split_once('|')?;
            return Some(Request::Register { url: url.to_string(), hmac_b64: hmac.to_string() });
        }
        if let Some(url) = line.strip_prefix("Heartbeat:") {
            return Some(Request::Heartbeat { url: url.to_string() });
        }
        if line == "Nodes" {
            return Some(Request::Nodes);
        }
        if let Some(rest) = line.strip_prefix("BlockCount:") {
            let (requester_url, len_str) = rest.rsplit_once(':')?;
            let remote_len = len_str.parse().ok()?;
            return Some(Request::BlockCount { requester_url: requester_url.to_string(), remote_len });
        }
        if line == "ValidateChain" {
            return Some(Request::ValidateChain);
        }
        if let Some(rest) = line.strip_prefix("GetBlock/") {
            let index = rest.parse().ok()?;
            return Some(Request::GetBlock { index });
        }
        if let Some(requester_url) = line.strip_prefix("GetChain#") {
            return Some(Request::GetChain { requester_url: requester_url.to_string() });
        }
        if line == "GetBlockCount" {
            return Some(Request::ExplorerBlockCount);
        }
        if let Some(name) = line.strip_prefix("GetContractCode/") {
            return Some(Request::ExplorerGetContractCode { name: name.to_string() });
        }
        if let Some(address) = line.strip_prefix("GetUserTransactions/") {
            return Some(Request::ExplorerGetUserTransactions { address: address.to_string() });
        }
        None
    }

    pub fn to_wire(&self) -> String {
        match self {
            Request::Register { url, hmac_b64 } => format!("Register:{url}|{hmac_b64}"),
            Request::Heartbeat { url } => format!("Heartbeat:{url}"),
            Request::Nodes => "Nodes".to_string(),
            Request::BlockCount { requester_url, remote_len } => {
                format!("BlockCount:{requester_url}:{remote_len}")
            }
            Request::ValidateChain => "ValidateChain".to_string(),
            Request::GetBlock { index } => format!("GetBlock/{index}"),
            Request::GetChain { requester_url } => format!("GetChain#{requester_url}"),
            Request::ExplorerBlockCount => "GetBlockCount".to_string(),
            Request::ExplorerGetContractCode { name } => format!("GetContractCode/{name}"),
            Request::ExplorerGetUserTransactions { address } => {
                format!("GetUserTransactions/{address}")
            }
        }
    }

    /// Builds a `Register:<url>|<hmac>` request, computing the HMAC over
    /// `url` keyed by `chain_id` (spec §4.7: "HMAC is computed as
    /// `base64(HMAC-SHA256(key = chainId, message = url))`").
    pub fn register(url: &str, chain_id: &str) -> Request {
        Request::Register {
            url: url.to_string(),
            hmac_b64: hmac_b64(chain_id.as_bytes(), url.as_bytes()),
        }
    }
}

/// A single reply line (spec §6: "errors begin with `error:` and include a
/// human-readable reason").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Invalid,
    Error(String),
    Nodes(Vec<String>),
    Length(u64),
    Envelope(String),
}

impl Reply {
    pub fn to_wire(&self) -> String {
        match self {
            Reply::Ok => "ok".to_string(),
            Reply::Invalid => "invalid".to_string(),
            Reply::Error(reason) => format!("error:{reason}"),
            Reply::Nodes(urls) => urls.join(","),
            Reply::Length(n) => n.to_string(),
            Reply::Envelope(e) => e.clone(),
        }
    }

    pub fn parse_ok_or_error(line: &str) -> Reply {
        let line = line.trim_end_matches(['\n', '\r']);
        if line == "ok" {
            Reply::Ok
        } else if line == "invalid" {
            Reply::Invalid
        } else if let Some(reason) = line.strip_prefix("error:") {
            Reply::Error(reason.to_string())
        } else {
            Reply::Envelope(line.to_string())
        }
    }
}

/// Verifies a `Register` request's HMAC against the chain id this node
/// actually runs (spec §4.7).
pub fn verify_registration(url: &str, hmac_b64_value: &str, chain_id: &str) -> bool {
    hmac_b64(chain_id.as_bytes(), url.as_bytes()) == hmac_b64_value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_register_request() {
        let req = Request::register("http://peer:9000", "chain-1");
        let wire = req.to_wire();
        assert_eq!(Request::parse(&wire), Some(req));
    }

    #[test]
    fn parses_block_count_with_url_containing_colon() {
        let req = Request::parse("BlockCount:http://me:9000:42").unwrap();
        assert_eq!(
            req,
            Request::BlockCount { requester_url: "http://me:9000".to_string(), remote_len: 42 }
        );
    }

    #[test]
    fn parses_get_block() {
        assert_eq!(Request::parse("GetBlock/7"), Some(Request::GetBlock { index: 7 }));
    }

    #[test]
    fn parses_get_chain_with_requester() {
        assert_eq!(
            Request::parse("GetChain#http://me:9000"),
            Some(Request::GetChain { requester_url: "http://me:9000".to_string() })
        );
    }

    #[test]
    fn rejects_unknown_request() {
        assert_eq!(Request::parse("Nonsense"), None);
    }

    #[test]
    fn reply_error_round_trips() {
        let reply = Reply::Error("bad".to_string());
        assert_eq!(Reply::parse_ok_or_error(&reply.to_wire()), reply);
    }

    #[test]
    fn registration_hmac_verifies_against_matching_chain_id() {
        let req = Request::register("http://peer:9000", "chain-1");
        if let Request::Register { url, hmac_b64 } = &req {
            assert!(verify_registration(url, hmac_b64, "chain-1"));
            assert!(!verify_registration(url, hmac_b64, "chain-2"));
        } else {
            panic!("expected Register");
        }
    }
}
