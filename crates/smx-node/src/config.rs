//! Configuration: a hand-rolled reader for the INI-shaped file spec §6
//! describes (`[Config]`, `[Peers]`, `[Miner]`, `[Server]`), producing a
//! typed [`NodeConfig`].

use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io(String),
    MissingKey(String),
    InvalidValue { key: String, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IOFailed: {e}"),
            ConfigError::MissingKey(k) => write!(f, "missing required config key '{k}'"),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value '{value}' for key '{key}'")
            }
        }
    }
}
impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub chain_id: String,
    pub blockchain_path: String,
    pub ip: String,
    pub port: u16,
    pub debug: bool,
    pub miner_address: String,
    pub server_public_key: Option<String>,
    pub server_private_key: Option<String>,
    pub peers: Vec<String>,
}

/// Parses `[Section]` headers and `Key = Value` / `Key: Value` lines; `;`
/// and `#` start a comment. Lines under `[Peers]` with no `=`/`:` are taken
/// literally as one peer URL per line (spec §6: "one URL per line under
/// `[Peers]`").
fn parse_ini(text: &str) -> (HashMap<String, HashMap<String, String>>, Vec<String>) {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut peers = Vec::new();
    let mut current = String::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            current = stripped.trim().to_string();
            sections.entry(current.clone()).or_default();
            continue;
        }
        if current.eq_ignore_ascii_case("Peers") && line.contains("://") {
            peers.push(line.to_string());
            continue;
        }
        if let Some((key, value)) = line.split_once('=').or_else(|| line.split_once(':')) {
            sections
                .entry(current.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    (sections, peers)
}

impl NodeConfig {
    pub fn from_str(text: &str) -> Result<NodeConfig, ConfigError> {
        let (sections, peers) = parse_ini(text);
        let config_section = sections.get("Config").cloned().unwrap_or_default();
        let miner_section = sections.get("Miner").cloned().unwrap_or_default();
        let server_section = sections.get("Server").cloned().unwrap_or_default();

        let get = |section: &HashMap<String, String>, key: &str| -> Option<String> {
            section.get(key).cloned()
        };

        let chain_id =
            get(&config_section, "ChainId").ok_or_else(|| ConfigError::MissingKey("ChainId".to_string()))?;
        let blockchain_path = get(&config_section, "BlockchainPath")
            .ok_or_else(|| ConfigError::MissingKey("BlockchainPath".to_string()))?;
        let ip = get(&server_section, "IP").unwrap_or_else(|| "0.0.0.0".to_string());
        let port_str =
            get(&server_section, "Port").ok_or_else(|| ConfigError::MissingKey("Port".to_string()))?;
        let port: u16 = port_str
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key: "Port".to_string(), value: port_str })?;
        let debug = match get(&config_section, "Debug").as_deref() {
            Some("true") | Some("1") | Some("yes") => true,
            Some("false") | Some("0") | Some("no") | None => false,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "Debug".to_string(),
                    value: other.to_string(),
                })
            }
        };
        let miner_address = get(&miner_section, "MinerAddress")
            .ok_or_else(|| ConfigError::MissingKey("MinerAddress".to_string()))?;
        let server_public_key = get(&server_section, "ServerPublicKey");
        let server_private_key = get(&server_section, "ServerPrivateKey");

        Ok(NodeConfig {
            chain_id,
            blockchain_path,
            ip,
            port,
            debug,
            miner_address,
            server_public_key,
            server_private_key,
            peers,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<NodeConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        NodeConfig::from_str(&text)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [Config]
        ChainId = smartx-testnet
        BlockchainPath = ./chain.dat
        Debug = true

        [Miner]
        MinerAddress = smartXaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa

        [Server]
        IP = 127.0.0.1
        Port = 9000
        ServerPublicKey = pub123
        ServerPrivateKey = priv123

        [Peers]
        http://peer-a:9000
        http://peer-b:9000
    "#;

    #[test]
    fn parses_all_sections() {
        let config = NodeConfig::from_str(SAMPLE).unwrap();
        assert_eq!(config.chain_id, "smartx-testnet");
        assert_eq!(config.blockchain_path, "./chain.dat");
        assert!(config.debug);
        assert_eq!(config.port, 9000);
        assert_eq!(config.ip, "127.0.0.1");
        assert_eq!(config.peers, vec!["http://peer-a:9000", "http://peer-b:9000"]);
        assert_eq!(config.server_public_key.as_deref(), Some("pub123"));
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let text = "[Config]\nChainId = x\n[Server]\nPort = 9000\n[Miner]\nMinerAddress = smartX\n";
        assert_eq!(
            NodeConfig::from_str(text),
            Err(ConfigError::MissingKey("BlockchainPath".to_string()))
        );
    }

    #[test]
    fn invalid_port_is_rejected() {
        let text =
            "[Config]\nChainId=x\nBlockchainPath=p\n[Server]\nPort=notanumber\n[Miner]\nMinerAddress=m\n";
        assert!(matches!(NodeConfig::from_str(text), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let text = "; a comment\n# another\n\n[Config]\nChainId=x\nBlockchainPath=p\n[Server]\nPort=1\n[Miner]\nMinerAddress=m\n";
        assert!(NodeConfig::from_str(text).is_ok());
    }
}
