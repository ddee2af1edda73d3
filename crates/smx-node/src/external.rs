//! External collaborator traits (spec §1, §6, §9): HD-wallet key derivation
//! and OS secure-vault secret storage are consumed only through these
//! interfaces. The core never implements BIP-39/44 or a platform keychain
//! itself (spec §9's "model as explicitly constructed values threaded
//! through a context, not ambient globals").

/// A node's keypair material, opaque beyond what the chain engine needs:
/// an address to mine/mint to and a private key used only by
/// [`BlockSigner`](smx_core::BlockSigner) implementations this crate does
/// not provide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keypair {
    pub address: String,
    pub private_key: String,
}

/// External HD-wallet / key-derivation collaborator (spec §1: "HD-wallet
/// generation over BIP-39/44 (treated as an external key-derivation
/// library)").
pub trait KeyProvider: Send + Sync {
    fn load_or_create(&self, config_key: Option<&str>) -> Result<Keypair, String>;
}

/// Deterministic stand-in used when no real key-derivation backend is
/// wired in (tests, local dev): the config's `ServerPublicKey`/
/// `ServerPrivateKey` pair is used verbatim, or a fixed placeholder pair
/// if absent.
pub struct ConfiguredKeyProvider {
    pub public_key: Option<String>,
    pub private_key: Option<String>,
}

impl KeyProvider for ConfiguredKeyProvider {
    fn load_or_create(&self, _config_key: Option<&str>) -> Result<Keypair, String> {
        let address = self.public_key.clone().ok_or_else(|| {
            "no ServerPublicKey configured and no external key-derivation backend wired in"
                .to_string()
        })?;
        let private_key = self.private_key.clone().unwrap_or_default();
        Ok(Keypair { address, private_key })
    }
}

/// External OS secure-vault collaborator (spec §1: "OS-specific secure
/// vault storage").
pub trait SecretStore: Send + Sync {
    fn get_secret(&self, name: &str) -> Option<String>;
}

/// Environment-variable-backed stand-in: reads `SMARTX_SECRET_<NAME>`.
/// Real deployments swap in an OS vault without touching the node's
/// boot sequence (spec §9: threaded through context, not ambient globals).
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get_secret(&self, name: &str) -> Option<String> {
        std::env::var(format!("SMARTX_SECRET_{}", name.to_uppercase())).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_key_provider_returns_configured_pair() {
        let provider = ConfiguredKeyProvider {
            public_key: Some("smartXaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string()),
            private_key: Some("priv".to_string()),
        };
        let keypair = provider.load_or_create(None).unwrap();
        assert_eq!(keypair.private_key, "priv");
    }

    #[test]
    fn configured_key_provider_errors_without_public_key() {
        let provider = ConfiguredKeyProvider { public_key: None, private_key: None };
        assert!(provider.load_or_create(None).is_err());
    }
}
