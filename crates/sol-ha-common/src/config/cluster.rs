//! ---
//! ha_section: "02-configuration-identity"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Configuration, identity, and shared runtime primitives."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

use super::{validate_url, ConfigError};

/// Well-known Solana clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterName {
    MainnetBeta,
    Testnet,
    Devnet,
}

impl ClusterName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterName::MainnetBeta => "mainnet-beta",
            ClusterName::Testnet => "testnet",
            ClusterName::Devnet => "devnet",
        }
    }

    /// The public default RPC endpoint for the cluster.
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            ClusterName::MainnetBeta => "https://api.mainnet-beta.solana.com",
            ClusterName::Testnet => "https://api.testnet.solana.com",
            ClusterName::Devnet => "https://api.devnet.solana.com",
        }
    }
}

impl std::fmt::Display for ClusterName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cluster directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: ClusterName,
    #[serde(default)]
    pub rpc_urls: Vec<String>,
}

impl ClusterConfig {
    /// Fall back to the cluster's public RPC endpoint when none is given.
    pub fn apply_defaults(&mut self) {
        if self.rpc_urls.is_empty() {
            self.rpc_urls = vec![self.name.default_rpc_url().to_owned()];
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_urls.is_empty() {
            return Err(ConfigError::Invalid(
                "cluster.rpc_urls must be a non-empty list of RPC URLs".to_owned(),
            ));
        }
        for url in &self.rpc_urls {
            validate_url("cluster.rpc_urls", url)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_cluster_name() {
        for (name, expected) in [
            (ClusterName::MainnetBeta, "https://api.mainnet-beta.solana.com"),
            (ClusterName::Testnet, "https://api.testnet.solana.com"),
            (ClusterName::Devnet, "https://api.devnet.solana.com"),
        ] {
            let mut config = ClusterConfig {
                name,
                rpc_urls: Vec::new(),
            };
            config.apply_defaults();
            assert_eq!(config.rpc_urls, vec![expected.to_string()]);
        }
    }

    #[test]
    fn explicit_urls_are_kept() {
        let mut config = ClusterConfig {
            name: ClusterName::Devnet,
            rpc_urls: vec!["https://rpc.internal:8899".into()],
        };
        config.apply_defaults();
        assert_eq!(config.rpc_urls.len(), 1);
        assert_eq!(config.rpc_urls[0], "https://rpc.internal:8899");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cluster_name_parses_kebab_case() {
        let name: ClusterName = serde_yaml::from_str("mainnet-beta").unwrap();
        assert_eq!(name, ClusterName::MainnetBeta);
        assert!(serde_yaml::from_str::<ClusterName>("localnet").is_err());
    }
}
