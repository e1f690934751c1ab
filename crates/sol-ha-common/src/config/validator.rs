//! ---
//! ha_section: "02-configuration-identity"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Configuration, identity, and shared runtime primitives."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{validate_url, ConfigError};

fn default_rpc_url() -> String {
    "http://localhost:8899".to_owned()
}

fn default_public_ip_service_urls() -> Vec<String> {
    [
        "https://api.ipify.org",
        "https://checkip.amazonaws.com",
        "https://ipinfo.io/ip",
        "https://4.icanhazip.com",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

/// Local validator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    pub name: String,
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_public_ip_service_urls")]
    pub public_ip_service_urls: Vec<String>,
    pub identities: IdentityPathsConfig,
}

/// Paths to the active and passive identity keypair files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityPathsConfig {
    pub active: PathBuf,
    pub passive: PathBuf,
}

impl ValidatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "validator.name must be defined".to_owned(),
            ));
        }
        validate_url("validator.rpc_url", &self.rpc_url)?;
        for url in &self.public_ip_service_urls {
            validate_url("validator.public_ip_service_urls", url)?;
        }
        Ok(())
    }
}
