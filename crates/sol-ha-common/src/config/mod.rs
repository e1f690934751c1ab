//! ---
//! ha_section: "02-configuration-identity"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Configuration, identity, and shared runtime primitives."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::identity::{IdentityError, IdentityPair};

mod cluster;
mod failover;
mod hooks;
mod prometheus;
mod role;
mod validator;

pub use cluster::{ClusterConfig, ClusterName};
pub use failover::{FailoverConfig, PeerConfig};
pub use hooks::{Hook, Hooks};
pub use prometheus::PrometheusConfig;
pub use role::{RoleConfig, TemplateData};
pub use validator::{IdentityPathsConfig, ValidatorConfig};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("unknown template variable '{variable}' in {field}")]
    Template { field: String, variable: String },
}

/// Top-level configuration for the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub validator: ValidatorConfig,
    pub cluster: ClusterConfig,
    pub failover: FailoverConfig,
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// A parsed configuration together with the identity keypairs it references.
///
/// Keypair bytes never enter the serde model; they are loaded from the
/// configured paths after parsing.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub identities: IdentityPair,
}

impl Config {
    /// Load configuration from disk: parse, apply defaults, validate, load
    /// the identity keypairs, and render role-command templates.
    pub fn load(path: impl AsRef<Path>) -> Result<LoadedConfig, ConfigError> {
        let path = expand_tilde(path.as_ref());
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let mut config: Config =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        config.apply_defaults();
        config.validate()?;

        let identities = IdentityPair::load(&config.validator.identities)?;
        let data = identities.template_data();
        config.failover.active.render_templates("failover.active", &data)?;
        config
            .failover
            .passive
            .render_templates("failover.passive", &data)?;

        Ok(LoadedConfig { config, identities })
    }

    /// Fill in defaults that depend on other fields.
    pub fn apply_defaults(&mut self) {
        self.cluster.apply_defaults();
    }

    /// Validate structural invariants across all sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validator.validate()?;
        self.cluster.validate()?;
        self.failover.validate()?;
        self.prometheus.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(contents: &str) -> Result<Self, Self::Err> {
        let mut config: Config =
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }
}

/// Expand a leading `~/` against `$HOME`.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Some(rest) = path.to_str().and_then(|p| p.strip_prefix("~/")) else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

/// Validate that a string is an absolute http(s) URL.
pub(crate) fn validate_url(field: &str, url: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|err| ConfigError::Invalid(format!("{field} must be a valid URL ({url}): {err}")))?;
    if !parsed.has_host() || !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!(
            "{field} must be an absolute http(s) URL: {url}"
        )));
    }
    Ok(())
}
