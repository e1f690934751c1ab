//! ---
//! ha_section: "02-configuration-identity"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Configuration, identity, and shared runtime primitives."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::ConfigError;

fn default_port() -> u16 {
    9090
}

/// Prometheus exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Operator labels attached to every exported gauge.
    #[serde(default)]
    pub static_labels: IndexMap<String, String>,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            static_labels: IndexMap::new(),
        }
    }
}

impl PrometheusConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid(
                "prometheus.port must be positive and non-zero".to_owned(),
            ));
        }
        Ok(())
    }
}
