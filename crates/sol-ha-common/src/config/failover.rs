//! ---
//! ha_section: "02-configuration-identity"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Configuration, identity, and shared runtime primitives."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use std::net::Ipv4Addr;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{ConfigError, RoleConfig};

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_leaderless_samples_threshold() -> u32 {
    3
}

fn default_takeover_jitter_seconds() -> u64 {
    5
}

/// Failover loop configuration: cadence, hysteresis, jitter, peers, and
/// the active/passive role commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval_duration: Duration,
    #[serde(default = "default_leaderless_samples_threshold")]
    pub leaderless_samples_threshold: u32,
    #[serde(default = "default_takeover_jitter_seconds")]
    pub takeover_jitter_seconds: u64,
    #[serde(default)]
    pub dry_run: bool,
    /// Timeout applied to each outbound RPC. Defaults to half the poll
    /// interval when unset.
    #[serde(default, with = "humantime_serde")]
    pub rpc_timeout_duration: Option<Duration>,
    #[serde(default)]
    pub peers: IndexMap<String, PeerConfig>,
    pub active: RoleConfig,
    pub passive: RoleConfig,
}

/// A statically configured peer supervisor, keyed by name in the peer map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    pub ip: Ipv4Addr,
}

impl FailoverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.leaderless_samples_threshold < 1 {
            return Err(ConfigError::Invalid(
                "failover.leaderless_samples_threshold must be >= 1".to_owned(),
            ));
        }
        if self.poll_interval_duration.is_zero() {
            return Err(ConfigError::Invalid(
                "failover.poll_interval_duration must be non-zero".to_owned(),
            ));
        }
        for name in self.peers.keys() {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "failover.peers entries must have a non-empty name".to_owned(),
                ));
            }
        }
        self.active.validate("failover.active")?;
        self.passive.validate("failover.passive")?;
        Ok(())
    }

    /// Effective timeout for gossip/local RPC calls.
    pub fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout_duration
            .unwrap_or(self.poll_interval_duration / 2)
    }

    /// Configured peer names and IPs, in declaration order.
    pub fn peer_addresses(&self) -> IndexMap<String, Ipv4Addr> {
        self.peers
            .iter()
            .map(|(name, peer)| (name.clone(), peer.ip))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role() -> RoleConfig {
        RoleConfig {
            command: "true".into(),
            args: Vec::new(),
            hooks: Default::default(),
        }
    }

    fn base() -> FailoverConfig {
        FailoverConfig {
            poll_interval_duration: Duration::from_secs(4),
            leaderless_samples_threshold: 2,
            takeover_jitter_seconds: 0,
            dry_run: false,
            rpc_timeout_duration: None,
            peers: IndexMap::new(),
            active: role(),
            passive: role(),
        }
    }

    #[test]
    fn explicit_rpc_timeout_wins() {
        let mut config = base();
        assert_eq!(config.rpc_timeout(), Duration::from_secs(2));
        config.rpc_timeout_duration = Some(Duration::from_millis(750));
        assert_eq!(config.rpc_timeout(), Duration::from_millis(750));
    }

    #[test]
    fn peer_addresses_preserve_order() {
        let mut config = base();
        config.peers.insert(
            "validator-2".into(),
            PeerConfig {
                ip: Ipv4Addr::new(10, 0, 0, 2),
            },
        );
        config.peers.insert(
            "validator-3".into(),
            PeerConfig {
                ip: Ipv4Addr::new(10, 0, 0, 3),
            },
        );

        let addresses = config.peer_addresses();
        let names: Vec<_> = addresses.keys().cloned().collect();
        assert_eq!(names, vec!["validator-2", "validator-3"]);
        assert_eq!(addresses["validator-2"], Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let mut config = base();
        config.poll_interval_duration = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
