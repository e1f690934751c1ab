//! ---
//! ha_section: "01-failover-core"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Cluster gossip membership view."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use std::net::Ipv4Addr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use sol_ha_rpc::{ClusterNode, ClusterRpcClient};
use tracing::{debug, error, warn};

/// What the cluster directory reported about one configured peer during the
/// latest refresh. The whole observation map is replaced per refresh, so a
/// peer that dropped out of gossip is simply absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerObservation {
    pub ip: Ipv4Addr,
    pub pubkey: String,
    pub last_seen_at: DateTime<Utc>,
    /// True iff the observed pubkey equals the configured active pubkey.
    pub last_seen_active: bool,
}

/// The peers currently visible in cluster gossip, keyed by configured name.
#[derive(Debug)]
pub struct GossipView {
    rpc: ClusterRpcClient,
    peers: IndexMap<String, Ipv4Addr>,
    active_pubkey: String,
    observations: IndexMap<String, PeerObservation>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl GossipView {
    pub fn new(
        rpc: ClusterRpcClient,
        peers: IndexMap<String, Ipv4Addr>,
        active_pubkey: String,
    ) -> Self {
        Self {
            rpc,
            peers,
            active_pubkey,
            observations: IndexMap::new(),
            refreshed_at: None,
        }
    }

    /// Rebuild the observation map from the cluster directory.
    ///
    /// An RPC failure is not propagated: the map becomes empty, which the
    /// downstream state machine reads as "no active peer seen", and the
    /// refresh timestamp still advances.
    pub async fn refresh(&mut self) {
        debug!("refreshing gossip peer state");
        match self.rpc.get_cluster_nodes().await {
            Ok(nodes) => {
                self.observations = match_nodes(&self.peers, &self.active_pubkey, &nodes);
                for (name, ip) in &self.peers {
                    if !self.observations.contains_key(name) {
                        warn!(peer = %name, ip = %ip, "configured peer not found in gossip");
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "failed to get cluster nodes; treating gossip as empty");
                self.observations = IndexMap::new();
            }
        }
        self.refreshed_at = Some(Utc::now());
        debug!(peer_count = self.observations.len(), "gossip peer state refreshed");
    }

    /// Any peer observed running the active identity?
    pub fn has_active_peer(&self) -> bool {
        self.observations.values().any(|obs| obs.last_seen_active)
    }

    /// Any peer observed active within the last `window`?
    pub fn has_active_peer_within(&self, window: Duration) -> bool {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        self.observations.values().any(|obs| {
            obs.last_seen_active && Utc::now().signed_duration_since(obs.last_seen_at) < window
        })
    }

    /// Is the given IP present in the current observations?
    pub fn has_ip(&self, ip: Ipv4Addr) -> bool {
        self.observations.values().any(|obs| obs.ip == ip)
    }

    /// Are any peers other than the given IP visible?
    pub fn has_other_peers_than(&self, ip: Ipv4Addr) -> bool {
        self.observations.values().any(|obs| obs.ip != ip)
    }

    /// The currently active peer, if one is observed.
    pub fn get_active_peer(&self) -> Option<(&str, &PeerObservation)> {
        self.observations
            .iter()
            .find(|(_, obs)| obs.last_seen_active)
            .map(|(name, obs)| (name.as_str(), obs))
    }

    pub fn observations(&self) -> &IndexMap<String, PeerObservation> {
        &self.observations
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    #[doc(hidden)]
    pub fn replace_observations(&mut self, observations: IndexMap<String, PeerObservation>) {
        self.observations = observations;
        self.refreshed_at = Some(Utc::now());
    }
}

/// Match directory nodes against the configured peer set.
///
/// The gossip endpoint is `host:port`; the port is stripped and the IPv4
/// host compared against configured peer IPs. Unmatched nodes are ignored.
pub fn match_nodes(
    peers: &IndexMap<String, Ipv4Addr>,
    active_pubkey: &str,
    nodes: &[ClusterNode],
) -> IndexMap<String, PeerObservation> {
    let mut observations = IndexMap::new();
    for node in nodes {
        let Some(gossip) = node.gossip.as_deref() else {
            continue;
        };
        let host = gossip.split(':').next().unwrap_or(gossip);
        let Ok(ip) = host.parse::<Ipv4Addr>() else {
            continue;
        };
        let Some((name, _)) = peers.iter().find(|(_, peer_ip)| **peer_ip == ip) else {
            continue;
        };

        let observation = PeerObservation {
            ip,
            pubkey: node.pubkey.clone(),
            last_seen_at: Utc::now(),
            last_seen_active: node.pubkey == active_pubkey,
        };
        debug!(
            peer = %name,
            ip = %observation.ip,
            pubkey = %observation.pubkey,
            is_active = observation.last_seen_active,
            "peer found in gossip"
        );
        observations.insert(name.clone(), observation);

        if observations.len() == peers.len() {
            break;
        }
    }
    observations
}
