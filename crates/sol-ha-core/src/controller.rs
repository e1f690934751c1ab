//! ---
//! ha_section: "01-failover-core"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Failover decision core and role transitions."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use sol_ha_common::config::Config;
use sol_ha_common::{public_ip, Health, IdentityPair, Role, State, StateCache};
use sol_ha_gossip::GossipView;
use sol_ha_rpc::{ClusterRpcClient, ValidatorRpcClient};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::local::{LocalValidator, RpcLocalValidator};
use crate::transition::{DesiredRole, RoleTransition};

/// What the latest gossip snapshot says about the active identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveSighting {
    /// No peer is running the active identity.
    Absent,
    /// This supervisor's own peer entry carries the active identity.
    Own,
    /// A different peer carries the active identity.
    Other,
}

/// Outcome of evaluating one tick of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    HoldActive,
    Demote,
    HoldPassive,
    ConsiderTakeover,
    HoldUnknown,
}

/// Pure per-tick decision. The takeover path is only a candidacy: the
/// controller still applies jitter and re-checks gossip before acting.
fn decide(
    local_role: Role,
    sighting: ActiveSighting,
    self_in_gossip: bool,
    leaderless_ticks: u32,
    threshold: u32,
) -> Decision {
    match (local_role, sighting) {
        (Role::Active, ActiveSighting::Other) => Decision::Demote,
        (Role::Active, _) => Decision::HoldActive,
        (Role::Passive, ActiveSighting::Absent)
            if leaderless_ticks >= threshold && self_in_gossip =>
        {
            Decision::ConsiderTakeover
        }
        (Role::Passive, _) => Decision::HoldPassive,
        (Role::Unknown, _) => Decision::HoldUnknown,
    }
}

/// Inputs for constructing a [`FailoverController`].
pub struct ControllerOptions {
    /// Fully loaded configuration with role templates already rendered.
    pub config: Arc<Config>,
    pub identities: Arc<IdentityPair>,
    pub cache: Arc<StateCache>,
    pub shutdown: watch::Receiver<bool>,
    /// Skip discovery and use this address as the own public IP.
    pub public_ip: Option<Ipv4Addr>,
}

/// The periodic failover loop: refresh gossip, evaluate the state machine,
/// drive role transitions, publish the state cache.
pub struct FailoverController {
    config: Arc<Config>,
    cache: Arc<StateCache>,
    gossip: GossipView,
    local: Arc<dyn LocalValidator>,
    transition: RoleTransition,
    self_ip: Ipv4Addr,
    hostname: String,
    public_ip: String,
    leaderless_ticks: u32,
    shutdown: watch::Receiver<bool>,
}

impl FailoverController {
    /// Discover the own public IP, resolve the self peer, and wire up the
    /// gossip view and RPC clients. Failures here are startup-fatal.
    pub async fn new(opts: ControllerOptions) -> Result<Self> {
        let config = opts.config;
        let identities = opts.identities;
        let timeout = config.failover.rpc_timeout();

        let self_ip = match opts.public_ip {
            Some(ip) => ip,
            None => public_ip::discover(&config.validator.public_ip_service_urls, timeout)
                .await
                .context("failed to discover own public IP")?,
        };

        // The self peer is the configured peer matching the discovered IP;
        // otherwise it is inserted under the validator's own name.
        let mut peers = config.failover.peer_addresses();
        let self_name = match peers.iter().find(|(_, ip)| **ip == self_ip) {
            Some((name, _)) => name.clone(),
            None => {
                peers.insert(config.validator.name.clone(), self_ip);
                config.validator.name.clone()
            }
        };
        info!(
            peer = %self_name,
            public_ip = %self_ip,
            peer_count = peers.len(),
            "resolved self peer"
        );

        let cluster_rpc = ClusterRpcClient::new(config.cluster.rpc_urls.clone(), timeout)
            .context("failed to construct cluster RPC client")?;
        let gossip = GossipView::new(cluster_rpc, peers, identities.active.pubkey().to_owned());

        let local_rpc = ValidatorRpcClient::new(config.validator.rpc_url.clone(), timeout)
            .context("failed to construct local validator RPC client")?;
        let local: Arc<dyn LocalValidator> =
            Arc::new(RpcLocalValidator::new(local_rpc, identities.clone()));

        let transition = RoleTransition::new(
            local.clone(),
            opts.cache.clone(),
            config.failover.active.clone(),
            config.failover.passive.clone(),
            config.failover.dry_run,
        );

        let hostname = hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let public_ip = self_ip.to_string();

        opts.cache.update(State {
            validator_name: config.validator.name.clone(),
            hostname: hostname.clone(),
            public_ip: public_ip.clone(),
            ..State::default()
        });

        Ok(Self {
            config,
            cache: opts.cache,
            gossip,
            local,
            transition,
            self_ip,
            hostname,
            public_ip,
            leaderless_ticks: 0,
            shutdown: opts.shutdown,
        })
    }

    /// Run the controller loop until shutdown is requested. A tick in
    /// progress always completes; running subprocesses are never cut off.
    pub async fn run(mut self) -> Result<()> {
        info!(
            validator = %self.config.validator.name,
            cluster = %self.config.cluster.name,
            poll_interval = ?self.config.failover.poll_interval_duration,
            leaderless_samples_threshold = self.config.failover.leaderless_samples_threshold,
            takeover_jitter_seconds = self.config.failover.takeover_jitter_seconds,
            dry_run = self.config.failover.dry_run,
            "failover controller started"
        );

        loop {
            self.tick().await;
            if *self.shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.failover.poll_interval_duration) => {}
                _ = self.shutdown.changed() => break,
            }
        }

        info!("failover controller stopped");
        Ok(())
    }

    async fn tick(&mut self) {
        self.gossip.refresh().await;
        let self_in_gossip = self.gossip.has_ip(self.self_ip);

        // Scan every active observation: another peer running the active
        // identity always outranks our own entry.
        let mut sighting = ActiveSighting::Absent;
        for (name, obs) in self.gossip.observations() {
            if !obs.last_seen_active {
                continue;
            }
            if obs.ip == self.self_ip {
                debug!(peer = %name, "own peer entry carries the active identity");
                if sighting == ActiveSighting::Absent {
                    sighting = ActiveSighting::Own;
                }
            } else {
                debug!(peer = %name, ip = %obs.ip, pubkey = %obs.pubkey, "active peer observed");
                sighting = ActiveSighting::Other;
            }
        }

        if sighting == ActiveSighting::Absent {
            self.leaderless_ticks = self.leaderless_ticks.saturating_add(1);
            debug!(
                leaderless_ticks = self.leaderless_ticks,
                threshold = self.config.failover.leaderless_samples_threshold,
                "no active peer observed"
            );
        } else {
            self.leaderless_ticks = 0;
        }

        let local_role = self.local.current_role().await;
        let decision = decide(
            local_role,
            sighting,
            self_in_gossip,
            self.leaderless_ticks,
            self.config.failover.leaderless_samples_threshold,
        );
        debug!(
            ?decision,
            role = %local_role,
            self_in_gossip,
            "tick evaluated"
        );

        let mut transitioned = false;
        match decision {
            Decision::ConsiderTakeover => {
                transitioned = self.attempt_takeover().await;
            }
            Decision::Demote => {
                warn!(
                    "another peer is active while the local identity is active; demoting to resolve the split"
                );
                transitioned = true;
                if let Err(err) = self.transition.ensure(DesiredRole::Passive).await {
                    error!(error = %err, "demotion failed; retrying next tick");
                }
            }
            Decision::HoldUnknown => {
                warn!("local role is unknown; holding until the local identity resolves");
            }
            Decision::HoldActive | Decision::HoldPassive => {}
        }

        let role = if transitioned {
            self.local.current_role().await
        } else {
            local_role
        };
        // An unresolved local identity counts as unhealthy regardless of
        // what the health endpoint says.
        let healthy = self.local.is_healthy().await;
        let status = if healthy && role != Role::Unknown {
            Health::Healthy
        } else {
            Health::Unhealthy
        };

        self.cache.update(State {
            validator_name: self.config.validator.name.clone(),
            hostname: self.hostname.clone(),
            public_ip: self.public_ip.clone(),
            role,
            status,
            peer_count: self.gossip.observations().len(),
            self_in_gossip: self.gossip.has_ip(self.self_ip),
            ..State::default()
        });
    }

    /// First-responder election: sleep a random jitter, re-refresh gossip,
    /// and only claim the active role if no peer beat us to it and our own
    /// IP is still visible. Returns whether a transition was attempted.
    async fn attempt_takeover(&mut self) -> bool {
        let jitter_seconds = self.config.failover.takeover_jitter_seconds;
        if jitter_seconds > 0 {
            let wait = rand::thread_rng().gen_range(0.0..=jitter_seconds as f64);
            info!(wait_seconds = %format!("{wait:.2}"), "takeover candidate; drawing jitter");
            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
        }

        self.gossip.refresh().await;

        if self
            .gossip
            .has_active_peer_within(self.config.failover.poll_interval_duration)
        {
            if let Some((name, obs)) = self.gossip.get_active_peer() {
                info!(
                    peer = %name,
                    ip = %obs.ip,
                    "another peer claimed the active role during jitter; standing down"
                );
            }
            return false;
        }

        if !self.gossip.has_ip(self.self_ip) {
            if self.gossip.has_other_peers_than(self.self_ip) {
                warn!("peers are visible in gossip but this node is not; refusing takeover");
            } else {
                warn!("gossip view is empty after jitter; refusing takeover");
            }
            return false;
        }

        info!(
            leaderless_ticks = self.leaderless_ticks,
            "no active peer observed; taking over the active role"
        );
        if let Err(err) = self.transition.ensure(DesiredRole::Active).await {
            error!(error = %err, "takeover failed; retrying next tick");
        }
        true
    }
}
