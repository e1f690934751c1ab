//! ---
//! ha_section: "02-configuration-identity"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Configuration, identity, and shared runtime primitives."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Role the local validator currently plays, derived from its loaded identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Active,
    Passive,
    #[default]
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Active => "active",
            Role::Passive => "passive",
            Role::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of the local validator as reported by its RPC endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Unhealthy,
    #[default]
    Unknown,
}

impl Health {
    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Healthy => "healthy",
            Health::Unhealthy => "unhealthy",
            Health::Unknown => "unknown",
        }
    }
}

/// Whether a role transition is currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailoverStatus {
    #[default]
    Idle,
    BecomingActive,
    BecomingPassive,
}

impl FailoverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailoverStatus::Idle => "idle",
            FailoverStatus::BecomingActive => "becoming_active",
            FailoverStatus::BecomingPassive => "becoming_passive",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, FailoverStatus::Idle)
    }
}

/// Snapshot of the supervisor state published for the metrics/status surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub validator_name: String,
    pub hostname: String,
    pub public_ip: String,
    pub role: Role,
    pub status: Health,
    pub peer_count: usize,
    pub self_in_gossip: bool,
    pub failover_status: FailoverStatus,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Thread-safe cell holding the latest [`State`].
///
/// Written by the failover controller at tick boundaries; read by the HTTP
/// surface. Readers always receive a by-value copy.
#[derive(Debug, Default)]
pub struct StateCache {
    inner: RwLock<State>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole cached state and stamp `last_updated`.
    pub fn update(&self, mut state: State) {
        state.last_updated = Some(Utc::now());
        *self.inner.write() = state;
    }

    /// Update only the failover status, preserving the rest of the state.
    ///
    /// Called by role transitions on entry and on every exit path so the
    /// cache only ever observes `idle -> becoming_* -> idle`.
    pub fn set_failover_status(&self, status: FailoverStatus) {
        let mut state = self.inner.write();
        state.failover_status = status;
        state.last_updated = Some(Utc::now());
    }

    /// Return a copy of the current state.
    pub fn read(&self) -> State {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_replaces_state_and_stamps_time() {
        let cache = StateCache::new();
        assert!(cache.read().last_updated.is_none());

        cache.update(State {
            validator_name: "validator-1".into(),
            role: Role::Active,
            status: Health::Healthy,
            peer_count: 3,
            self_in_gossip: true,
            ..State::default()
        });

        let state = cache.read();
        assert_eq!(state.validator_name, "validator-1");
        assert_eq!(state.role, Role::Active);
        assert_eq!(state.peer_count, 3);
        assert!(state.last_updated.is_some());
    }

    #[test]
    fn read_returns_a_copy() {
        let cache = StateCache::new();
        cache.update(State {
            peer_count: 1,
            ..State::default()
        });

        let mut copy = cache.read();
        copy.peer_count = 99;
        assert_eq!(cache.read().peer_count, 1);
    }

    #[test]
    fn set_failover_status_preserves_other_fields() {
        let cache = StateCache::new();
        cache.update(State {
            validator_name: "validator-1".into(),
            role: Role::Passive,
            ..State::default()
        });

        cache.set_failover_status(FailoverStatus::BecomingActive);
        let state = cache.read();
        assert_eq!(state.failover_status, FailoverStatus::BecomingActive);
        assert_eq!(state.validator_name, "validator-1");
        assert_eq!(state.role, Role::Passive);
    }

    #[test]
    fn status_strings_are_stable() {
        assert_eq!(Role::Active.as_str(), "active");
        assert_eq!(Health::Unhealthy.as_str(), "unhealthy");
        assert_eq!(FailoverStatus::BecomingPassive.as_str(), "becoming_passive");
        assert!(FailoverStatus::Idle.is_idle());
    }
}
