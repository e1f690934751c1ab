//! ---
//! ha_section: "01-failover-core"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Failover decision core and role transitions."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use std::sync::Arc;

use sol_ha_common::config::RoleConfig;
use sol_ha_common::{FailoverStatus, Role, StateCache};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::command::{run_command, CommandError};
use crate::hooks::{HookError, HookRunner};
use crate::local::LocalValidator;

/// Target of a role transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredRole {
    Active,
    Passive,
}

impl DesiredRole {
    pub fn target_role(&self) -> Role {
        match self {
            DesiredRole::Active => Role::Active,
            DesiredRole::Passive => Role::Passive,
        }
    }

    fn becoming_status(&self) -> FailoverStatus {
        match self {
            DesiredRole::Active => FailoverStatus::BecomingActive,
            DesiredRole::Passive => FailoverStatus::BecomingPassive,
        }
    }
}

impl std::fmt::Display for DesiredRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.target_role().as_str())
    }
}

/// Why a transition did not complete. All of these are retried on the next
/// controller tick; none terminates the supervisor.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("local validator is unhealthy; deferring transition to {desired}")]
    Unhealthy { desired: DesiredRole },
    #[error(transparent)]
    PreHook(#[from] HookError),
    #[error("{desired} role command failed")]
    Command {
        desired: DesiredRole,
        #[source]
        source: CommandError,
    },
    #[error("local validator still reports '{observed}' after the {desired} command")]
    VerifyFailed { desired: DesiredRole, observed: Role },
}

/// How an [`ensure`](RoleTransition::ensure) call concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Completed,
    AlreadyInRole,
}

/// Drives the local validator into a desired role: pre hooks, role
/// command, verification, post hooks.
pub struct RoleTransition {
    local: Arc<dyn LocalValidator>,
    cache: Arc<StateCache>,
    hooks: HookRunner,
    active: RoleConfig,
    passive: RoleConfig,
    dry_run: bool,
}

impl RoleTransition {
    pub fn new(
        local: Arc<dyn LocalValidator>,
        cache: Arc<StateCache>,
        active: RoleConfig,
        passive: RoleConfig,
        dry_run: bool,
    ) -> Self {
        Self {
            local,
            cache,
            hooks: HookRunner::new(dry_run),
            active,
            passive,
            dry_run,
        }
    }

    /// Idempotently drive the validator to `desired`.
    ///
    /// The cache's failover status is set on entry and reset to idle on
    /// every exit path, so observers only ever see
    /// `idle -> becoming_* -> idle`.
    pub async fn ensure(&self, desired: DesiredRole) -> Result<TransitionOutcome, TransitionError> {
        self.cache.set_failover_status(desired.becoming_status());
        let result = self.drive(desired).await;
        self.cache.set_failover_status(FailoverStatus::Idle);
        if let Ok(TransitionOutcome::Completed) = &result {
            info!(role = %desired, "role transition complete");
        }
        result
    }

    async fn drive(&self, desired: DesiredRole) -> Result<TransitionOutcome, TransitionError> {
        let config = match desired {
            DesiredRole::Active => &self.active,
            DesiredRole::Passive => &self.passive,
        };

        if !self.local.is_healthy().await {
            return Err(TransitionError::Unhealthy { desired });
        }

        let current = self.local.current_role().await;
        if current == desired.target_role() {
            debug!(role = %desired, "already in desired role");
            return Ok(TransitionOutcome::AlreadyInRole);
        }

        self.hooks.run_pre(&config.hooks.pre).await?;

        run_command(&config.command, &config.args, self.dry_run)
            .await
            .map_err(|source| TransitionError::Command { desired, source })?;

        let observed = self.local.current_role().await;
        if observed != desired.target_role() {
            // For the passive direction the operator command script owns
            // any service-level escalation; the supervisor just retries.
            return Err(TransitionError::VerifyFailed { desired, observed });
        }

        let failures = self.hooks.run_post(&config.hooks.post).await;
        if failures > 0 {
            warn!(role = %desired, failures, "post hooks reported failures");
        }
        Ok(TransitionOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sol_ha_common::config::{Hook, Hooks};
    use std::collections::VecDeque;
    use std::io::Read;

    /// Scripted local validator: pops one role per `current_role` call and
    /// keeps returning the last one once the script is exhausted.
    struct ScriptedLocal {
        healthy: bool,
        roles: Mutex<VecDeque<Role>>,
    }

    impl ScriptedLocal {
        fn new(healthy: bool, roles: &[Role]) -> Arc<Self> {
            Arc::new(Self {
                healthy,
                roles: Mutex::new(roles.iter().copied().collect()),
            })
        }
    }

    #[async_trait]
    impl LocalValidator for ScriptedLocal {
        async fn current_role(&self) -> Role {
            let mut roles = self.roles.lock();
            if roles.len() > 1 {
                roles.pop_front().unwrap_or_default()
            } else {
                roles.front().copied().unwrap_or_default()
            }
        }

        async fn is_healthy(&self) -> bool {
            self.healthy
        }
    }

    fn counting_hook(name: &str, path: &std::path::Path) -> Hook {
        Hook {
            name: name.to_owned(),
            command: "sh".to_owned(),
            args: vec![
                "-c".to_owned(),
                format!("echo {name} >> {}", path.display()),
            ],
            must_succeed: false,
        }
    }

    fn line_count(path: &std::path::Path) -> usize {
        let mut contents = String::new();
        match std::fs::File::open(path) {
            Ok(mut file) => {
                file.read_to_string(&mut contents).unwrap();
                contents.lines().count()
            }
            Err(_) => 0,
        }
    }

    fn role_config(hooks: Hooks) -> RoleConfig {
        RoleConfig {
            command: "true".into(),
            args: Vec::new(),
            hooks,
        }
    }

    fn transition(
        local: Arc<dyn LocalValidator>,
        active: RoleConfig,
        passive: RoleConfig,
    ) -> (RoleTransition, Arc<StateCache>) {
        let cache = Arc::new(StateCache::new());
        let transition = RoleTransition::new(local, cache.clone(), active, passive, false);
        (transition, cache)
    }

    #[tokio::test]
    async fn completes_an_active_transition() {
        let marker = tempfile::NamedTempFile::new().unwrap();
        let hooks = Hooks {
            pre: vec![counting_hook("pre", marker.path())],
            post: vec![counting_hook("post", marker.path())],
        };
        let local = ScriptedLocal::new(true, &[Role::Passive, Role::Active]);
        let (transition, cache) = transition(local, role_config(hooks), role_config(Hooks::default()));

        let outcome = transition.ensure(DesiredRole::Active).await.unwrap();
        assert_eq!(outcome, TransitionOutcome::Completed);
        assert_eq!(line_count(marker.path()), 2);
        assert!(cache.read().failover_status.is_idle());
    }

    #[tokio::test]
    async fn second_ensure_short_circuits_without_hooks() {
        let marker = tempfile::NamedTempFile::new().unwrap();
        let hooks = Hooks {
            pre: vec![counting_hook("pre", marker.path())],
            post: vec![counting_hook("post", marker.path())],
        };
        let local = ScriptedLocal::new(true, &[Role::Passive, Role::Active]);
        let (transition, _cache) =
            transition(local, role_config(hooks), role_config(Hooks::default()));

        transition.ensure(DesiredRole::Active).await.unwrap();
        let outcome = transition.ensure(DesiredRole::Active).await.unwrap();
        assert_eq!(outcome, TransitionOutcome::AlreadyInRole);
        // pre + post from the first call only
        assert_eq!(line_count(marker.path()), 2);
    }

    #[tokio::test]
    async fn unhealthy_validator_defers_the_transition() {
        let local = ScriptedLocal::new(false, &[Role::Passive]);
        let (transition, cache) = transition(
            local,
            role_config(Hooks::default()),
            role_config(Hooks::default()),
        );

        let err = transition.ensure(DesiredRole::Active).await.unwrap_err();
        assert!(matches!(err, TransitionError::Unhealthy { .. }));
        assert!(cache.read().failover_status.is_idle());
    }

    #[tokio::test]
    async fn must_succeed_pre_hook_failure_aborts_before_the_command() {
        let marker = tempfile::NamedTempFile::new().unwrap();
        let hooks = Hooks {
            pre: vec![Hook {
                name: "guard".into(),
                command: "false".into(),
                args: Vec::new(),
                must_succeed: true,
            }],
            post: vec![counting_hook("post", marker.path())],
        };
        let mut active = role_config(hooks);
        active.command = "sh".into();
        active.args = vec![
            "-c".into(),
            format!("echo command >> {}", marker.path().display()),
        ];
        let local = ScriptedLocal::new(true, &[Role::Passive, Role::Active]);
        let (transition, _cache) = transition(local, active, role_config(Hooks::default()));

        let err = transition.ensure(DesiredRole::Active).await.unwrap_err();
        assert!(matches!(err, TransitionError::PreHook(_)));
        assert_eq!(line_count(marker.path()), 0);
    }

    #[tokio::test]
    async fn failed_role_command_skips_post_hooks() {
        let marker = tempfile::NamedTempFile::new().unwrap();
        let hooks = Hooks {
            pre: Vec::new(),
            post: vec![counting_hook("post", marker.path())],
        };
        let mut active = role_config(hooks);
        active.command = "false".into();
        let local = ScriptedLocal::new(true, &[Role::Passive, Role::Active]);
        let (transition, _cache) = transition(local, active, role_config(Hooks::default()));

        let err = transition.ensure(DesiredRole::Active).await.unwrap_err();
        assert!(matches!(err, TransitionError::Command { .. }));
        assert_eq!(line_count(marker.path()), 0);
    }

    #[tokio::test]
    async fn verification_failure_skips_post_hooks() {
        let marker = tempfile::NamedTempFile::new().unwrap();
        let hooks = Hooks {
            pre: Vec::new(),
            post: vec![counting_hook("post", marker.path())],
        };
        // The command runs but the validator keeps reporting passive.
        let local = ScriptedLocal::new(true, &[Role::Passive, Role::Passive]);
        let (transition, cache) = transition(local, role_config(hooks), role_config(Hooks::default()));

        let err = transition.ensure(DesiredRole::Active).await.unwrap_err();
        match err {
            TransitionError::VerifyFailed { observed, .. } => {
                assert_eq!(observed, Role::Passive)
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(line_count(marker.path()), 0);
        assert!(cache.read().failover_status.is_idle());
    }

    #[tokio::test]
    async fn passive_transition_uses_the_passive_config() {
        let marker = tempfile::NamedTempFile::new().unwrap();
        let mut passive = role_config(Hooks::default());
        passive.command = "sh".into();
        passive.args = vec![
            "-c".into(),
            format!("echo passive >> {}", marker.path().display()),
        ];
        let local = ScriptedLocal::new(true, &[Role::Active, Role::Passive]);
        let (transition, _cache) = transition(local, role_config(Hooks::default()), passive);

        let outcome = transition.ensure(DesiredRole::Passive).await.unwrap();
        assert_eq!(outcome, TransitionOutcome::Completed);
        assert_eq!(line_count(marker.path()), 1);
    }
}
