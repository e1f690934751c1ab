//! ---
//! ha_section: "01-failover-core"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Failover decision core and role transitions."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use sol_ha_common::config::Hook;
use thiserror::Error;
use tracing::{debug, warn};

use crate::command::{run_command, CommandError};

/// A must-succeed pre hook failed; the surrounding transition aborts.
#[derive(Debug, Error)]
#[error("pre hook '{name}' failed")]
pub struct HookError {
    pub name: String,
    #[source]
    source: CommandError,
}

/// Executes ordered hook lists around role transitions.
#[derive(Debug, Clone, Copy)]
pub struct HookRunner {
    dry_run: bool,
}

impl HookRunner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Run pre hooks strictly in order. A failing `must_succeed` hook
    /// aborts; other failures are logged and skipped over.
    pub async fn run_pre(&self, hooks: &[Hook]) -> Result<(), HookError> {
        for hook in hooks {
            debug!(hook = %hook.name, "running pre hook");
            match run_command(&hook.command, &hook.args, self.dry_run).await {
                Ok(()) => {}
                Err(source) if hook.must_succeed => {
                    return Err(HookError {
                        name: hook.name.clone(),
                        source,
                    });
                }
                Err(err) => {
                    warn!(hook = %hook.name, error = %err, "pre hook failed; continuing");
                }
            }
        }
        Ok(())
    }

    /// Run post hooks best-effort, in order. Returns the failure count.
    pub async fn run_post(&self, hooks: &[Hook]) -> usize {
        let mut failures = 0;
        for hook in hooks {
            debug!(hook = %hook.name, "running post hook");
            if let Err(err) = run_command(&hook.command, &hook.args, self.dry_run).await {
                warn!(hook = %hook.name, error = %err, "post hook failed");
                failures += 1;
            }
        }
        failures
    }
}
