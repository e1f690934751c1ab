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

use super::ConfigError;

/// Ordered pre/post hook lists attached to a role command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hooks {
    #[serde(default)]
    pub pre: Vec<Hook>,
    #[serde(default)]
    pub post: Vec<Hook>,
}

/// A single operator-supplied hook command.
///
/// `must_succeed` is only legal on pre hooks: a failing must-succeed pre
/// hook aborts the surrounding role transition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hook {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub must_succeed: bool,
}

impl Hooks {
    pub fn validate(&self, section: &str) -> Result<(), ConfigError> {
        for (index, hook) in self.pre.iter().enumerate() {
            hook.validate(&format!("{section}.hooks.pre[{index}]"), true)?;
        }
        for (index, hook) in self.post.iter().enumerate() {
            hook.validate(&format!("{section}.hooks.post[{index}]"), false)?;
        }
        Ok(())
    }
}

impl Hook {
    pub fn validate(&self, field: &str, allow_must_succeed: bool) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{field}: must have a name")));
        }
        if self.command.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{field}: must have a command"
            )));
        }
        if self.must_succeed && !allow_must_succeed {
            return Err(ConfigError::Invalid(format!(
                "{field}: must_succeed is not allowed on post hooks"
            )));
        }
        Ok(())
    }
}
