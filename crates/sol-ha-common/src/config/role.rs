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

use super::{ConfigError, Hooks};

/// Command, arguments, and hooks for driving the validator into one role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub hooks: Hooks,
}

/// The closed set of variables available to role-command and hook
/// templates, rendered once at startup.
#[derive(Debug, Clone, Default)]
pub struct TemplateData {
    pub active_identity_keypair_file: String,
    pub active_identity_pubkey: String,
    pub passive_identity_keypair_file: String,
    pub passive_identity_pubkey: String,
}

impl TemplateData {
    fn substitutions(&self) -> [(&'static str, &str); 4] {
        [
            (
                "ActiveIdentityKeypairFile",
                &self.active_identity_keypair_file,
            ),
            ("ActiveIdentityPubkey", &self.active_identity_pubkey),
            (
                "PassiveIdentityKeypairFile",
                &self.passive_identity_keypair_file,
            ),
            ("PassiveIdentityPubkey", &self.passive_identity_pubkey),
        ]
    }
}

impl RoleConfig {
    pub fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.command.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{section}.command must be defined"
            )));
        }
        self.hooks.validate(section)?;
        Ok(())
    }

    /// Expand `{{Variable}}` placeholders in the role command, its args,
    /// and every hook command/arg. A placeholder outside the fixed set is
    /// a startup error.
    pub fn render_templates(
        &mut self,
        section: &str,
        data: &TemplateData,
    ) -> Result<(), ConfigError> {
        self.command = render_template(&format!("{section}.command"), &self.command, data)?;
        for (index, arg) in self.args.iter_mut().enumerate() {
            *arg = render_template(&format!("{section}.args[{index}]"), arg, data)?;
        }
        for (index, hook) in self.hooks.pre.iter_mut().enumerate() {
            let field = format!("{section}.hooks.pre[{index}]");
            hook.command = render_template(&field, &hook.command, data)?;
            for arg in hook.args.iter_mut() {
                *arg = render_template(&field, arg, data)?;
            }
        }
        for (index, hook) in self.hooks.post.iter_mut().enumerate() {
            let field = format!("{section}.hooks.post[{index}]");
            hook.command = render_template(&field, &hook.command, data)?;
            for arg in hook.args.iter_mut() {
                *arg = render_template(&field, arg, data)?;
            }
        }
        Ok(())
    }
}

fn render_template(field: &str, input: &str, data: &TemplateData) -> Result<String, ConfigError> {
    let mut rendered = input.to_owned();
    for (name, value) in data.substitutions() {
        rendered = rendered.replace(&format!("{{{{{name}}}}}"), value);
    }
    if let Some(start) = rendered.find("{{") {
        let rest = &rendered[start + 2..];
        let variable = rest.split("}}").next().unwrap_or(rest).trim().to_owned();
        return Err(ConfigError::Template {
            field: field.to_owned(),
            variable,
        });
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Hook;

    fn data() -> TemplateData {
        TemplateData {
            active_identity_keypair_file: "/keys/active.json".into(),
            active_identity_pubkey: "active-pubkey".into(),
            passive_identity_keypair_file: "/keys/passive.json".into(),
            passive_identity_pubkey: "passive-pubkey".into(),
        }
    }

    #[test]
    fn renders_command_args_and_hooks() {
        let mut role = RoleConfig {
            command: "agave-validator".into(),
            args: vec![
                "set-identity".into(),
                "{{ActiveIdentityKeypairFile}}".into(),
            ],
            hooks: Hooks {
                pre: vec![Hook {
                    name: "announce".into(),
                    command: "echo".into(),
                    args: vec!["{{PassiveIdentityPubkey}}".into()],
                    must_succeed: false,
                }],
                post: vec![Hook {
                    name: "cleanup".into(),
                    command: "rm".into(),
                    args: vec!["{{PassiveIdentityKeypairFile}}.lock".into()],
                    must_succeed: false,
                }],
            },
        };

        role.render_templates("failover.active", &data()).unwrap();
        assert_eq!(role.args[1], "/keys/active.json");
        assert_eq!(role.hooks.pre[0].args[0], "passive-pubkey");
        assert_eq!(role.hooks.post[0].args[0], "/keys/passive.json.lock");
    }

    #[test]
    fn rendering_is_idempotent_on_plain_strings() {
        let mut role = RoleConfig {
            command: "systemctl".into(),
            args: vec!["restart".into(), "solana".into()],
            hooks: Hooks::default(),
        };
        role.render_templates("failover.passive", &data()).unwrap();
        assert_eq!(role.command, "systemctl");
        assert_eq!(role.args, vec!["restart", "solana"]);
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let mut role = RoleConfig {
            command: "echo {{ActiveValidatorHostname}}".into(),
            args: Vec::new(),
            hooks: Hooks::default(),
        };
        let err = role
            .render_templates("failover.active", &data())
            .unwrap_err();
        match err {
            ConfigError::Template { field, variable } => {
                assert_eq!(field, "failover.active.command");
                assert_eq!(variable, "ActiveValidatorHostname");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
