//! ---
//! ha_section: "01-failover-core"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Failover decision core and role transitions."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
pub mod command;
pub mod controller;
pub mod hooks;
pub mod local;
pub mod transition;

pub use controller::{ControllerOptions, FailoverController};
pub use hooks::HookRunner;
pub use local::{LocalValidator, RpcLocalValidator};
pub use transition::{DesiredRole, RoleTransition, TransitionError, TransitionOutcome};
