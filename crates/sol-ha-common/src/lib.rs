//! ---
//! ha_section: "02-configuration-identity"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Configuration, identity, and shared runtime primitives."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
pub mod cache;
pub mod config;
pub mod identity;
pub mod logging;
pub mod public_ip;

pub use cache::{FailoverStatus, Health, Role, State, StateCache};
pub use identity::{IdentityError, IdentityPair, Keypair};
