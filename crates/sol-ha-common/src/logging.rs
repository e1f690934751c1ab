//! ---
//! ha_section: "02-configuration-identity"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Configuration, identity, and shared runtime primitives."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_ENV: &str = "SOLANA_VALIDATOR_HA_LOG";

/// Initialize the tracing subscriber.
///
/// `default_directive` comes from the CLI `--log-level` flag. The custom
/// `SOLANA_VALIDATOR_HA_LOG` directive is honoured first, then the
/// standard `RUST_LOG` variable, then the flag.
pub fn init_tracing(default_directive: &str) {
    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(directive).unwrap_or_else(|err| {
            eprintln!("invalid {LOG_ENV} directive ({err}); falling back to {default_directive}");
            EnvFilter::new(default_directive)
        }),
        Err(_) => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive)),
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .ok();
}
