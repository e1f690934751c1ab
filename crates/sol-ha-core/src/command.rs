//! ---
//! ha_section: "01-failover-core"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Failover decision core and role transitions."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Errors from operator-supplied commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn '{program}'")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{program}' exited with {status}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
    },
}

/// Run an operator command and wait for it to exit, capturing its output.
///
/// Commands are trusted operator scripts and carry no timeout. The argv is
/// executed directly, without a shell. In dry-run mode the invocation is
/// logged and reported successful without executing anything.
pub async fn run_command(
    program: &str,
    args: &[String],
    dry_run: bool,
) -> Result<(), CommandError> {
    if dry_run {
        info!(command = %program, args = ?args, "dry-run: skipping command execution");
        return Ok(());
    }

    debug!(command = %program, args = ?args, "running command");
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|source| CommandError::Spawn {
            program: program.to_owned(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if output.status.success() {
        debug!(
            command = %program,
            stdout = %stdout.trim(),
            stderr = %stderr.trim(),
            "command succeeded"
        );
        Ok(())
    } else {
        error!(
            command = %program,
            status = %output.status,
            stdout = %stdout.trim(),
            stderr = %stderr.trim(),
            "command failed"
        );
        Err(CommandError::Failed {
            program: program.to_owned(),
            status: output.status,
        })
    }
}
