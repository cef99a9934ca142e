//! Test command execution and captured-output loading.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// Combined output of a finished test command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// stdout followed by stderr, decoded lossily.
    pub output: String,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run `command` through the platform shell in `cwd`.
///
/// A non-zero exit status is not an error: failing tests are exactly what
/// gets recorded. Only a failure to launch the shell is.
pub async fn run_command(command: &str, cwd: &Path) -> Result<CommandOutput> {
    info!(%command, cwd = %cwd.display(), "running test command");

    let out = shell(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .await
        .with_context(|| format!("failed to launch test command `{command}`"))?;

    let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
    output.push_str(&String::from_utf8_lossy(&out.stderr));

    let exit_code = out.status.code();
    debug!(?exit_code, bytes = output.len(), "test command finished");

    Ok(CommandOutput { output, exit_code })
}

/// Read output captured to a file by an earlier pipeline step.
pub fn read_captured_output(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read captured output: {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(not(windows))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}
