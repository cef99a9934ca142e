//! Commit the updated history file to git.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::logger::Logger;

pub const DEFAULT_COMMIT_MESSAGE: &str = "chore: update .taf with test results";

const BOT_NAME: &str = "taf-git[bot]";
const BOT_EMAIL: &str = "taf-git[bot]@users.noreply.github.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOutcome {
    Pushed,
    /// Committed locally; `git push` failed (common on detached CI checkouts).
    CommittedNotPushed,
    NothingToCommit,
}

/// Stage `file`, commit it if it changed, and try to push.
///
/// The bot identity is passed per command (`git -c user.name=...`) rather than
/// written to any git config.
pub async fn commit_history_file(
    cwd: &Path,
    file: &Path,
    message: &str,
    logger: &dyn Logger,
) -> Result<CommitOutcome> {
    let file_arg = file.to_string_lossy();

    git(cwd, &["add", "--", &file_arg]).await?;

    let staged = git(cwd, &["diff", "--cached", "--name-only", "--", &file_arg]).await?;
    if staged.trim().is_empty() {
        logger.log("No changes to commit");
        return Ok(CommitOutcome::NothingToCommit);
    }

    let name = format!("user.name={BOT_NAME}");
    let email = format!("user.email={BOT_EMAIL}");
    git(cwd, &["-c", &name, "-c", &email, "commit", "-m", message]).await?;

    match git(cwd, &["push"]).await {
        Ok(_) => Ok(CommitOutcome::Pushed),
        Err(e) => {
            warn!(error = %e, "git push failed");
            logger.log("Could not push changes (this is ok in some CI environments)");
            Ok(CommitOutcome::CommittedNotPushed)
        }
    }
}

/// Run git and return its stdout; non-zero exit is an error carrying stderr.
async fn git(cwd: &Path, args: &[&str]) -> Result<String> {
    debug!(?args, "git");
    let out = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .context("failed to launch git")?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}
