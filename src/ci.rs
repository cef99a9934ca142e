//! CI platform binding: provenance detection and step outputs.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::parser::TestResults;

/// Environment markers checked in order; the first one present names the trigger.
const PLATFORMS: &[(&str, &str)] = &[
    ("GITHUB_ACTIONS", "github-actions"),
    ("GITLAB_CI", "gitlab-ci"),
    ("BITBUCKET_BUILD_NUMBER", "bitbucket-pipelines"),
    ("JENKINS_URL", "jenkins"),
    ("CIRCLECI", "circleci"),
];

const LOCAL_TRIGGER: &str = "local";

/// Trigger tag for the current environment.
pub fn detect_trigger() -> &'static str {
    trigger_from(|key| std::env::var(key).ok())
}

fn trigger_from(lookup: impl Fn(&str) -> Option<String>) -> &'static str {
    PLATFORMS
        .iter()
        .find(|(key, _)| lookup(key).is_some_and(|v| !v.is_empty()))
        .map(|(_, name)| *name)
        .unwrap_or(LOCAL_TRIGGER)
}

/// Publish results as GitHub Actions step outputs.
///
/// Returns `Ok(false)` without doing anything when `GITHUB_OUTPUT` is not set.
pub fn write_outputs(results: &TestResults, history_updated: bool) -> Result<bool> {
    match std::env::var_os("GITHUB_OUTPUT") {
        Some(path) if !path.is_empty() => {
            write_outputs_to(Path::new(&path), results, history_updated)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Append `key=value` output lines to `path`.
pub fn write_outputs_to(path: &Path, results: &TestResults, history_updated: bool) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open CI output file: {}", path.display()))?;

    let body = format!(
        "result={}\npassed={}\nfailed={}\ntotal={}\ntaf-updated={}\n",
        results.verdict, results.passed, results.failed, results.total, history_updated
    );
    file.write_all(body.as_bytes())
        .with_context(|| format!("failed to write CI outputs: {}", path.display()))?;
    debug!(path = %path.display(), "wrote CI outputs");
    Ok(())
}
