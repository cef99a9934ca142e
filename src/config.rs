//! TOML configuration (`.taf-git.toml`).
//!
//! Lookup order: an explicit `--config` path, then the `TAF_GIT_CONFIG`
//! environment variable, then `.taf-git.toml` in the working directory, then
//! compiled-in defaults. Command-line flags override whatever is loaded here.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::badge::DEFAULT_LABEL;
use crate::git::DEFAULT_COMMIT_MESSAGE;
use crate::history::DEFAULT_HISTORY_FILE;

pub const CONFIG_FILE_NAME: &str = ".taf-git.toml";
pub const CONFIG_ENV: &str = "TAF_GIT_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub commit: CommitConfig,
    #[serde(default)]
    pub badge: BadgeConfig,
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve configuration for a run in `cwd`.
    ///
    /// An explicit path must load; the environment and default locations fall
    /// back to defaults with a warning when the file is broken.
    pub fn resolve(cwd: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Some(env_path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            let path = PathBuf::from(env_path);
            match Self::load(&path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "{CONFIG_ENV} set but file could not be loaded, trying fallback"
                ),
            }
        }

        let local = cwd.join(CONFIG_FILE_NAME);
        if local.exists() {
            match Self::load(&local) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => warn!(
                    path = %local.display(),
                    error = %e,
                    "config file exists but could not be loaded, using defaults"
                ),
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }
}

/// `[run]`: how test output is obtained and recorded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Shell command that runs the test suite.
    pub command: String,
    /// History file, relative to the working directory.
    pub history_file: PathBuf,
    /// Provenance tag; detected from the CI environment when unset.
    pub trigger: Option<String>,
    /// Create the history file when missing instead of failing.
    pub create_missing: bool,
    /// Append GitHub Actions step outputs when `GITHUB_OUTPUT` is set.
    pub ci_outputs: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            command: "npm test".to_string(),
            history_file: PathBuf::from(DEFAULT_HISTORY_FILE),
            trigger: None,
            create_missing: false,
            ci_outputs: true,
        }
    }
}

/// `[commit]`: whether and how to commit the updated history file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CommitConfig {
    pub enabled: bool,
    pub message: String,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            message: DEFAULT_COMMIT_MESSAGE.to_string(),
        }
    }
}

/// `[badge]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BadgeConfig {
    pub label: String,
    /// Where to write the SVG; stdout when unset.
    pub output: Option<PathBuf>,
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            output: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
[run]
command = "npx vitest run"

[commit]
enabled = true
"#,
        )
        .unwrap();
        assert_eq!(config.run.command, "npx vitest run");
        assert_eq!(config.run.history_file, PathBuf::from(".taf"));
        assert!(!config.run.create_missing);
        assert!(config.commit.enabled);
        assert_eq!(config.commit.message, DEFAULT_COMMIT_MESSAGE);
        assert_eq!(config.badge.label, "TAF");
    }

    #[test]
    fn test_resolve_prefers_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[run]\ncommand = \"local\"\n").unwrap();
        let explicit = dir.path().join("other.toml");
        std::fs::write(&explicit, "[run]\ncommand = \"explicit\"\n").unwrap();

        let config = Config::resolve(dir.path(), Some(&explicit)).unwrap();
        assert_eq!(config.run.command, "explicit");
    }

    #[test]
    fn test_explicit_path_must_load() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::resolve(dir.path(), Some(&missing)).is_err());
    }

    #[test]
    fn test_broken_local_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[run\n").unwrap();
        // Only meaningful when the environment does not point elsewhere.
        if std::env::var_os(CONFIG_ENV).is_none() {
            let config = Config::resolve(dir.path(), None).unwrap();
            assert_eq!(config, Config::default());
        }
    }
}
