//! History reconciliation: append run entries to the `.taf` file on disk.
//!
//! Every update is a fresh load, mutate and store cycle; nothing is cached
//! between calls. There is no locking, so two processes updating the same
//! file at once can lose one of the appended entries.

pub mod document;
pub mod entry;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::parser::TestResults;

pub use document::{isolate_first_document, HistoryDocument, FORMAT_VERSION};
pub use entry::{format_timestamp, RunEntry, TestCounts};

/// Default history file name, relative to the project root.
pub const DEFAULT_HISTORY_FILE: &str = ".taf";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("no history file found at {path}; run `taf-git init` to create one")]
    NotFound { path: PathBuf },

    #[error("history file already exists at {path}")]
    AlreadyExists { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid history file: {0}")]
    Parse(#[source] serde_yaml::Error),

    #[error("invalid history file: not a YAML mapping")]
    NotAMapping,

    #[error("invalid history file: missing or invalid test_history")]
    MissingHistory,

    #[error("failed to serialize history: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What to do when the history file does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Create a new document named after the parent directory.
    #[default]
    Create,
    /// Fail with [`HistoryError::NotFound`].
    RequireExisting,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub trigger: Option<String>,
    pub command: Option<String>,
    pub missing: MissingPolicy,
}

/// Outcome of a successful update.
#[derive(Debug, Clone)]
pub struct HistoryUpdate {
    pub path: PathBuf,
    /// The file did not exist and was created by this update.
    pub created: bool,
    /// Number of entries in `test_history` after the append.
    pub runs: usize,
    pub entry: RunEntry,
}

/// Append `results` to the history file at `path`.
pub fn update_history_file(
    path: &Path,
    results: &TestResults,
    options: &UpdateOptions,
) -> Result<HistoryUpdate, HistoryError> {
    update_history_file_at(path, results, options, Utc::now())
}

/// [`update_history_file`] with an explicit clock reading.
pub fn update_history_file_at(
    path: &Path,
    results: &TestResults,
    options: &UpdateOptions,
    now: DateTime<Utc>,
) -> Result<HistoryUpdate, HistoryError> {
    let (mut doc, created) = match load(path)? {
        Some(doc) => (doc, false),
        None => match options.missing {
            MissingPolicy::Create => {
                let project = project_name_for(path);
                debug!(path = %path.display(), %project, "creating new history document");
                (HistoryDocument::new(&project, now), true)
            }
            MissingPolicy::RequireExisting => {
                return Err(HistoryError::NotFound {
                    path: path.to_path_buf(),
                })
            }
        },
    };

    let entry = RunEntry::new(results, now)
        .with_trigger(options.trigger.clone())
        .with_command(options.command.clone());
    doc.append_run(&entry)?;
    doc.touch(now);

    let yaml = doc.to_yaml()?;
    write_replacing(path, &yaml)?;

    let runs = doc.runs().len();
    info!(
        path = %path.display(),
        runs,
        created,
        result = %entry.result,
        "history file updated"
    );

    Ok(HistoryUpdate {
        path: path.to_path_buf(),
        created,
        runs,
        entry,
    })
}

/// Boolean form of [`update_history_file`]: logs the failure and returns `false`.
pub fn try_update_history_file(path: &Path, results: &TestResults, options: &UpdateOptions) -> bool {
    match update_history_file(path, results, options) {
        Ok(_) => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "history file was not updated");
            false
        }
    }
}

/// Read and validate the history file. `Ok(None)` if it does not exist.
pub fn load(path: &Path) -> Result<Option<HistoryDocument>, HistoryError> {
    match fs::read_to_string(path) {
        Ok(content) => HistoryDocument::parse(&content).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(HistoryError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write an empty history document to `path`.
pub fn init_history_file(
    path: &Path,
    project: Option<&str>,
    overwrite: bool,
) -> Result<HistoryDocument, HistoryError> {
    if !overwrite && path.exists() {
        return Err(HistoryError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    let project = project
        .map(str::to_string)
        .unwrap_or_else(|| project_name_for(path));
    let doc = HistoryDocument::new(&project, Utc::now());
    write_replacing(path, &doc.to_yaml()?)?;
    info!(path = %path.display(), %project, "history file initialized");
    Ok(doc)
}

/// Name of the directory that contains `path`.
pub fn project_name_for(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    absolute
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| "project".to_string())
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
fn write_replacing(path: &Path, contents: &str) -> Result<(), HistoryError> {
    let write_err = |source| HistoryError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_HISTORY_FILE.to_string());
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    if let Err(e) = fs::write(&tmp, contents).and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(e));
    }
    Ok(())
}
