//! End-to-end run: obtain output, parse it, record it, optionally commit.
//!
//! [`run`] never exits the process and never returns `Err`; every failure is
//! folded into the [`RunReport`] and the caller decides the exit code.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::ci;
use crate::git::{self, CommitOutcome};
use crate::history::{self, MissingPolicy, UpdateOptions, DEFAULT_HISTORY_FILE};
use crate::logger::Logger;
use crate::parser::{self, TestFramework, TestResults, UnparsedOutput};
use crate::runner;

/// Lines shown from the end of the output when no summary line is found.
const TAIL_LINES: usize = 10;

/// Where test output comes from.
#[derive(Debug, Clone)]
pub enum OutputSource {
    /// Run this shell command and capture stdout + stderr.
    Command(String),
    /// Read output a previous step already captured.
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub source: OutputSource,
    pub cwd: PathBuf,
    /// History file; relative paths are resolved against `cwd`.
    pub history_file: PathBuf,
    pub missing: MissingPolicy,
    /// Provenance tag; detected from the environment when `None`.
    pub trigger: Option<String>,
    /// Commit message. `None` disables the commit step.
    pub commit_message: Option<String>,
    pub ci_outputs: bool,
    pub verbose: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            source: OutputSource::Command("npm test".to_string()),
            cwd: PathBuf::from("."),
            history_file: PathBuf::from(DEFAULT_HISTORY_FILE),
            missing: MissingPolicy::RequireExisting,
            trigger: None,
            commit_message: None,
            ci_outputs: false,
            verbose: false,
        }
    }
}

impl RunOptions {
    pub fn history_path(&self) -> PathBuf {
        resolve(&self.cwd, &self.history_file)
    }
}

/// Structured outcome of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<TestFramework>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_results: Option<TestResults>,
    pub history_updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitOutcome>,
    /// Exit code of the test command, when one was run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

pub async fn run(options: &RunOptions, logger: &dyn Logger) -> RunReport {
    let mut report = RunReport::default();

    let (output, command) = match &options.source {
        OutputSource::Command(command) => {
            if options.verbose {
                logger.log(&format!("Running test command: {command}"));
            }
            match runner::run_command(command, &options.cwd).await {
                Ok(out) => {
                    report.exit_code = out.exit_code;
                    if options.verbose {
                        logger.log(&format!("Test command exit code: {:?}", out.exit_code));
                    }
                    (out.output, Some(command.clone()))
                }
                Err(e) => return report.failed(format!("{e:#}")),
            }
        }
        OutputSource::File(path) => {
            let path = resolve(&options.cwd, path);
            if options.verbose {
                logger.log(&format!("Reading test output from {}", path.display()));
            }
            match runner::read_captured_output(&path) {
                Ok(text) => (text, None),
                Err(e) => return report.failed(format!("{e:#}")),
            }
        }
    };

    if options.verbose {
        describe_output(&output, logger);
    }

    let Some(summary) = parser::detect(&output) else {
        let unparsed = UnparsedOutput::from_output(&output);
        if options.verbose {
            logger.log(&format!("Output sample (first 500 chars): {}", unparsed.head));
            logger.log(&format!("Output sample (last 500 chars): {}", unparsed.tail));
        }
        return report.failed(unparsed.to_string());
    };

    let results = summary.results;
    report.framework = Some(summary.framework);
    report.test_results = Some(results.clone());
    if options.verbose {
        logger.log(&format!(
            "Parsed {} results: {}/{} tests passing",
            summary.framework, results.passed, results.total
        ));
    }

    let history_path = options.history_path();
    report.history_path = Some(history_path.clone());

    let update = UpdateOptions {
        trigger: Some(
            options
                .trigger
                .clone()
                .unwrap_or_else(|| ci::detect_trigger().to_string()),
        ),
        command,
        missing: options.missing,
    };

    let outcome = history::update_history_file(&history_path, &results, &update);
    report.history_updated = outcome.is_ok();
    if options.ci_outputs {
        publish_outputs(&results, report.history_updated);
    }

    match outcome {
        Ok(update) => {
            if options.verbose {
                logger.log(&format!(
                    "History file updated ({} runs recorded)",
                    update.runs
                ));
            }
        }
        Err(e @ history::HistoryError::NotFound { .. }) => {
            return report.failed(e.to_string());
        }
        Err(e) => {
            return report.failed(format!("history file was not updated: {e}"));
        }
    }

    if let Some(message) = &options.commit_message {
        match git::commit_history_file(&options.cwd, &history_path, message, logger).await {
            Ok(outcome) => {
                if options.verbose && outcome != CommitOutcome::NothingToCommit {
                    logger.log("Changes committed to git");
                }
                report.commit = Some(outcome);
            }
            Err(e) => return report.failed(format!("failed to commit history file: {e:#}")),
        }
    }

    report.success = true;
    report
}

fn resolve(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn publish_outputs(results: &TestResults, history_updated: bool) {
    if let Err(e) = ci::write_outputs(results, history_updated) {
        warn!(error = %e, "could not write CI outputs");
    }
}

fn describe_output(output: &str, logger: &dyn Logger) {
    let lines: Vec<&str> = output.lines().collect();
    logger.log(&format!(
        "Captured output: {} bytes, {} lines",
        output.len(),
        lines.len()
    ));
    match parser::summary_line(output) {
        Some(line) => logger.log(&format!("Summary line: \"{line}\"")),
        None => {
            logger.log(&format!("No summary line; last {TAIL_LINES} lines of output:"));
            for (i, line) in lines.iter().rev().take(TAIL_LINES).rev().enumerate() {
                let line: String = line.chars().take(100).collect();
                logger.log(&format!("  {i}: {line}"));
            }
        }
    }
}
