//! taf-git -- record CI test results into a `.taf` history file.
//!
//! The crate parses Jest / Vitest summary output into [`TestResults`],
//! appends a run entry to the YAML history document, and can render a status
//! badge from the latest entry. The [`pipeline`] module ties these together
//! with command execution, git and CI output binding.

pub mod badge;
pub mod ci;
pub mod config;
pub mod git;
pub mod history;
pub mod logger;
pub mod parser;
pub mod pipeline;
pub mod runner;

pub use history::{update_history_file, HistoryError, MissingPolicy, UpdateOptions};
pub use logger::{Logger, TracingLogger};
pub use parser::{parse_test_output, TestResults, Verdict};
pub use pipeline::{run, OutputSource, RunOptions, RunReport};
