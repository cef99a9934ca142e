use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use taf_git::badge::{self, BadgeOptions};
use taf_git::config::Config;
use taf_git::history::{self, MissingPolicy};
use taf_git::parser::{self, UnparsedOutput};
use taf_git::pipeline::{self, OutputSource, RunOptions};
use taf_git::TracingLogger;

#[derive(Parser)]
#[command(
    name = "taf-git",
    about = "Record test results from any CI into a .taf history file",
    version,
    long_about = None
)]
struct Cli {
    /// Working directory
    #[arg(long, global = true, default_value = ".")]
    cwd: PathBuf,

    /// Config file (default: $TAF_GIT_CONFIG or .taf-git.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// History file, relative to the working directory (default: .taf)
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tests (or read captured output) and append the result to .taf
    Run {
        /// Test command to run (default: npm test)
        #[arg(long)]
        command: Option<String>,

        /// Read test output from a file instead of running a command
        #[arg(long, conflicts_with = "command")]
        from_file: Option<PathBuf>,

        /// Commit the updated .taf file to git
        #[arg(long)]
        commit: bool,

        /// Commit message
        #[arg(long)]
        message: Option<String>,

        /// Provenance tag recorded with the run (default: detected CI platform)
        #[arg(long)]
        trigger: Option<String>,

        /// Create the .taf file if it does not exist
        #[arg(long)]
        create: bool,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Parse test output from a file (or stdin) and print the counts
    Parse {
        /// File containing test output; reads stdin when omitted
        file: Option<PathBuf>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Create an empty .taf history file
    Init {
        /// Project name (default: name of the working directory)
        #[arg(long)]
        project: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Render an SVG status badge from the latest recorded run
    Badge {
        /// Badge label
        #[arg(long)]
        label: Option<String>,

        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::resolve(&cli.cwd, cli.config.as_deref())?;
    let history_file = cli
        .history
        .clone()
        .unwrap_or_else(|| config.run.history_file.clone());

    match cli.command {
        Commands::Run {
            command,
            from_file,
            commit,
            message,
            trigger,
            create,
            json,
        } => {
            let source = match from_file {
                Some(path) => OutputSource::File(path),
                None => OutputSource::Command(command.unwrap_or(config.run.command)),
            };
            let commit_message = (commit || config.commit.enabled)
                .then(|| message.unwrap_or(config.commit.message));
            let missing = if create || config.run.create_missing {
                MissingPolicy::Create
            } else {
                MissingPolicy::RequireExisting
            };

            let options = RunOptions {
                source,
                cwd: cli.cwd,
                history_file,
                missing,
                trigger: trigger.or(config.run.trigger),
                commit_message,
                ci_outputs: config.run.ci_outputs,
                verbose: cli.verbose,
            };
            tracing::debug!(?options, "starting run");

            let report = pipeline::run(&options, &TracingLogger).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.success {
                if let Some(results) = &report.test_results {
                    println!("✅ Tests: {}/{} passing", results.passed, results.total);
                    println!("✅ Result: {}", results.verdict);
                }
                if report.history_updated {
                    println!("✅ .taf file updated");
                }
            } else {
                eprintln!(
                    "❌ Error: {}",
                    report.error.as_deref().unwrap_or("unknown error")
                );
                if let Some(results) = &report.test_results {
                    println!("Tests: {}/{} passing", results.passed, results.total);
                }
            }

            Ok(exit_code(report.success))
        }
        Commands::Parse { file, json } => {
            let output = read_input(file.as_deref())?;
            match parser::detect(&output) {
                Some(summary) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&summary)?);
                    } else {
                        let results = &summary.results;
                        println!("Format:  {}", summary.framework);
                        println!("Result:  {}", results.verdict);
                        println!("Total:   {}", results.total);
                        println!("Passed:  {}", results.passed);
                        println!("Failed:  {}", results.failed);
                        if let Some(skipped) = results.skipped {
                            println!("Skipped: {}", skipped);
                        }
                    }
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("❌ {}", UnparsedOutput::from_output(&output));
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Init { project, force } => {
            let path = cli.cwd.join(&history_file);
            let doc = history::init_history_file(&path, project.as_deref(), force)?;
            println!(
                "Created {} for project '{}'",
                path.display(),
                doc.project().unwrap_or_default()
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Badge { label, output } => {
            let options = BadgeOptions {
                history_path: cli.cwd.join(&history_file),
                label: label.unwrap_or(config.badge.label),
            };
            let badge = badge::generate_badge(&options)?;
            match output.or(config.badge.output) {
                Some(path) => {
                    let path = cli.cwd.join(path);
                    std::fs::write(&path, &badge.svg)
                        .with_context(|| format!("failed to write badge: {}", path.display()))?;
                    println!("Badge written to {} ({})", path.display(), badge.value);
                }
                None => println!("{}", badge.svg),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => taf_git::runner::read_captured_output(path),
        None => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .read_to_end(&mut bytes)
                .context("failed to read test output from stdin")?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
