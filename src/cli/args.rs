//! Command line argument parsing
//!
//! Subcommands:
//! - `run`: Execute a task file (auto-detects TOML task file or task list)
//! - `show-config`: Show configuration discovery information

use super::tasks::TaskInput;
use crate::executor::ExecutorConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Run(RunConfig),
    ShowConfig { config_override: Option<PathBuf> },
}

#[derive(Debug)]
pub struct RunConfig {
    pub task_input: TaskInput,
    pub config_override: Option<PathBuf>,
    pub overrides: ConfigOverrides,
    pub report: Option<PathBuf>,
    pub events: Option<PathBuf>,
    pub verbose: bool,
    pub dry_run: bool,
}

/// Executor settings given on the command line; they win over every file
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigOverrides {
    pub max_concurrency: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub retry_attempts: Option<u32>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut ExecutorConfig) {
        if let Some(max_concurrency) = self.max_concurrency {
            config.max_concurrency = max_concurrency;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(retry_attempts) = self.retry_attempts {
            config.retry_attempts = retry_attempts;
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "taskgate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Run local tasks with bounded concurrency, rate limiting, timeouts and retries"
)]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Execute a task file (.toml task file, or .md/.txt list of shell commands)
    Run {
        /// Path to the task file
        file: PathBuf,
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Initial concurrency ceiling
        #[arg(long = "max-concurrency", value_name = "N")]
        max_concurrency: Option<usize>,
        /// Per-attempt timeout in milliseconds
        #[arg(long = "timeout-ms", value_name = "MS")]
        timeout_ms: Option<u64>,
        /// Total attempts per task, including the first
        #[arg(long = "retry-attempts", value_name = "N")]
        retry_attempts: Option<u32>,
        /// Write the run report as JSON
        #[arg(long = "report", value_name = "FILE")]
        report: Option<PathBuf>,
        /// Append one JSON line per settled task
        #[arg(long = "events", value_name = "FILE")]
        events: Option<PathBuf>,
        /// Enable verbose output
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
        /// Show what would be executed without running
        #[arg(short = 'n', long = "dry-run")]
        dry_run: bool,
    },
    /// Show configuration discovery information
    ShowConfig {
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Run {
                file,
                config,
                max_concurrency,
                timeout_ms,
                retry_attempts,
                report,
                events,
                verbose,
                dry_run,
            }) => Ok(ExecutionMode::Run(RunConfig {
                task_input: Self::detect_file_type(file),
                config_override: config.clone(),
                overrides: ConfigOverrides {
                    max_concurrency: *max_concurrency,
                    timeout_ms: *timeout_ms,
                    retry_attempts: *retry_attempts,
                },
                report: report.clone(),
                events: events.clone(),
                verbose: *verbose,
                dry_run: *dry_run,
            })),
            Some(Commands::ShowConfig { config }) => Ok(ExecutionMode::ShowConfig {
                config_override: config.clone(),
            }),
            None => Err(
                "No command specified. Use 'taskgate --help' to see available commands."
                    .to_string(),
            ),
        }
    }

    /// Auto-detect the input format from the extension (case-insensitive):
    /// `.toml` is a task file, anything else a task list
    fn detect_file_type(path: &std::path::Path) -> TaskInput {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "toml" => TaskInput::TaskFile(path.to_path_buf()),
            _ => TaskInput::TaskList(path.to_path_buf()),
        }
    }
}
