//! CLI-specific functionality
//!
//! This module contains all CLI-related code including argument parsing,
//! task input handling, and configuration discovery.

pub mod args;
pub mod config;
pub mod tasks;

pub use args::{Args, ConfigOverrides, ExecutionMode, RunConfig};
pub use config::{ConfigDiscovery, ConfigError, ConfigSource, TaskgateConfig};
pub use tasks::{FileError, LoadedTasks, SimpleTask, TaskInput, TaskLoader};
