//! Environment constants and path utilities.
//!
//! Centralizes the file and directory names used by configuration discovery.

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git, .vscode)
pub const TASKGATE_DIR_NAME: &str = ".taskgate";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name at a project root
pub const PROJECT_CONFIG_FILE_NAME: &str = "taskgate.toml";

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "TASKGATE_CONFIG";

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "taskgate=info";

/// Log filter used with `--verbose`
pub const VERBOSE_LOG_FILTER: &str = "taskgate=debug";

/// Build the .taskgate directory path under `root`
pub fn taskgate_dir_path(root: &Path) -> PathBuf {
    root.join(TASKGATE_DIR_NAME)
}

/// ./taskgate.toml
pub fn project_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(PROJECT_CONFIG_FILE_NAME)
}

/// ./.taskgate/config.toml
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    taskgate_dir_path(current_dir).join(CONFIG_FILE_NAME)
}

/// ~/.taskgate/config.toml
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    taskgate_dir_path(home_dir).join(CONFIG_FILE_NAME)
}
