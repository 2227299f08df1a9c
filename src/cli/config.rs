//! Configuration discovery and loading
//!
//! Discovery hierarchy, first match wins:
//! 1. Explicit path: `--config FILE`
//! 2. Environment: `$TASKGATE_CONFIG`
//! 3. Current directory: `./taskgate.toml`, then `./.taskgate/config.toml`
//! 4. User config: `~/.taskgate/config.toml`
//! 5. Built-in defaults

use crate::env;
use crate::executor::{ExecutorConfig, ExecutorError};
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file '{path}' not found")]
    NotFound { path: PathBuf },

    #[error("IO error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML in '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Invalid(#[from] ExecutorError),
}

/// Contents of a taskgate configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskgateConfig {
    #[serde(default)]
    pub executor: ExecutorConfig,
}

impl TaskgateConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound {
                path: path.to_path_buf(),
            },
            _ => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;

        let config: TaskgateConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.executor.validate()?;
        Ok(config)
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load the explicit file if given, otherwise walk the discovery hierarchy.
    ///
    /// An explicit path that does not exist is an error; missing discovered
    /// files are simply skipped.
    pub fn load(explicit: Option<&Path>) -> Result<(TaskgateConfig, ConfigSource), ConfigError> {
        if let Some(path) = explicit {
            info!(path = %path.display(), "Loading configuration override");
            let config = TaskgateConfig::from_toml_file(path)?;
            return Ok((config, ConfigSource::File(path.to_path_buf())));
        }

        match Self::find_config_file() {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration");
                let config = TaskgateConfig::from_toml_file(&path)?;
                Ok((config, ConfigSource::File(path)))
            }
            None => {
                info!("No configuration file found, using defaults");
                Ok((TaskgateConfig::default(), ConfigSource::Defaults))
            }
        }
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        for candidate in Self::config_candidates() {
            debug!(candidate = %candidate.display(), "Checking for config file");
            if candidate.is_file() {
                debug!(path = %candidate.display(), "Found config file");
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Configuration file candidates in priority order
    pub fn config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(path) = std_env::var_os(env::CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
            candidates.push(PathBuf::from(path));
        }

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(env::project_config_file_path(&current_dir));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = Self::home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        candidates
    }

    fn home_dir() -> Option<PathBuf> {
        std_env::var_os("HOME")
            .or_else(|| std_env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    }

    /// Discovery hierarchy and effective configuration, for `show-config`
    pub fn discovery_report(explicit: Option<&Path>) -> Result<String, ConfigError> {
        let mut out = String::from("Configuration Discovery Hierarchy:\n\n");

        let mut candidates = Vec::new();
        if let Some(path) = explicit {
            candidates.push(path.to_path_buf());
        }
        candidates.extend(Self::config_candidates());

        for (i, candidate) in candidates.iter().enumerate() {
            let status = if candidate.is_file() {
                "EXISTS"
            } else if candidate.exists() {
                "NOT A FILE"
            } else {
                "NOT FOUND"
            };
            out.push_str(&format!("  {}. {} - {}\n", i + 1, candidate.display(), status));
        }

        let (config, source) = Self::load(explicit)?;
        out.push('\n');
        match source {
            ConfigSource::File(path) => {
                out.push_str(&format!("Active configuration: {}\n", path.display()))
            }
            ConfigSource::Defaults => out.push_str("Active configuration: built-in defaults\n"),
        }
        out.push('\n');
        out.push_str(&toml::to_string_pretty(&config)?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_config_serialization() {
        let config = TaskgateConfig::default();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: TaskgateConfig = toml::from_str(&toml_string).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");

        let mut original = TaskgateConfig::default();
        original.executor.max_concurrency = 4;
        original.to_toml_file(&config_path).unwrap();

        let loaded = TaskgateConfig::from_toml_file(&config_path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_invalid_values_are_rejected_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.toml");
        fs::write(&config_path, "[executor]\nmax_concurrency = 0\n").unwrap();

        let err = TaskgateConfig::from_toml_file(&config_path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(ExecutorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[executor\nmax_concurrency = ").unwrap();

        let err = TaskgateConfig::from_toml_file(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = ConfigDiscovery::load(Some(Path::new("/nonexistent/taskgate.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    #[serial]
    fn test_env_var_candidate_comes_first() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("from-env.toml");
        fs::write(&config_path, "[executor]\nrate_limit = 42\n").unwrap();

        unsafe { std_env::set_var(env::CONFIG_ENV_VAR, &config_path) };
        let candidates = ConfigDiscovery::config_candidates();
        let loaded = ConfigDiscovery::load(None);
        unsafe { std_env::remove_var(env::CONFIG_ENV_VAR) };

        assert_eq!(candidates[0], config_path);
        let (config, source) = loaded.unwrap();
        assert_eq!(config.executor.rate_limit, 42);
        assert_eq!(source, ConfigSource::File(config_path));
    }

    #[test]
    #[serial]
    fn test_config_candidates_order() {
        unsafe { std_env::remove_var(env::CONFIG_ENV_VAR) };
        let candidates = ConfigDiscovery::config_candidates();

        assert!(candidates.len() >= 2);
        assert_eq!(candidates[0].file_name().unwrap(), "taskgate.toml");
        assert!(candidates[1].ends_with(".taskgate/config.toml"));
    }
}
