use taskgate::TuningMode;
use taskgate::cli::{ConfigError, TaskgateConfig};
use taskgate::executor::{ExecutorConfig, ExecutorError};
use tempfile::NamedTempFile;

#[test]
fn test_config_serialization_roundtrip() {
    let original_config = TaskgateConfig {
        executor: ExecutorConfig::default()
            .with_max_concurrency(4)
            .with_tuning_mode(TuningMode::Windowed),
    };

    let toml_str =
        toml::to_string_pretty(&original_config).expect("Should be able to serialize config to TOML");

    assert!(toml_str.contains("[executor]"), "Should contain executor table");
    assert!(toml_str.contains("tuning_mode = \"windowed\""));

    let deserialized_config: TaskgateConfig =
        toml::from_str(&toml_str).expect("Should be able to deserialize TOML string");
    assert_eq!(original_config, deserialized_config);
}

#[test]
fn test_config_file_operations() {
    let original_config = TaskgateConfig::default();

    let temp_file = NamedTempFile::new().expect("Should be able to create temporary file");
    let temp_path = temp_file.path();

    original_config
        .to_toml_file(temp_path)
        .expect("Should be able to save config to file");

    let loaded_config =
        TaskgateConfig::from_toml_file(temp_path).expect("Should be able to load config from file");
    assert_eq!(original_config, loaded_config);
}

#[test]
fn test_partial_config_fills_defaults() {
    let temp_file = NamedTempFile::new().unwrap();
    std::fs::write(
        temp_file.path(),
        r#"
[executor]
max_concurrency = 1
rate_limit = 3
retry_jitter = 0.2
"#,
    )
    .unwrap();

    let config = TaskgateConfig::from_toml_file(temp_file.path()).unwrap();
    assert_eq!(config.executor.max_concurrency, 1);
    assert_eq!(config.executor.rate_limit, 3);
    assert_eq!(config.executor.retry_jitter, 0.2);
    assert_eq!(config.executor.max_concurrency_limit, 5);
    assert_eq!(config.executor.retry_delay_ms, 2000);
    assert_eq!(config.executor.tuning_mode, TuningMode::Cumulative);
}

#[test]
fn test_empty_file_is_all_defaults() {
    let temp_file = NamedTempFile::new().unwrap();
    std::fs::write(temp_file.path(), "").unwrap();

    let config = TaskgateConfig::from_toml_file(temp_file.path()).unwrap();
    assert_eq!(config, TaskgateConfig::default());
}

#[test]
fn test_invalid_tuning_mode_is_rejected() {
    let temp_file = NamedTempFile::new().unwrap();
    std::fs::write(temp_file.path(), "[executor]\ntuning_mode = \"psychic\"\n").unwrap();

    let err = TaskgateConfig::from_toml_file(temp_file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_out_of_range_values_fail_validation() {
    let temp_file = NamedTempFile::new().unwrap();
    std::fs::write(
        temp_file.path(),
        "[executor]\nretry_delay_ms = 5000\nmax_retry_delay_ms = 1000\n",
    )
    .unwrap();

    let err = TaskgateConfig::from_toml_file(temp_file.path()).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid(ExecutorError::InvalidConfig(_))
    ));
    assert!(err.to_string().contains("max_retry_delay_ms"));
}
