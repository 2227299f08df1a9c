use anyhow::{Context, Result};
use std::sync::Arc;
use taskgate::cli::{
    Args, ConfigDiscovery, ConfigSource, ExecutionMode, RunConfig, TaskInput, TaskLoader,
};
use taskgate::env;
use taskgate::executor::{JsonlTracker, LogTracker, TaskExecutor, TrackerSet};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mode = args.mode().map_err(anyhow::Error::msg)?;

    match mode {
        ExecutionMode::Run(config) => {
            init_tracing(config.verbose);
            let success = run_tasks(config).await?;
            if !success {
                std::process::exit(1);
            }
            Ok(())
        }
        ExecutionMode::ShowConfig { config_override } => {
            init_tracing(false);
            let report = ConfigDiscovery::discovery_report(config_override.as_deref())?;
            print!("{}", report);
            Ok(())
        }
    }
}

/// `RUST_LOG` wins over the built-in filters
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        env::VERBOSE_LOG_FILTER
    } else {
        env::DEFAULT_LOG_FILTER
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns whether every task completed
async fn run_tasks(config: RunConfig) -> Result<bool> {
    let (file_config, source) = ConfigDiscovery::load(config.config_override.as_deref())?;
    if let ConfigSource::File(path) = &source {
        info!(path = %path.display(), "Using configuration file");
    }

    let loaded = TaskLoader::load(&config.task_input)
        .with_context(|| format!("Failed to load tasks from {}", config.task_input.path().display()))?;

    // Task file settings override discovered ones, CLI flags override both
    let mut executor_config = loaded.executor.unwrap_or(file_config.executor);
    config.overrides.apply(&mut executor_config);

    let kind = match config.task_input {
        TaskInput::TaskFile(_) => "task_file",
        TaskInput::TaskList(_) => "task_list",
    };
    info!(
        tasks = loaded.specs.len(),
        input = %config.task_input.path().display(),
        kind,
        "Loaded tasks"
    );

    if config.dry_run {
        println!("Dry run: {} task(s) would be executed", loaded.specs.len());
        for (i, spec) in loaded.specs.iter().enumerate() {
            println!("  {}. {} -> {}", i + 1, spec.name, spec.runner.describe());
        }
        println!();
        println!("{}", toml::to_string_pretty(&executor_config)?);
        return Ok(true);
    }

    let mut trackers = TrackerSet::new().with(Arc::new(LogTracker));
    if let Some(path) = &config.events {
        trackers = trackers.with(Arc::new(JsonlTracker::open(path).await?));
    }

    let mut executor = TaskExecutor::new(executor_config)?.with_tracker(Arc::new(trackers));
    for spec in loaded.specs {
        let name = spec.name.clone();
        if let Err(e) = executor.submit(spec) {
            warn!(task = %name, error = %e, "Task not admitted");
        }
    }

    let shutdown = executor.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, shutting down");
            shutdown.cancel();
        }
    });

    let report = executor.run().await;
    print!("{}", report.render());

    if let Some(path) = &config.report {
        let json = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "Wrote run report");
    }

    Ok(report.is_success())
}
