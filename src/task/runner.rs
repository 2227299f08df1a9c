//! Task runners: the operation a task performs when dispatched.
//!
//! The executor only knows the [`TaskRunner`] trait. Three implementations ship
//! with the crate:
//!
//! - [`FnRunner`]: wraps an async closure, mostly for library users and tests
//! - [`CommandRunner`]: runs a local program, killing it on cancellation
//! - [`HttpRunner`]: POSTs a JSON body to a URL and returns the response body

use crate::task::types::TaskError;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::borrow::Cow;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Longest response/stderr excerpt kept in an error message
const ERROR_EXCERPT_LEN: usize = 512;

/// Errors raised while building a runner
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Program '{program}' not found: {reason}")]
    ProgramNotFound { program: String, reason: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// The work behind a task.
///
/// `cancel` fires when the task times out or the executor shuts down.
/// Implementations should stop promptly and return [`TaskError::Cancelled`].
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn execute(&self, cancel: CancellationToken) -> Result<Value, TaskError>;

    /// Short human-readable description used in logs
    fn describe(&self) -> String {
        "task".to_string()
    }
}

/// Runner backed by an async closure
pub struct FnRunner<F> {
    f: F,
}

impl<F, Fut> FnRunner<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> TaskRunner for FnRunner<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
{
    async fn execute(&self, cancel: CancellationToken) -> Result<Value, TaskError> {
        (self.f)(cancel).await
    }

    fn describe(&self) -> String {
        "closure".to_string()
    }
}

/// Runs a local program and captures its output
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl CommandRunner {
    /// Resolve `program` on `PATH` and build a runner for it
    pub fn new(program: &str, args: Vec<String>) -> Result<Self, RunnerError> {
        let resolved = which::which(program).map_err(|e| RunnerError::ProgramNotFound {
            program: program.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            program: resolved,
            args,
            working_dir: None,
            env: Vec::new(),
        })
    }

    /// Run `script` with `sh -c`
    pub fn shell(script: &str) -> Result<Self, RunnerError> {
        Self::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The command line as it would be typed in a shell
    pub fn command_line(&self) -> String {
        let program = self.program.to_string_lossy();
        std::iter::once(shell_escape::escape(program))
            .chain(
                self.args
                    .iter()
                    .map(|arg| shell_escape::escape(Cow::from(arg.as_str()))),
            )
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl TaskRunner for CommandRunner {
    async fn execute(&self, cancel: CancellationToken) -> Result<Value, TaskError> {
        let command_line = self.command_line();
        debug!(command = %command_line, "Spawning command");

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| TaskError::execution(format!("Failed to spawn `{}`: {}", command_line, e)))?;

        // Dropping the wait future drops the child, which kills it
        let output = tokio::select! {
            output = child.wait_with_output() => output
                .map_err(|e| TaskError::execution(format!("Failed to wait for `{}`: {}", command_line, e)))?,
            _ = cancel.cancelled() => return Err(TaskError::Cancelled),
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(json!({
                "exit_code": exit_code,
                "stdout": stdout,
                "stderr": stderr,
            }))
        } else {
            Err(TaskError::execution(format!(
                "`{}` exited with status {}: {}",
                command_line,
                exit_code,
                excerpt(stderr.trim())
            )))
        }
    }

    fn describe(&self) -> String {
        self.command_line()
    }
}

/// POSTs a JSON body to an HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpRunner {
    client: reqwest::Client,
    url: Url,
    body: Value,
}

impl HttpRunner {
    pub fn new(url: &str, body: Value) -> Result<Self, RunnerError> {
        let parsed = Url::parse(url).map_err(|e| RunnerError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RunnerError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            url: parsed,
            body,
        })
    }

    /// Share a preconfigured client between runners
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl TaskRunner for HttpRunner {
    async fn execute(&self, cancel: CancellationToken) -> Result<Value, TaskError> {
        let request = self.client.post(self.url.clone()).json(&self.body).send();

        let response = tokio::select! {
            response = request => response
                .map_err(|e| TaskError::execution(format!("Request to {} failed: {}", self.url, e)))?,
            _ = cancel.cancelled() => return Err(TaskError::Cancelled),
        };

        let status = response.status();
        let text = tokio::select! {
            text = response.text() => text
                .map_err(|e| TaskError::execution(format!("Failed to read response from {}: {}", self.url, e)))?,
            _ = cancel.cancelled() => return Err(TaskError::Cancelled),
        };

        if !status.is_success() {
            return Err(TaskError::execution(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                self.url,
                excerpt(text.trim())
            )));
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    fn describe(&self) -> String {
        format!("POST {}", self.url)
    }
}

fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(ERROR_EXCERPT_LEN) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
