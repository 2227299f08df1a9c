//! Task input parsing and file handling
//!
//! Two input formats are understood:
//! - TOML task files: an optional `[executor]` table plus `[[tasks]]` entries
//!   that run a program or POST to an HTTP endpoint
//! - Task lists (markdown or plain text): every list item is a shell command

use crate::executor::ExecutorConfig;
use crate::task::{CommandRunner, HttpRunner, RunnerError, TaskGroup, TaskSpec};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FileError {
    #[error("File '{path}' is not UTF-8 encoded: {hint}")]
    NotUtf8 { path: PathBuf, hint: String },

    #[error("File '{path}' not found")]
    NotFound { path: PathBuf },

    #[error("IO error reading '{path}': {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Task parsing error in '{path}': {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Task '{name}' in '{path}' is invalid: {source}")]
    InvalidTask {
        path: PathBuf,
        name: String,
        source: RunnerError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskInput {
    TaskFile(PathBuf), // .toml with [[tasks]]
    TaskList(PathBuf), // markdown/plain text, one shell command per item
}

impl TaskInput {
    pub fn path(&self) -> &Path {
        match self {
            TaskInput::TaskFile(path) | TaskInput::TaskList(path) => path,
        }
    }
}

#[derive(Debug)]
struct Utf8File {
    path: PathBuf,
    content: String,
}

/// On-disk layout of a TOML task file
#[derive(Debug, Deserialize)]
pub struct TaskFile {
    #[serde(default)]
    pub executor: Option<ExecutorConfig>,
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskEntry {
    pub name: String,
    #[serde(flatten)]
    pub kind: TaskKind,
    #[serde(default)]
    pub group: Option<TaskGroup>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        working_dir: Option<PathBuf>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    Http {
        url: String,
        #[serde(default)]
        body: serde_json::Value,
    },
}

/// A shell command taken from a task list
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleTask {
    pub command: String,
    pub line: usize,
}

/// Tasks ready for submission, plus executor settings carried by the file
#[derive(Debug)]
pub struct LoadedTasks {
    pub executor: Option<ExecutorConfig>,
    pub specs: Vec<TaskSpec>,
}

/// Task loader responsible for loading and parsing the task input formats
pub struct TaskLoader;

impl TaskLoader {
    /// Load a UTF-8 file with proper error handling
    fn load_utf8_file<P: AsRef<Path>>(path: P) -> Result<Utf8File, FileError> {
        let path = path.as_ref().to_path_buf();

        debug!(path = %path.display(), "Loading UTF-8 file");

        match fs::read_to_string(&path) {
            Ok(content) => Ok(Utf8File { path, content }),
            Err(e) => match e.kind() {
                std::io::ErrorKind::NotFound => Err(FileError::NotFound { path }),
                std::io::ErrorKind::InvalidData => Err(FileError::NotUtf8 {
                    path,
                    hint: "File appears to be binary. Only UTF-8 text files are supported for tasks."
                        .to_string(),
                }),
                _ => Err(FileError::IoError { path, source: e }),
            },
        }
    }

    /// Load any supported input into task specs
    pub fn load(input: &TaskInput) -> Result<LoadedTasks, FileError> {
        match input {
            TaskInput::TaskFile(path) => {
                let file = Self::load_utf8_file(path)?;
                let parsed = Self::parse_task_file_content(&file.content, &file.path)?;
                let specs = Self::task_file_specs(parsed.tasks, &file.path)?;
                Ok(LoadedTasks {
                    executor: parsed.executor,
                    specs,
                })
            }
            TaskInput::TaskList(path) => {
                let tasks = Self::parse_task_list(path)?;
                let specs = Self::task_list_specs(tasks, path)?;
                Ok(LoadedTasks {
                    executor: None,
                    specs,
                })
            }
        }
    }

    /// Parse TOML task file content without building runners
    pub fn parse_task_file_content(content: &str, source_path: &Path) -> Result<TaskFile, FileError> {
        let parsed: TaskFile = toml::from_str(content).map_err(|e| FileError::ParseError {
            path: source_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if parsed.tasks.is_empty() {
            warn!(path = %source_path.display(), "No tasks found in file");
        }
        Ok(parsed)
    }

    fn task_file_specs(entries: Vec<TaskEntry>, source_path: &Path) -> Result<Vec<TaskSpec>, FileError> {
        entries
            .into_iter()
            .map(|entry| -> Result<TaskSpec, FileError> {
                let invalid = |source: RunnerError| FileError::InvalidTask {
                    path: source_path.to_path_buf(),
                    name: entry.name.clone(),
                    source,
                };

                let spec = match &entry.kind {
                    TaskKind::Command {
                        program,
                        args,
                        working_dir,
                        env,
                    } => {
                        let mut runner =
                            CommandRunner::new(program, args.clone()).map_err(invalid)?;
                        if let Some(dir) = working_dir {
                            runner = runner.with_working_dir(Self::resolve_relative(dir, source_path));
                        }
                        for (key, value) in env {
                            runner = runner.with_env(key, value);
                        }
                        TaskSpec::new(entry.name.clone(), runner)
                    }
                    TaskKind::Http { url, body } => {
                        let runner = HttpRunner::new(url, body.clone()).map_err(invalid)?;
                        TaskSpec::new(entry.name.clone(), runner)
                    }
                };

                Ok(match entry.group {
                    Some(group) => spec.with_group(group),
                    None => spec,
                })
            })
            .collect()
    }

    /// Parse a task list file (markdown or plain text)
    pub fn parse_task_list<P: AsRef<Path>>(path: P) -> Result<Vec<SimpleTask>, FileError> {
        let file = Self::load_utf8_file(path)?;
        let tasks = Self::parse_task_list_content(&file.content);

        if tasks.is_empty() {
            warn!(path = %file.path.display(), "No tasks found in file");
        }
        debug!(count = tasks.len(), path = %file.path.display(), "Parsed task list");

        Ok(tasks)
    }

    /// Every non-blank, non-comment line becomes one command
    fn parse_task_list_content(content: &str) -> Vec<SimpleTask> {
        content
            .lines()
            .enumerate()
            .filter_map(|(index, line)| {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                    return None;
                }
                let command = Self::extract_command(line);
                (!command.is_empty()).then(|| SimpleTask {
                    command,
                    line: index + 1,
                })
            })
            .collect()
    }

    fn task_list_specs(tasks: Vec<SimpleTask>, source_path: &Path) -> Result<Vec<TaskSpec>, FileError> {
        tasks
            .into_iter()
            .map(|task| -> Result<TaskSpec, FileError> {
                let runner = CommandRunner::shell(&task.command).map_err(|source| {
                    FileError::InvalidTask {
                        path: source_path.to_path_buf(),
                        name: task.command.clone(),
                        source,
                    }
                })?;
                Ok(TaskSpec::new(task.command, runner))
            })
            .collect()
    }

    /// Strip list markup: checkboxes, bullets, numbering and inline code ticks
    fn extract_command(line: &str) -> String {
        let line = line.trim();

        let item = line
            .strip_prefix("- [ ]")
            .or_else(|| line.strip_prefix("- [x]"))
            .or_else(|| line.strip_prefix("- [X]"))
            .or_else(|| line.strip_prefix("- "))
            .or_else(|| line.strip_prefix("* "))
            .or_else(|| Self::strip_numbering(line))
            .unwrap_or(line)
            .trim();

        item.strip_prefix('`')
            .and_then(|rest| rest.strip_suffix('`'))
            .unwrap_or(item)
            .trim()
            .to_string()
    }

    /// "1. cmd" or "1) cmd"
    fn strip_numbering(line: &str) -> Option<&str> {
        let pos = line.find(". ").or_else(|| line.find(") "))?;
        let digits = &line[..pos];
        (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())).then(|| &line[pos + 2..])
    }

    /// Resolve a path relative to the directory of the task file
    fn resolve_relative(path: &Path, source_path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match source_path.parent() {
            Some(parent) => parent.join(path),
            None => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_utf8_file() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(&temp_file, "echo hello").unwrap();

        let result = TaskLoader::load_utf8_file(temp_file.path()).unwrap();
        assert_eq!(result.content, "echo hello");
    }

    #[test]
    fn test_parse_task_list_markdown() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(
            &temp_file,
            "# Build steps\n\
             - [ ] cargo fmt --check\n\
             - [x] `cargo clippy`\n\
             * echo docs\n\
             \n\
             // skipped\n\
             1. ls -la\n\
             2) true",
        )
        .unwrap();

        let tasks = TaskLoader::parse_task_list(temp_file.path()).unwrap();
        let commands: Vec<&str> = tasks.iter().map(|t| t.command.as_str()).collect();
        assert_eq!(
            commands,
            vec!["cargo fmt --check", "cargo clippy", "echo docs", "ls -la", "true"]
        );
        assert_eq!(tasks[0].line, 2);
    }

    #[test]
    fn test_extract_command_formats() {
        assert_eq!(TaskLoader::extract_command("- [ ] make test"), "make test");
        assert_eq!(TaskLoader::extract_command("10. echo ten"), "echo ten");
        assert_eq!(TaskLoader::extract_command("echo a. b"), "echo a. b");
        assert_eq!(TaskLoader::extract_command("plain command"), "plain command");
    }

    #[test]
    fn test_parse_task_file() {
        let content = r#"
[executor]
max_concurrency = 2
retry_attempts = 1

[[tasks]]
name = "list"
kind = "command"
program = "ls"
args = ["-la"]

[tasks.group]
stage = "inspect"

[[tasks]]
name = "notify"
kind = "http"
url = "http://localhost:8080/hook"
body = { message = "done", count = 3 }
"#;
        let parsed = TaskLoader::parse_task_file_content(content, Path::new("tasks.toml")).unwrap();

        let executor = parsed.executor.unwrap();
        assert_eq!(executor.max_concurrency, 2);
        assert_eq!(executor.retry_attempts, 1);
        assert_eq!(executor.rate_limit, 10);

        assert_eq!(parsed.tasks.len(), 2);
        assert_eq!(parsed.tasks[0].name, "list");
        assert_eq!(
            parsed.tasks[0].kind,
            TaskKind::Command {
                program: "ls".to_string(),
                args: vec!["-la".to_string()],
                working_dir: None,
                env: BTreeMap::new(),
            }
        );
        assert_eq!(
            parsed.tasks[0].group.as_ref().unwrap().get("stage").map(String::as_str),
            Some("inspect")
        );

        match &parsed.tasks[1].kind {
            TaskKind::Http { url, body } => {
                assert_eq!(url, "http://localhost:8080/hook");
                assert_eq!(body["message"], "done");
                assert_eq!(body["count"], 3);
            }
            other => panic!("expected http task, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_task_kind_is_a_parse_error() {
        let content = "[[tasks]]\nname = \"x\"\nkind = \"carrier-pigeon\"\n";
        let err = TaskLoader::parse_task_file_content(content, Path::new("tasks.toml")).unwrap_err();
        assert!(matches!(err, FileError::ParseError { .. }));
    }

    #[test]
    fn test_load_task_file_builds_specs() {
        let temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        fs::write(
            &temp_file,
            "[[tasks]]\nname = \"greet\"\nkind = \"command\"\nprogram = \"sh\"\nargs = [\"-c\", \"echo hi\"]\n",
        )
        .unwrap();

        let loaded = TaskLoader::load(&TaskInput::TaskFile(temp_file.path().to_path_buf())).unwrap();
        assert!(loaded.executor.is_none());
        assert_eq!(loaded.specs.len(), 1);
        assert_eq!(loaded.specs[0].name, "greet");
        assert!(loaded.specs[0].runner.describe().ends_with("-c 'echo hi'"));
    }

    #[test]
    fn test_invalid_url_names_the_task() {
        let temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        fs::write(
            &temp_file,
            "[[tasks]]\nname = \"bad-hook\"\nkind = \"http\"\nurl = \"ftp://example.com\"\n",
        )
        .unwrap();

        let err = TaskLoader::load(&TaskInput::TaskFile(temp_file.path().to_path_buf())).unwrap_err();
        match err {
            FileError::InvalidTask { name, .. } => assert_eq!(name, "bad-hook"),
            other => panic!("expected InvalidTask, got {:?}", other),
        }
    }

    #[test]
    fn test_load_utf8_file_with_binary() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(&temp_file, [0xFF, 0xFE, 0x00, 0x01]).unwrap();

        let result = TaskLoader::load_utf8_file(temp_file.path());
        assert!(result.is_err());

        let error_msg = format!("{}", result.unwrap_err());
        assert!(error_msg.contains("not UTF-8 encoded"));
        assert!(error_msg.contains("binary"));
    }

    #[test]
    fn test_missing_file() {
        let err = TaskLoader::parse_task_list("/nonexistent/tasks.md").unwrap_err();
        assert!(matches!(err, FileError::NotFound { .. }));
    }
}
