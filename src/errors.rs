// src/errors.rs

//! Crate-wide error types.
//!
//! - [`BatchdagError`] is the run-level error returned from the entry points.
//! - [`ValidationError`] is what a task's `validate()` reports; the resolver
//!   turns it into `SetupStatus::Fail` and never propagates it further.
//! - [`ExecutionError`] is what a task's `execute()` reports; the scheduler
//!   turns it into `RunStatus::Fail`.

use std::path::PathBuf;

use thiserror::Error;

use crate::task::TaskId;

#[derive(Error, Debug)]
pub enum BatchdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Duplicate task identity: {0}")]
    DuplicateTask(TaskId),

    #[error("Task not found: {0}")]
    UnknownTask(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("No tasks were valid; nothing to run")]
    NoValidTasks,

    #[error("Task {task} failed: {cause}")]
    TaskFailed { task: TaskId, cause: String },

    #[error("{count} tasks failed: {tasks}")]
    TasksFailed { count: usize, tasks: String },

    #[error("Run cancelled before all tasks finished")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure reported by [`Task::validate`](crate::task::Task::validate).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("config section [{0}] is missing")]
    MissingSection(String),

    #[error("config option {section}.{option} is missing")]
    MissingOption { section: String, option: String },

    #[error("required input {0} does not exist")]
    MissingInput(PathBuf),

    #[error("invalid value for {section}.{option}: {reason}")]
    InvalidOption {
        section: String,
        option: String,
        reason: String,
    },

    #[error("placeholder ${{{0}}} could not be resolved")]
    UnresolvedPlaceholder(String),

    #[error("{0}")]
    Failed(String),
}

/// Failure reported by [`Task::execute`](crate::task::Task::execute).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("failed to start command: {0}")]
    Spawn(String),

    #[error("command exited with {}", exit_status(.code))]
    CommandFailed { code: Option<i32> },

    #[error("worker process exited with {}", exit_status(.code))]
    WorkerExited { code: Option<i32> },

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("cannot open log file {path}: {reason}")]
    LogFile { path: PathBuf, reason: String },

    #[error("{0}")]
    Failed(String),
}

/// `status N`, or `a signal` when the process was killed without one.
fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BatchdagError>;
