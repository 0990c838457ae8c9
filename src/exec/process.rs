// src/exec/process.rs

//! Process isolation for parallel workers.
//!
//! The coordinator side ([`WorkerCommand::run`]) starts a child process with
//! [`WORKER_TASK_ENV`] naming the node, sends the child's stdout and stderr
//! to the node's log file and maps the exit status to an outcome.
//!
//! The child side ([`execute_in_worker`]) rebuilds the node from the same
//! declarations, validates it, executes it and turns the result into an exit
//! code. A failure is written to stderr as one line starting with
//! [`WORKER_FAILURE_PREFIX`] so the coordinator can recover the cause from
//! the log file.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use tracing::{debug, error};

use crate::config::ConfigView;
use crate::errors::{ExecutionError, Result};
use crate::task::{ExecContext, TaskForest, TaskId};

use super::command::open_log;

/// Names the node a child process must run.
pub const WORKER_TASK_ENV: &str = "BATCHDAG_WORKER_TASK";

/// Prefix of the line a failing child writes to stderr.
pub const WORKER_FAILURE_PREFIX: &str = "batchdag worker failed: ";

pub const EXIT_EXECUTE_FAILED: i32 = 1;
pub const EXIT_SETUP_FAILED: i32 = 2;
/// Exit status of a Rust process that died from an uncaught panic.
pub const EXIT_PANICKED: i32 = 101;

/// How to start a worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Re-run the current executable against the same config file.
    pub fn current_exe(config: &Path) -> Result<Self> {
        let program = std::env::current_exe()?;
        Ok(Self::new(program)
            .arg("--config")
            .arg(config.as_os_str()))
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run `id` in a child process and wait for it.
    pub fn run(
        &self,
        id: &TaskId,
        log_file: Option<&Path>,
    ) -> std::result::Result<(), ExecutionError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env(WORKER_TASK_ENV, id.to_string())
            .stdin(Stdio::null());

        match log_file {
            Some(path) => {
                let (stdout, stderr) = open_log(path)?;
                command.stdout(stdout).stderr(stderr);
            }
            None => {
                command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
        }

        debug!(task = %id, program = %self.program.display(), "starting worker process");
        let status = command
            .status()
            .map_err(|e| ExecutionError::Spawn(format!("{}: {e}", self.program.display())))?;
        debug!(task = %id, code = ?status.code(), "worker process exited");

        if status.success() {
            return Ok(());
        }

        let reported = log_file.and_then(reported_failure);
        match (status.code(), reported) {
            (_, Some(cause)) => Err(ExecutionError::Failed(cause)),
            (Some(EXIT_PANICKED), None) => Err(ExecutionError::Panicked(match log_file {
                Some(path) => format!("worker process aborted; see {}", path.display()),
                None => "worker process aborted".to_string(),
            })),
            (code, None) => Err(ExecutionError::WorkerExited { code }),
        }
    }
}

/// Last failure line a child wrote to its log.
fn reported_failure(log_file: &Path) -> Option<String> {
    let bytes = fs::read(log_file).ok()?;
    let text = String::from_utf8_lossy(&bytes);
    text.lines()
        .rev()
        .find_map(|line| line.strip_prefix(WORKER_FAILURE_PREFIX))
        .map(|cause| cause.trim().to_string())
}

/// The node this process was started to run, if it is a worker.
pub fn worker_task_from_env() -> Option<String> {
    std::env::var(WORKER_TASK_ENV).ok()
}

/// Child side: validate and execute one node of `forest`.
///
/// Returns the exit code the process should end with. Panics are not
/// caught; the coordinator sees them as [`EXIT_PANICKED`].
pub fn execute_in_worker(mut forest: TaskForest, task: &str, config: Arc<ConfigView>) -> i32 {
    let id = match task.parse::<TaskId>() {
        Ok(id) => id,
        Err(e) => return report_failure(EXIT_SETUP_FAILED, &e),
    };
    let Some(mut node) = forest.take_task(&id) else {
        return report_failure(EXIT_SETUP_FAILED, &format!("unknown task '{id}'"));
    };

    if let Err(e) = node.validate(&config) {
        return report_failure(EXIT_SETUP_FAILED, &e.to_string());
    }

    let ctx = ExecContext {
        id: id.clone(),
        config,
        // stdout and stderr already point at the log file.
        log_file: None,
    };
    match node.execute(&ctx) {
        Ok(()) => 0,
        Err(e) => report_failure(EXIT_EXECUTE_FAILED, &e.to_string()),
    }
}

/// Write the failure line and return `code`.
pub fn report_failure(code: i32, cause: &str) -> i32 {
    error!(cause = %cause, "worker failed");
    eprintln!("{WORKER_FAILURE_PREFIX}{cause}");
    code
}
