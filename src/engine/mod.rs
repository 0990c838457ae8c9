// src/engine/mod.rs

//! Execution engine for batchdag.
//!
//! This module ties together:
//! - the pure [`Scheduler`](crate::dag::Scheduler) state machine
//! - the parallel coordinator loop ([`runtime`]) that dispatches ready
//!   nodes to an [`ExecutorBackend`](crate::exec::ExecutorBackend) and
//!   waits for reports with a bounded poll
//! - the in-process sequential loop ([`sequential`]) used when only one
//!   task may run at a time
//! - operator cancellation ([`cancel`])

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::config::{ConfigFile, ConfigView};
use crate::dag::RunSet;
use crate::errors::{ExecutionError, Result};
use crate::exec::{Isolation, WorkerPool};
use crate::report::RunSummary;
use crate::task::TaskId;
use crate::types::ExecutionMode;

pub mod cancel;
pub mod runtime;
pub mod sequential;

pub use cancel::CancelSignal;
pub use runtime::Runtime;
pub use sequential::run_sequential;

/// Outcome of one `execute()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(ExecutionError),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

/// The single message a worker sends back for the node it ran.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub id: TaskId,
    pub outcome: TaskOutcome,
    pub elapsed: Option<Duration>,
    pub log_file: Option<PathBuf>,
}

/// Knobs shared by both execution modes.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub mode: ExecutionMode,
    /// Upper bound on how long the coordinator waits for a report before
    /// checking for cancellation.
    pub poll_interval: Duration,
    /// Directory for per-node log files of isolated workers.
    pub log_dir: Option<PathBuf>,
    /// Where parallel workers run `execute()`.
    pub isolation: Isolation,
}

impl RuntimeOptions {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            mode: cfg.execution_mode(),
            poll_interval: cfg.poll_interval(),
            log_dir: Some(cfg.log_directory()),
            isolation: Isolation::default(),
        }
    }

    pub fn with_isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    /// Per-node log file in isolated mode.
    pub fn log_file_for(&self, id: &TaskId) -> Option<PathBuf> {
        self.log_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.log", id.log_stem())))
    }
}

/// Execute a resolved run set until quiescence (or until the sequential
/// loop halts on the first failure).
pub async fn execute_run_set(
    run_set: RunSet,
    options: &RuntimeOptions,
    config: Arc<ConfigView>,
    cancel: CancelSignal,
) -> Result<RunSummary> {
    info!(
        tasks = run_set.len(),
        workers = options.mode.max_workers(),
        "starting execution"
    );

    match options.mode {
        ExecutionMode::Sequential => {
            let handle = tokio::task::spawn_blocking(move || {
                run_sequential(&run_set, config, &cancel)
            });
            match handle.await {
                Ok(summary) => summary,
                // No fault barrier in sequential mode.
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => Err(anyhow::Error::from(e).into()),
            }
        }
        ExecutionMode::Parallel(workers) => {
            let (tx, rx) = mpsc::channel(workers.max(1) * 2);
            let executor = WorkerPool::new(tx, options.isolation.clone());
            let runtime = Runtime::new(&run_set, workers, config, rx, executor, options, cancel);
            runtime.run().await
        }
    }
}
