// src/exec/worker.rs

//! Isolated worker pool used by the parallel runtime.
//!
//! Each job gets a thread from tokio's blocking pool. With
//! [`Isolation::Process`] that thread only starts the node's child process
//! and waits for it; with [`Isolation::Thread`] it calls `execute()`
//! itself. Either way the work runs behind a panic barrier and the worker
//! sends exactly one [`WorkerReport`] back to the coordinator. That report
//! is the only thing a worker ever writes.

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::engine::{TaskOutcome, WorkerReport};
use crate::errors::{ExecutionError, Result};

use super::backend::{ExecutorBackend, Job};
use super::process::WorkerCommand;

/// Where a worker runs `execute()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Isolation {
    /// On the worker thread, sharing the coordinator's memory. For tasks
    /// that cannot be rebuilt in another process.
    #[default]
    Thread,
    /// In a child process of its own.
    Process(WorkerCommand),
}

/// Production [`ExecutorBackend`].
#[derive(Debug, Clone)]
pub struct WorkerPool {
    report_tx: mpsc::Sender<WorkerReport>,
    isolation: Isolation,
}

impl WorkerPool {
    pub fn new(report_tx: mpsc::Sender<WorkerReport>, isolation: Isolation) -> Self {
        Self {
            report_tx,
            isolation,
        }
    }
}

impl ExecutorBackend for WorkerPool {
    fn spawn_ready_tasks(
        &mut self,
        jobs: Vec<Job>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.report_tx.clone();
        let isolation = self.isolation.clone();

        Box::pin(async move {
            for job in jobs {
                let tx = tx.clone();
                let isolation = isolation.clone();
                let id = job.id.clone();
                let log_file = job.ctx.log_file.clone();

                tokio::spawn(async move {
                    let handle = tokio::task::spawn_blocking(move || run_job(job, &isolation));
                    let report = match handle.await {
                        Ok(report) => report,
                        Err(join_err) => {
                            // Only reachable if the barrier itself was bypassed.
                            error!(task = %id, error = %join_err, "worker thread died");
                            WorkerReport {
                                id: id.clone(),
                                outcome: TaskOutcome::Failed(ExecutionError::Panicked(
                                    join_err.to_string(),
                                )),
                                elapsed: None,
                                log_file,
                            }
                        }
                    };

                    if tx.send(report).await.is_err() {
                        warn!(task = %id, "runtime dropped the report channel; result lost");
                    }
                });
            }
            Ok(())
        })
    }
}

/// Run one job to completion inside the panic barrier.
pub fn run_job(job: Job, isolation: &Isolation) -> WorkerReport {
    let Job { id, task, ctx } = job;
    debug!(task = %id, log_file = ?ctx.log_file, isolation = ?isolation, "worker started");

    let start = Instant::now();
    let work = || match isolation {
        Isolation::Thread => task.execute(&ctx),
        Isolation::Process(worker) => worker.run(&id, ctx.log_file.as_deref()),
    };
    let result = match catch_unwind(AssertUnwindSafe(work)) {
        Ok(result) => result,
        Err(panic) => Err(ExecutionError::Panicked(panic_message(panic.as_ref()))),
    };
    let elapsed = start.elapsed();

    let outcome = match result {
        Ok(()) => {
            info!(
                task = %id,
                elapsed_ms = elapsed.as_millis() as u64,
                "task finished"
            );
            TaskOutcome::Success
        }
        Err(err) => {
            error!(
                task = %id,
                elapsed_ms = elapsed.as_millis() as u64,
                log_file = ?ctx.log_file,
                error = %err,
                "task failed"
            );
            TaskOutcome::Failed(err)
        }
    };

    WorkerReport {
        id,
        outcome,
        elapsed: Some(elapsed),
        log_file: ctx.log_file,
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
