// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::config::ConfigView;
use crate::dag::{RunSet, Scheduler};
use crate::errors::{BatchdagError, ExecutionError, Result};
use crate::exec::{ExecutorBackend, Job};
use crate::report::RunSummary;
use crate::task::{ExecContext, Task, TaskId};

use super::{CancelSignal, RuntimeOptions, TaskOutcome, WorkerReport};

/// Parallel coordinator.
///
/// Drives the pure [`Scheduler`] and delegates actual execution to an
/// [`ExecutorBackend`]. The only place it suspends is the bounded wait for
/// the next [`WorkerReport`]; every timeout is a cancellation checkpoint.
pub struct Runtime<E: ExecutorBackend> {
    scheduler: Scheduler,
    tasks: HashMap<TaskId, Arc<dyn Task>>,
    config: Arc<ConfigView>,
    report_rx: mpsc::Receiver<WorkerReport>,
    executor: E,
    options: RuntimeOptions,
    cancel: CancelSignal,
    cancelled: bool,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("scheduler", &self.scheduler)
            .field("poll_interval", &self.options.poll_interval)
            .field("cancelled", &self.cancelled)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        run_set: &RunSet,
        max_workers: usize,
        config: Arc<ConfigView>,
        report_rx: mpsc::Receiver<WorkerReport>,
        executor: E,
        options: &RuntimeOptions,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            scheduler: Scheduler::new(run_set, max_workers),
            tasks: run_set.tasks(),
            config,
            report_rx,
            executor,
            options: options.clone(),
            cancel,
            cancelled: false,
        }
    }

    /// Main loop: tick, dispatch, wait for reports, until every node is
    /// terminal.
    pub async fn run(mut self) -> Result<RunSummary> {
        info!(
            tasks = self.scheduler.len(),
            workers = self.scheduler.max_workers(),
            "parallel runtime started"
        );

        loop {
            self.check_cancelled();

            let step = self.scheduler.tick(!self.cancelled);
            let progressed = !step.dispatched.is_empty()
                || !step.newly_ready.is_empty()
                || !step.newly_failed.is_empty();
            self.dispatch(step.dispatched).await?;

            if step.quiescent {
                break;
            }

            if self.scheduler.running_count() == 0 {
                if progressed {
                    continue;
                }
                return Err(BatchdagError::Other(anyhow!(
                    "scheduler stalled with no running tasks"
                )));
            }

            match tokio::time::timeout(self.options.poll_interval, self.report_rx.recv()).await {
                Ok(Some(report)) => {
                    self.record(report);
                    // Pick up anything else that finished meanwhile.
                    while let Ok(report) = self.report_rx.try_recv() {
                        self.record(report);
                    }
                }
                Ok(None) => {
                    return Err(BatchdagError::Other(anyhow!(
                        "worker report channel closed with {} tasks running",
                        self.scheduler.running_count()
                    )));
                }
                Err(_) => {
                    trace!("no worker finished within poll interval");
                }
            }
        }

        info!(
            failed = self.scheduler.failed().len(),
            cancelled = self.cancelled,
            "parallel runtime finished"
        );

        Ok(RunSummary::from_scheduler(&self.scheduler).with_cancelled(self.cancelled))
    }

    fn check_cancelled(&mut self) {
        if self.cancelled || !self.cancel.is_cancelled() {
            return;
        }
        self.cancelled = true;
        warn!(
            running = self.scheduler.running_count(),
            "cancellation requested; waiting for running tasks"
        );
        self.scheduler.cancel_pending();
    }

    fn record(&mut self, report: WorkerReport) {
        let WorkerReport {
            id,
            outcome,
            elapsed,
            log_file,
        } = report;
        debug!(task = %id, success = outcome.is_success(), "worker report received");
        self.scheduler.complete(&id, outcome, elapsed, log_file);
    }

    async fn dispatch(&mut self, ids: Vec<TaskId>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(task) = self.tasks.get(&id) else {
                warn!(task = %id, "no task registered for dispatched node");
                self.scheduler.complete(
                    &id,
                    TaskOutcome::Failed(ExecutionError::Failed(format!(
                        "no task registered for {id}"
                    ))),
                    None,
                    None,
                );
                continue;
            };

            let log_file = self.options.log_file_for(&id);
            jobs.push(Job {
                id: id.clone(),
                task: Arc::clone(task),
                ctx: ExecContext {
                    id,
                    config: Arc::clone(&self.config),
                    log_file,
                },
            });
        }

        let ids: Vec<_> = jobs.iter().map(|j| j.id.to_string()).collect();
        debug!(?ids, "spawning ready tasks");

        self.executor.spawn_ready_tasks(jobs).await
    }
}
