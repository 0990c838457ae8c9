// src/engine/sequential.rs

//! In-process, one-at-a-time execution.
//!
//! Uses the same [`Scheduler`] as the parallel runtime with a single slot,
//! but runs each node directly on the calling thread: no worker boundary,
//! no panic barrier, no log file redirection. The first execution error
//! halts the whole run; remaining nodes are never started.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::ConfigView;
use crate::dag::{RunSet, Scheduler};
use crate::errors::{ExecutionError, Result};
use crate::report::RunSummary;
use crate::task::ExecContext;

use super::{CancelSignal, TaskOutcome};

pub fn run_sequential(
    run_set: &RunSet,
    config: Arc<ConfigView>,
    cancel: &CancelSignal,
) -> Result<RunSummary> {
    let tasks = run_set.tasks();
    let mut scheduler = Scheduler::new(run_set, 1);
    let mut cancelled = false;
    let mut halted = false;

    info!(tasks = scheduler.len(), "sequential run started");

    loop {
        if !cancelled && cancel.is_cancelled() {
            cancelled = true;
            warn!("cancellation requested; stopping before the next task");
            scheduler.cancel_pending();
        }

        let step = scheduler.tick(!cancelled);
        if step.quiescent {
            break;
        }

        let Some(id) = step.dispatched.into_iter().next() else {
            if step.newly_failed.is_empty() && step.newly_ready.is_empty() {
                warn!("nothing left that can run; stopping");
                break;
            }
            continue;
        };

        let Some(task) = tasks.get(&id) else {
            let err = ExecutionError::Failed(format!("no task registered for {id}"));
            error!(task = %id, error = %err, "task failed; halting run");
            scheduler.complete(&id, TaskOutcome::Failed(err), None, None);
            halted = true;
            break;
        };

        let ctx = ExecContext {
            id: id.clone(),
            config: Arc::clone(&config),
            log_file: None,
        };

        info!(task = %id, "running task");
        let start = Instant::now();
        let result = task.execute(&ctx);
        let elapsed = start.elapsed();

        match result {
            Ok(()) => {
                info!(
                    task = %id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "task finished"
                );
                scheduler.complete(&id, TaskOutcome::Success, Some(elapsed), None);
            }
            Err(err) => {
                error!(
                    task = %id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %err,
                    "task failed; halting run"
                );
                scheduler.complete(&id, TaskOutcome::Failed(err), Some(elapsed), None);
                halted = true;
                break;
            }
        }
    }

    Ok(RunSummary::from_scheduler(&scheduler)
        .with_cancelled(cancelled)
        .with_halted(halted))
}
