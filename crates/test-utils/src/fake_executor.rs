// crates/test-utils/src/fake_executor.rs

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use batchdag::engine::{TaskOutcome, WorkerReport};
use batchdag::errors::{ExecutionError, Result};
use batchdag::exec::{ExecutorBackend, Job};
use batchdag::task::TaskId;

/// A fake executor that:
/// - records which nodes were dispatched, batch by batch
/// - never calls `execute()`
/// - immediately reports success, or failure for ids marked failing.
pub struct FakeExecutor {
    report_tx: mpsc::Sender<WorkerReport>,
    batches: Arc<Mutex<Vec<Vec<TaskId>>>>,
    failing: HashSet<TaskId>,
}

impl FakeExecutor {
    pub fn new(report_tx: mpsc::Sender<WorkerReport>) -> Self {
        Self {
            report_tx,
            batches: Arc::new(Mutex::new(Vec::new())),
            failing: HashSet::new(),
        }
    }

    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.parse().expect("valid task identity"));
        self
    }

    /// Handle to the recorded dispatch batches.
    pub fn batches(&self) -> Arc<Mutex<Vec<Vec<TaskId>>>> {
        Arc::clone(&self.batches)
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        jobs: Vec<Job>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.report_tx.clone();
        let batches = Arc::clone(&self.batches);
        let failing = self.failing.clone();

        Box::pin(async move {
            {
                let mut guard = batches.lock().unwrap();
                guard.push(jobs.iter().map(|j| j.id.clone()).collect());
            }

            for job in jobs {
                let outcome = if failing.contains(&job.id) {
                    TaskOutcome::Failed(ExecutionError::Failed("fake failure".to_string()))
                } else {
                    TaskOutcome::Success
                };
                tx.send(WorkerReport {
                    id: job.id,
                    outcome,
                    elapsed: None,
                    log_file: job.ctx.log_file,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
