// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The parallel runtime talks to an `ExecutorBackend` instead of spawning
//! work itself. This makes it easy to swap in a fake executor in tests while
//! keeping the production worker pool in [`worker`](super::worker).
//!
//! Whatever the backend does, it must eventually deliver exactly one
//! [`WorkerReport`](crate::engine::WorkerReport) per dispatched job on the
//! report channel it was constructed with, or the runtime will wait forever.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::Result;
use crate::task::{ExecContext, Task, TaskId};

/// One unit of dispatched work. The worker owns it for the duration of the
/// execution.
#[derive(Clone)]
pub struct Job {
    pub id: TaskId,
    pub task: Arc<dyn Task>,
    pub ctx: ExecContext,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("log_file", &self.ctx.log_file)
            .finish_non_exhaustive()
    }
}

/// Trait abstracting how dispatched jobs are executed.
///
/// Production code uses [`WorkerPool`](super::WorkerPool); tests can provide
/// their own implementation that doesn't run anything.
pub trait ExecutorBackend: Send {
    /// Start executing the given jobs. Must not wait for them to finish.
    fn spawn_ready_tasks(
        &mut self,
        jobs: Vec<Job>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
