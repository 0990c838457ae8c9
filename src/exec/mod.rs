// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] provides the `ExecutorBackend` trait the parallel runtime
//!   dispatches through, plus the [`Job`] it hands over.
//! - [`worker`] is the production backend: a worker per job on tokio's
//!   blocking pool, behind a panic barrier.
//! - [`process`] starts a worker's child process and is the entry point
//!   that child runs.
//! - [`command`] runs shell commands for config-declared tasks.

pub mod backend;
pub mod command;
pub mod process;
pub mod worker;

pub use backend::{ExecutorBackend, Job};
pub use command::run_shell;
pub use process::{WORKER_TASK_ENV, WorkerCommand, execute_in_worker, worker_task_from_env};
pub use worker::{Isolation, WorkerPool, panic_message, run_job};
