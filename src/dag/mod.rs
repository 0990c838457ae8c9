// src/dag/mod.rs

//! Dependency resolution and scheduling.
//!
//! - [`resolver`] walks the task forest and produces the [`RunSet`].
//! - [`scheduler`] contains the per-node state machine that decides which
//!   nodes are ready, which fail because of a dependency, and which to
//!   dispatch next.
//! - [`task_info`] provides per-node state and failure causes.
//! - [`scheduler_step`] defines the result type for scheduler ticks.
//! - [`state_manager`] implements the individual state transitions.

pub mod resolver;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use resolver::{Resolution, Resolver, RunNode, RunSet, SetupCause, SetupFailure};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{FailureCause, NodeState};
