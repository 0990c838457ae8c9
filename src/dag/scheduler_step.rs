// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::task::TaskId;

/// Structured result of a single scheduler tick.
///
/// Useful for tests that step the state machine by hand and make assertions
/// about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Nodes that moved `Blocked -> Ready` in this tick.
    pub newly_ready: Vec<TaskId>,
    /// Nodes that moved `Blocked -> Fail` because a dependency failed.
    pub newly_failed: Vec<TaskId>,
    /// Nodes that moved `Ready -> Running`; the caller must execute them.
    pub dispatched: Vec<TaskId>,
    /// Whether every node is now terminal.
    pub quiescent: bool,
}
