// src/dag/task_info.rs

//! Per-node scheduling state.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::task::TaskId;
use crate::types::RunStatus;

/// Why a node ended in `RunStatus::Fail`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The node's own `execute()` failed.
    Execution(String),
    /// A prerequisite or subtask failed first.
    Dependency(TaskId),
    /// The run was cancelled before the node was dispatched.
    Cancelled,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Execution(msg) => f.write_str(msg),
            FailureCause::Dependency(id) => write!(f, "dependency {id} failed"),
            FailureCause::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Static dependencies of a node plus its mutable run state.
#[derive(Debug, Clone)]
pub struct NodeState {
    pub id: TaskId,
    /// Prerequisites and subtasks that must reach `Success` first.
    pub deps: Vec<TaskId>,
    pub status: RunStatus,
    pub failure: Option<FailureCause>,
    /// Wall-clock time spent in `execute()`.
    pub elapsed: Option<Duration>,
    /// Log artifact written by an isolated worker, if any.
    pub log_file: Option<PathBuf>,
}

impl NodeState {
    /// Nodes without dependencies start out `Ready`, the rest `Blocked`.
    pub fn new(id: TaskId, deps: Vec<TaskId>) -> Self {
        let status = if deps.is_empty() {
            RunStatus::Ready
        } else {
            RunStatus::Blocked
        };
        Self {
            id,
            deps,
            status,
            failure: None,
            elapsed: None,
            log_file: None,
        }
    }

    pub fn fail(&mut self, cause: FailureCause) {
        self.status = RunStatus::Fail;
        self.failure = Some(cause);
    }
}
