// src/dag/state_manager.rs

//! Run-state transitions for nodes in the scheduler.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::dag::task_info::{FailureCause, NodeState};
use crate::task::TaskId;
use crate::types::RunStatus;

/// What the dependencies of a blocked node currently allow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepsState {
    AllSucceeded,
    Failed(TaskId),
    Waiting,
}

/// Applies state transitions to the node map, visiting nodes in run-set
/// order so results are deterministic.
pub struct StateManager<'a> {
    order: &'a [TaskId],
    nodes: &'a mut HashMap<TaskId, NodeState>,
}

impl<'a> StateManager<'a> {
    pub fn new(order: &'a [TaskId], nodes: &'a mut HashMap<TaskId, NodeState>) -> Self {
        Self { order, nodes }
    }

    /// Apply `Blocked -> Ready` and `Blocked -> Fail` until nothing changes,
    /// so a failure propagates down a whole chain in a single tick.
    ///
    /// Returns `(newly_ready, newly_failed)`.
    pub fn promote_blocked(&mut self) -> (Vec<TaskId>, Vec<TaskId>) {
        let mut ready = Vec::new();
        let mut failed = Vec::new();

        loop {
            let mut changed = false;

            for id in self.order {
                let Some(info) = self.nodes.get(id) else {
                    continue;
                };
                if info.status != RunStatus::Blocked {
                    continue;
                }

                let deps = ReadOnlyStateManager::new(self.nodes).deps_state(info);
                match deps {
                    DepsState::AllSucceeded => {
                        if let Some(info) = self.nodes.get_mut(id) {
                            info.status = RunStatus::Ready;
                            debug!(task = %id, "dependencies satisfied; marking Ready");
                        }
                        ready.push(id.clone());
                        changed = true;
                    }
                    DepsState::Failed(dep) => {
                        if let Some(info) = self.nodes.get_mut(id) {
                            warn!(
                                task = %id,
                                dependency = %dep,
                                "dependency failed; task will not run"
                            );
                            info.fail(FailureCause::Dependency(dep));
                        }
                        failed.push(id.clone());
                        changed = true;
                    }
                    DepsState::Waiting => {}
                }
            }

            if !changed {
                break;
            }
        }

        (ready, failed)
    }

    /// Move up to `slots` ready nodes to `Running`, in run-set order.
    pub fn dispatch_ready(&mut self, slots: usize) -> Vec<TaskId> {
        let mut dispatched = Vec::new();
        if slots == 0 {
            return dispatched;
        }

        for id in self.order {
            if dispatched.len() >= slots {
                break;
            }
            if let Some(info) = self.nodes.get_mut(id) {
                if info.status == RunStatus::Ready {
                    info.status = RunStatus::Running;
                    debug!(task = %id, "marking Running");
                    dispatched.push(id.clone());
                }
            }
        }

        dispatched
    }

    /// Fail every node that has not been dispatched yet.
    pub fn cancel_pending(&mut self) -> Vec<TaskId> {
        let mut cancelled = Vec::new();
        for id in self.order {
            if let Some(info) = self.nodes.get_mut(id) {
                if matches!(info.status, RunStatus::Blocked | RunStatus::Ready) {
                    info.fail(FailureCause::Cancelled);
                    cancelled.push(id.clone());
                }
            }
        }
        cancelled
    }
}

/// Read-only queries over the node map.
pub struct ReadOnlyStateManager<'a> {
    nodes: &'a HashMap<TaskId, NodeState>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(nodes: &'a HashMap<TaskId, NodeState>) -> Self {
        Self { nodes }
    }

    /// Classify the dependencies of `info`. A dependency missing from the
    /// map counts as failed, so nothing can wait on it forever.
    pub fn deps_state(&self, info: &NodeState) -> DepsState {
        let mut waiting = false;

        for dep_id in &info.deps {
            match self.nodes.get(dep_id).map(|d| d.status) {
                Some(RunStatus::Success) => {}
                Some(RunStatus::Fail) => return DepsState::Failed(dep_id.clone()),
                Some(RunStatus::Blocked | RunStatus::Ready | RunStatus::Running) => {
                    waiting = true;
                }
                None => {
                    warn!(
                        task = %info.id,
                        dep = %dep_id,
                        "dependency missing from run set"
                    );
                    return DepsState::Failed(dep_id.clone());
                }
            }
        }

        if waiting {
            DepsState::Waiting
        } else {
            DepsState::AllSucceeded
        }
    }

    pub fn running_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| n.status == RunStatus::Running)
            .count()
    }

    /// Check if all nodes are in a terminal state.
    pub fn all_terminal(&self) -> bool {
        self.nodes.values().all(|n| n.status.is_terminal())
    }
}
