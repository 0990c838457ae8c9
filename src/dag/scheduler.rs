// src/dag/scheduler.rs

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dag::resolver::RunSet;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::dag::task_info::{FailureCause, NodeState};
use crate::engine::TaskOutcome;
use crate::task::TaskId;
use crate::types::RunStatus;

/// Scheduler holds the dependency edges of a run set plus per-node run
/// state.
///
/// It is a pure, synchronous state machine; both the parallel runtime and
/// the sequential loop drive it. It is responsible for:
/// - promoting `Blocked` nodes to `Ready` (or `Fail`) each tick
/// - dispatching `Ready` nodes in run-set order while worker slots remain
/// - recording completions reported by whoever executed a node
/// - failing everything not yet dispatched when the run is cancelled
#[derive(Debug)]
pub struct Scheduler {
    order: Vec<TaskId>,
    nodes: HashMap<TaskId, NodeState>,
    max_workers: usize,
}

impl Scheduler {
    /// Construct a scheduler over a resolved run set.
    pub fn new(run_set: &RunSet, max_workers: usize) -> Self {
        Self::from_dependencies(
            run_set
                .iter()
                .map(|node| (node.id.clone(), node.dependencies.clone())),
            max_workers,
        )
    }

    /// Construct a scheduler from `(node, dependencies)` pairs, in dispatch
    /// priority order.
    pub fn from_dependencies<I>(nodes: I, max_workers: usize) -> Self
    where
        I: IntoIterator<Item = (TaskId, Vec<TaskId>)>,
    {
        let mut order = Vec::new();
        let mut map = HashMap::new();

        for (id, deps) in nodes {
            if map.contains_key(&id) {
                warn!(task = %id, "duplicate node in scheduler input; keeping the first");
                continue;
            }
            order.push(id.clone());
            map.insert(id.clone(), NodeState::new(id, deps));
        }

        Self {
            order,
            nodes: map,
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn status_of(&self, id: &TaskId) -> Option<RunStatus> {
        self.nodes.get(id).map(|n| n.status)
    }

    pub fn node(&self, id: &TaskId) -> Option<&NodeState> {
        self.nodes.get(id)
    }

    /// Nodes in run-set order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeState> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn running_count(&self) -> usize {
        ReadOnlyStateManager::new(&self.nodes).running_count()
    }

    /// Every node is `Success` or `Fail`.
    pub fn is_quiescent(&self) -> bool {
        ReadOnlyStateManager::new(&self.nodes).all_terminal()
    }

    /// Failed nodes in run-set order.
    pub fn failed(&self) -> Vec<TaskId> {
        self.nodes()
            .filter(|n| n.status == RunStatus::Fail)
            .map(|n| n.id.clone())
            .collect()
    }

    /// One scheduling tick: re-evaluate blocked nodes, then (if allowed)
    /// dispatch ready nodes while fewer than `max_workers` are running.
    pub fn tick(&mut self, allow_dispatch: bool) -> SchedulerStep {
        let running = self.running_count();
        let slots = if allow_dispatch {
            self.max_workers.saturating_sub(running)
        } else {
            0
        };

        let mut manager = StateManager::new(&self.order, &mut self.nodes);
        let (newly_ready, newly_failed) = manager.promote_blocked();
        let dispatched = manager.dispatch_ready(slots);

        for id in &dispatched {
            info!(task = %id, "dispatching task");
        }

        SchedulerStep {
            newly_ready,
            newly_failed,
            dispatched,
            quiescent: self.is_quiescent(),
        }
    }

    /// Record the outcome of a running node. Reports for nodes that are not
    /// `Running` are ignored and `false` is returned.
    pub fn complete(
        &mut self,
        id: &TaskId,
        outcome: TaskOutcome,
        elapsed: Option<Duration>,
        log_file: Option<PathBuf>,
    ) -> bool {
        let Some(info) = self.nodes.get_mut(id) else {
            warn!(task = %id, "completion for unknown task; ignoring");
            return false;
        };

        if info.status != RunStatus::Running {
            warn!(
                task = %id,
                status = %info.status,
                "completion for task that is not running; ignoring"
            );
            return false;
        }

        info.elapsed = elapsed;
        info.log_file = log_file;
        match outcome {
            TaskOutcome::Success => {
                info.status = RunStatus::Success;
                debug!(task = %id, "task completed successfully");
            }
            TaskOutcome::Failed(err) => {
                info.fail(FailureCause::Execution(err.to_string()));
            }
        }
        true
    }

    /// Stop the run: every `Blocked` or `Ready` node becomes `Fail` with
    /// cause `Cancelled`. Running nodes are left to finish.
    pub fn cancel_pending(&mut self) -> Vec<TaskId> {
        let mut manager = StateManager::new(&self.order, &mut self.nodes);
        let cancelled = manager.cancel_pending();
        if !cancelled.is_empty() {
            warn!(count = cancelled.len(), "cancelled tasks that had not started");
        }
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExecutionError;

    fn id(s: &str) -> TaskId {
        TaskId::new(s)
    }

    fn chain() -> Scheduler {
        // a <- b <- c, and d independent
        Scheduler::from_dependencies(
            vec![
                (id("a"), vec![]),
                (id("b"), vec![id("a")]),
                (id("c"), vec![id("b")]),
                (id("d"), vec![]),
            ],
            2,
        )
    }

    #[test]
    fn initial_states_follow_dependencies() {
        let s = chain();
        assert_eq!(s.status_of(&id("a")), Some(RunStatus::Ready));
        assert_eq!(s.status_of(&id("b")), Some(RunStatus::Blocked));
        assert_eq!(s.status_of(&id("d")), Some(RunStatus::Ready));
    }

    #[test]
    fn dispatch_respects_worker_bound_and_order() {
        let mut s = Scheduler::from_dependencies(
            vec![(id("x"), vec![]), (id("y"), vec![]), (id("z"), vec![])],
            2,
        );
        let step = s.tick(true);
        assert_eq!(step.dispatched, vec![id("x"), id("y")]);
        assert_eq!(s.running_count(), 2);

        // No free slot: nothing more goes out.
        assert!(s.tick(true).dispatched.is_empty());

        s.complete(&id("x"), TaskOutcome::Success, None, None);
        assert_eq!(s.tick(true).dispatched, vec![id("z")]);
    }

    #[test]
    fn failure_poisons_whole_chain_in_one_tick() {
        let mut s = chain();
        s.tick(true);
        s.complete(
            &id("a"),
            TaskOutcome::Failed(ExecutionError::Failed("bad".into())),
            None,
            None,
        );

        let step = s.tick(true);
        assert_eq!(step.newly_failed, vec![id("b"), id("c")]);
        assert_eq!(
            s.node(&id("c")).and_then(|n| n.failure.clone()),
            Some(FailureCause::Dependency(id("b")))
        );
        assert_eq!(s.failed(), vec![id("a"), id("b"), id("c")]);
    }

    #[test]
    fn stale_completion_is_ignored() {
        let mut s = chain();
        assert!(!s.complete(&id("b"), TaskOutcome::Success, None, None));
        assert!(!s.complete(&id("nope"), TaskOutcome::Success, None, None));
    }

    #[test]
    fn cancel_fails_pending_but_keeps_running() {
        let mut s = chain();
        s.tick(true);
        let cancelled = s.cancel_pending();
        assert_eq!(cancelled, vec![id("b"), id("c")]);
        assert_eq!(s.status_of(&id("a")), Some(RunStatus::Running));
        assert!(!s.is_quiescent());

        s.complete(&id("a"), TaskOutcome::Success, None, None);
        s.complete(&id("d"), TaskOutcome::Success, None, None);
        assert!(s.tick(false).quiescent);
    }

    #[test]
    fn missing_dependency_counts_as_failed() {
        let mut s = Scheduler::from_dependencies(vec![(id("a"), vec![id("ghost")])], 1);
        let step = s.tick(true);
        assert_eq!(step.newly_failed, vec![id("a")]);
        assert!(step.quiescent);
    }
}
