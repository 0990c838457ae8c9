// src/dag/resolver.rs

//! Turns the declared forest into the run set.
//!
//! A single memoized walk over the forest:
//! - top-level tasks are only entered if the selection wants them;
//! - prerequisites and subtasks are pulled in regardless of selection;
//! - every node is validated at most once, behind a panic barrier;
//! - a failed prerequisite or subtask fails its dependent without calling
//!   the dependent's `validate()`.
//!
//! Nodes that end with `SetupStatus::Success` are moved out of the forest
//! into the [`RunSet`], in the order they became resolvable.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::ConfigView;
use crate::errors::{BatchdagError, Result, ValidationError};
use crate::exec::worker::panic_message;
use crate::selection::Selection;
use crate::task::{Task, TaskForest, TaskId};
use crate::types::SetupStatus;

/// A resolved node, ready to be handed to the scheduler.
pub struct RunNode {
    pub id: TaskId,
    pub component: String,
    pub tags: BTreeSet<String>,
    /// Prerequisites followed by subtasks; all present in the same run set.
    pub dependencies: Vec<TaskId>,
    pub subtasks: Vec<TaskId>,
    pub task: Arc<dyn Task>,
}

impl fmt::Debug for RunNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunNode")
            .field("id", &self.id)
            .field("component", &self.component)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Insertion-ordered map of identity to resolved node.
#[derive(Debug, Default)]
pub struct RunSet {
    order: Vec<TaskId>,
    nodes: HashMap<TaskId, RunNode>,
}

impl RunSet {
    fn insert(&mut self, node: RunNode) {
        if !self.nodes.contains_key(&node.id) {
            self.order.push(node.id.clone());
        }
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &TaskId) -> Option<&RunNode> {
        self.nodes.get(id)
    }

    /// Identities in insertion order.
    pub fn ids(&self) -> &[TaskId] {
        &self.order
    }

    /// Nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &RunNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Hand the task objects over to the executor side.
    pub fn tasks(&self) -> HashMap<TaskId, Arc<dyn Task>> {
        self.nodes
            .iter()
            .map(|(id, node)| (id.clone(), Arc::clone(&node.task)))
            .collect()
    }
}

/// Why a node ended with `SetupStatus::Fail`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupCause {
    Validation(ValidationError),
    Prerequisite(TaskId),
    Subtask(TaskId),
    Unknown,
}

impl fmt::Display for SetupCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupCause::Validation(e) => write!(f, "{e}"),
            SetupCause::Prerequisite(id) => write!(f, "prerequisite {id} failed"),
            SetupCause::Subtask(id) => write!(f, "subtask {id} failed"),
            SetupCause::Unknown => f.write_str("task is not declared"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupFailure {
    pub id: TaskId,
    pub cause: SetupCause,
}

/// Result of one resolution pass.
#[derive(Debug)]
pub struct Resolution {
    pub run_set: RunSet,
    setup: HashMap<TaskId, SetupStatus>,
    /// Every visited node in the order its status was decided.
    decided: Vec<TaskId>,
    failures: Vec<SetupFailure>,
}

impl Resolution {
    /// `Unattempted` for nodes the walk never reached.
    pub fn setup_status(&self, id: &TaskId) -> SetupStatus {
        self.setup.get(id).copied().unwrap_or_default()
    }

    /// `(id, status)` for every visited node, in decision order.
    pub fn setup_statuses(&self) -> impl Iterator<Item = (&TaskId, SetupStatus)> {
        self.decided.iter().map(|id| (id, self.setup_status(id)))
    }

    pub fn setup_failures(&self) -> &[SetupFailure] {
        &self.failures
    }

    /// Fail the run if nothing survived resolution.
    pub fn ensure_any_valid(&self) -> Result<()> {
        if self.run_set.is_empty() {
            return Err(BatchdagError::NoValidTasks);
        }
        Ok(())
    }
}

/// Graph resolver: selection + validation walk over a [`TaskForest`].
pub struct Resolver<'a> {
    selection: &'a Selection,
    config: &'a ConfigView,
}

impl<'a> Resolver<'a> {
    pub fn new(selection: &'a Selection, config: &'a ConfigView) -> Self {
        Self { selection, config }
    }

    /// Resolve the forest into a run set. Fails only if the forest itself is
    /// malformed (dangling references or cycles); task-level problems are
    /// recorded as setup failures.
    pub fn resolve(&self, mut forest: TaskForest) -> Result<Resolution> {
        forest.check()?;

        let mut walk = Walk {
            forest: &mut forest,
            selection: self.selection,
            config: self.config,
            setup: HashMap::new(),
            decided: Vec::new(),
            included: Vec::new(),
            failures: Vec::new(),
        };

        let top_level = walk.forest.top_level().to_vec();
        for id in top_level.iter() {
            walk.visit(id, true);
        }

        let Walk {
            setup,
            decided,
            included,
            failures,
            ..
        } = walk;

        let run_set = build_run_set(&mut forest, &included);

        info!(
            declared = top_level.len(),
            runnable = run_set.len(),
            setup_failures = failures.len(),
            "resolution finished"
        );

        Ok(Resolution {
            run_set,
            setup,
            decided,
            failures,
        })
    }
}

struct Walk<'f, 'a> {
    forest: &'f mut TaskForest,
    selection: &'a Selection,
    config: &'a ConfigView,
    setup: HashMap<TaskId, SetupStatus>,
    decided: Vec<TaskId>,
    included: Vec<TaskId>,
    failures: Vec<SetupFailure>,
}

impl Walk<'_, '_> {
    fn visit(&mut self, id: &TaskId, top_level: bool) -> SetupStatus {
        if let Some(status) = self.setup.get(id) {
            return *status;
        }

        let Some(node) = self.forest.get(id) else {
            return self.fail(id, SetupCause::Unknown);
        };

        if top_level && !node.task.wants(self.selection) {
            debug!(task = %id, "not selected; skipping");
            return SetupStatus::Unattempted;
        }

        for prereq in self.forest.effective_prerequisites(id) {
            if self.visit(&prereq, false) != SetupStatus::Success {
                return self.fail(id, SetupCause::Prerequisite(prereq));
            }
        }

        if let Err(e) = self.validate(id) {
            return self.fail(id, SetupCause::Validation(e));
        }

        let subtasks = self.forest.subtasks_of(id).to_vec();
        for sub in subtasks {
            if self.visit(&sub, false) != SetupStatus::Success {
                return self.fail(id, SetupCause::Subtask(sub));
            }
        }

        debug!(task = %id, "setup succeeded");
        self.record(id, SetupStatus::Success);
        self.included.push(id.clone());
        SetupStatus::Success
    }

    fn validate(&mut self, id: &TaskId) -> std::result::Result<(), ValidationError> {
        let config = self.config;
        let Some(node) = self.forest.get_mut(id) else {
            return Err(ValidationError::Failed(format!("task '{id}' vanished")));
        };

        match catch_unwind(AssertUnwindSafe(|| node.task.validate(config))) {
            Ok(result) => result,
            Err(panic) => Err(ValidationError::Failed(format!(
                "validate panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    }

    fn fail(&mut self, id: &TaskId, cause: SetupCause) -> SetupStatus {
        match &cause {
            SetupCause::Validation(_) | SetupCause::Unknown => {
                error!(task = %id, cause = %cause, "task failed during setup and will not run");
            }
            SetupCause::Prerequisite(_) | SetupCause::Subtask(_) => {
                warn!(task = %id, cause = %cause, "task will not run");
            }
        }
        self.record(id, SetupStatus::Fail);
        self.failures.push(SetupFailure {
            id: id.clone(),
            cause,
        });
        SetupStatus::Fail
    }

    fn record(&mut self, id: &TaskId, status: SetupStatus) {
        self.setup.insert(id.clone(), status);
        self.decided.push(id.clone());
    }
}

fn build_run_set(forest: &mut TaskForest, included: &[TaskId]) -> RunSet {
    // Read edges before any node leaves the arena.
    let edges: Vec<(Vec<TaskId>, Vec<TaskId>)> = included
        .iter()
        .map(|id| {
            (
                forest.dependencies_of(id),
                forest.subtasks_of(id).to_vec(),
            )
        })
        .collect();

    let mut run_set = RunSet::default();
    for (id, (dependencies, subtasks)) in included.iter().zip(edges) {
        let Some(task) = forest.take_task(id) else {
            continue;
        };
        let descriptor = task.descriptor();
        let component = descriptor.component.clone();
        let tags = descriptor.tags.clone();
        run_set.insert(RunNode {
            id: id.clone(),
            component,
            tags,
            dependencies,
            subtasks,
            task: Arc::from(task),
        });
    }
    run_set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExecutionError;
    use crate::task::{ExecContext, TaskDescriptor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counted {
        d: TaskDescriptor,
        validations: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Task for Counted {
        fn descriptor(&self) -> &TaskDescriptor {
            &self.d
        }
        fn validate(&mut self, _: &ConfigView) -> std::result::Result<(), ValidationError> {
            self.validations.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ValidationError::Failed("boom".into()))
            } else {
                Ok(())
            }
        }
        fn execute(&self, _: &ExecContext) -> std::result::Result<(), ExecutionError> {
            Ok(())
        }
    }

    fn counted(d: TaskDescriptor, n: &Arc<AtomicUsize>, fail: bool) -> Box<dyn Task> {
        Box::new(Counted {
            d,
            validations: Arc::clone(n),
            fail,
        })
    }

    #[test]
    fn shared_prerequisite_is_validated_once() {
        let n = Arc::new(AtomicUsize::new(0));
        let base = TaskId::new("base");
        let mut forest = TaskForest::new();
        forest
            .add_task(counted(TaskDescriptor::new(base.clone(), "ocean"), &n, false))
            .unwrap();
        for name in ["a", "b", "c"] {
            forest
                .add_task(counted(
                    TaskDescriptor::new(TaskId::new(name), "ocean").after(base.clone()),
                    &Arc::new(AtomicUsize::new(0)),
                    false,
                ))
                .unwrap();
        }

        let sel = Selection::parse(["all"]);
        let view = ConfigView::default();
        let res = Resolver::new(&sel, &view).resolve(forest).unwrap();

        assert_eq!(n.load(Ordering::SeqCst), 1);
        assert_eq!(res.run_set.ids()[0], base);
        assert_eq!(res.run_set.len(), 4);
    }

    #[test]
    fn failed_subtask_fails_parent_after_parent_validated() {
        let parent_n = Arc::new(AtomicUsize::new(0));
        let parent = TaskId::new("p");
        let mut forest = TaskForest::new();
        forest
            .add_task(counted(TaskDescriptor::new(parent.clone(), "ocean"), &parent_n, false))
            .unwrap();
        forest
            .add_subtask(
                &parent,
                counted(
                    TaskDescriptor::new(TaskId::subtask("p", "s"), "ocean"),
                    &Arc::new(AtomicUsize::new(0)),
                    true,
                ),
            )
            .unwrap();

        let sel = Selection::parse(["all"]);
        let view = ConfigView::default();
        let res = Resolver::new(&sel, &view).resolve(forest).unwrap();

        assert_eq!(parent_n.load(Ordering::SeqCst), 1);
        assert_eq!(res.setup_status(&parent), SetupStatus::Fail);
        assert!(res.run_set.is_empty());
        assert!(matches!(res.ensure_any_valid(), Err(BatchdagError::NoValidTasks)));
        assert_eq!(
            res.setup_failures().last().map(|f| &f.cause),
            Some(&SetupCause::Subtask(TaskId::subtask("p", "s")))
        );
    }
}
