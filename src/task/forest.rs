// src/task/forest.rs

use std::collections::HashMap;
use std::fmt;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::config::ConfigFile;
use crate::errors::{BatchdagError, Result};
use crate::task::{CommandTask, Task, TaskId};

/// One declared task plus the edges the arena owns for it.
pub struct ForestNode {
    pub task: Box<dyn Task>,
    /// Direct subtasks, in the order they were added.
    pub subtasks: Vec<TaskId>,
    /// The task this node is a subtask of, if any.
    pub parent: Option<TaskId>,
}

impl fmt::Debug for ForestNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForestNode")
            .field("id", &self.task.descriptor().id)
            .field("subtasks", &self.subtasks)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

/// Arena of every declared task, keyed by identity.
///
/// Subtask edges are owned here (a parent owns its subtasks); prerequisite
/// edges are plain identity references read from each task's descriptor.
/// Nothing holds a pointer to another node, so there are no ownership
/// cycles even when the dependency graph is being checked for them.
#[derive(Debug, Default)]
pub struct TaskForest {
    nodes: HashMap<TaskId, ForestNode>,
    /// Top-level tasks in declaration order.
    top_level: Vec<TaskId>,
}

impl TaskForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the forest of command tasks declared in a validated config.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut forest = TaskForest::new();

        for (name, tc) in cfg.task.iter() {
            let parent = forest.add_task(Box::new(CommandTask::from_config(name, tc)?))?;
            for (sub, sc) in tc.subtask.iter() {
                let task = CommandTask::from_subtask_config(name, tc, sub, sc)?;
                forest.add_subtask(&parent, Box::new(task))?;
            }
        }

        forest.check()?;
        Ok(forest)
    }

    /// Register a top-level task.
    pub fn add_task(&mut self, task: Box<dyn Task>) -> Result<TaskId> {
        let id = task.descriptor().id.clone();
        if id.is_subtask() {
            return Err(BatchdagError::ConfigError(format!(
                "top-level task '{id}' must not carry a subtask name"
            )));
        }
        self.insert(id.clone(), task, None)?;
        self.top_level.push(id.clone());
        Ok(id)
    }

    /// Register `task` as a subtask owned by `parent`.
    pub fn add_subtask(&mut self, parent: &TaskId, task: Box<dyn Task>) -> Result<TaskId> {
        if !self.nodes.contains_key(parent) {
            return Err(BatchdagError::UnknownTask(parent.to_string()));
        }
        let id = task.descriptor().id.clone();
        self.insert(id.clone(), task, Some(parent.clone()))?;
        if let Some(node) = self.nodes.get_mut(parent) {
            node.subtasks.push(id.clone());
        }
        Ok(id)
    }

    fn insert(&mut self, id: TaskId, task: Box<dyn Task>, parent: Option<TaskId>) -> Result<()> {
        if self.nodes.contains_key(&id) {
            return Err(BatchdagError::DuplicateTask(id));
        }
        debug!(task = %id, parent = ?parent.as_ref().map(|p| p.to_string()), "registered task");
        self.nodes.insert(
            id,
            ForestNode {
                task,
                subtasks: Vec::new(),
                parent,
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &TaskId) -> Option<&ForestNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &TaskId) -> Option<&mut ForestNode> {
        self.nodes.get_mut(id)
    }

    /// Top-level tasks in declaration order.
    pub fn top_level(&self) -> &[TaskId] {
        &self.top_level
    }

    pub fn subtasks_of(&self, id: &TaskId) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.subtasks.as_slice())
            .unwrap_or(&[])
    }

    pub fn prerequisites_of(&self, id: &TaskId) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.task.descriptor().prerequisites.as_slice())
            .unwrap_or(&[])
    }

    /// Prerequisites the resolver must settle before validating `id`: its
    /// own, plus those of its subtasks that are not themselves subtasks of
    /// `id` (sibling ordering is already guaranteed by the subtasks).
    pub fn effective_prerequisites(&self, id: &TaskId) -> Vec<TaskId> {
        let subtasks = self.subtasks_of(id);
        let mut out: Vec<TaskId> = Vec::new();

        for prereq in self.prerequisites_of(id) {
            if !out.contains(prereq) {
                out.push(prereq.clone());
            }
        }

        for sub in subtasks {
            for prereq in self.prerequisites_of(sub) {
                if !subtasks.contains(prereq) && prereq != id && !out.contains(prereq) {
                    out.push(prereq.clone());
                }
            }
        }

        out
    }

    /// Everything that must be `success` before `id` may run: its own
    /// prerequisites followed by its subtasks.
    pub fn dependencies_of(&self, id: &TaskId) -> Vec<TaskId> {
        let mut deps: Vec<TaskId> = self.prerequisites_of(id).to_vec();
        for sub in self.subtasks_of(id) {
            if !deps.contains(sub) {
                deps.push(sub.clone());
            }
        }
        deps
    }

    /// Remove a task from the arena, handing ownership to the caller.
    pub fn take_task(&mut self, id: &TaskId) -> Option<Box<dyn Task>> {
        self.nodes.remove(id).map(|node| node.task)
    }

    /// Check that every prerequisite reference resolves and that the
    /// combined prerequisite + subtask graph has no cycles.
    pub fn check(&self) -> Result<()> {
        let mut ids: Vec<&TaskId> = self.nodes.keys().collect();
        ids.sort();

        for id in ids.iter().copied() {
            for prereq in self.prerequisites_of(id) {
                if prereq == id {
                    return Err(BatchdagError::ConfigError(format!(
                        "task '{id}' cannot depend on itself"
                    )));
                }
                if !self.nodes.contains_key(prereq) {
                    return Err(BatchdagError::UnknownTask(format!(
                        "'{prereq}' (prerequisite of '{id}')"
                    )));
                }
            }
        }

        // Edge direction: dependency -> dependent.
        let mut graph: DiGraphMap<&TaskId, ()> = DiGraphMap::new();
        for id in ids.iter().copied() {
            graph.add_node(id);
        }
        for id in ids.iter().copied() {
            for prereq in self.prerequisites_of(id) {
                graph.add_edge(prereq, id, ());
            }
            for sub in self.subtasks_of(id) {
                graph.add_edge(sub, id, ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(BatchdagError::DagCycle(format!(
                "cycle detected in task graph involving task '{}'",
                cycle.node_id()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigView;
    use crate::errors::{ExecutionError, ValidationError};
    use crate::task::{ExecContext, TaskDescriptor};

    struct Noop(TaskDescriptor);

    impl Task for Noop {
        fn descriptor(&self) -> &TaskDescriptor {
            &self.0
        }
        fn validate(&mut self, _config: &ConfigView) -> std::result::Result<(), ValidationError> {
            Ok(())
        }
        fn execute(&self, _ctx: &ExecContext) -> std::result::Result<(), ExecutionError> {
            Ok(())
        }
    }

    fn noop(id: TaskId, after: &[TaskId]) -> Box<dyn Task> {
        let mut d = TaskDescriptor::new(id, "ocean");
        for a in after {
            d = d.after(a.clone());
        }
        Box::new(Noop(d))
    }

    #[test]
    fn subtask_prerequisites_on_siblings_are_not_lifted() {
        let mut forest = TaskForest::new();
        let parent = TaskId::new("sose");
        let remap = TaskId::subtask("sose", "remap");
        let plot = TaskId::subtask("sose", "plot");
        let clim = TaskId::new("climatology");

        forest.add_task(noop(clim.clone(), &[])).unwrap();
        forest.add_task(noop(parent.clone(), &[])).unwrap();
        forest
            .add_subtask(&parent, noop(remap.clone(), &[clim.clone()]))
            .unwrap();
        forest
            .add_subtask(&parent, noop(plot.clone(), &[remap.clone()]))
            .unwrap();

        assert_eq!(forest.effective_prerequisites(&parent), vec![clim]);
        assert_eq!(forest.dependencies_of(&parent), vec![remap, plot]);
        assert!(forest.check().is_ok());
    }

    #[test]
    fn duplicate_identity_is_rejected() {
        let mut forest = TaskForest::new();
        forest.add_task(noop(TaskId::new("a"), &[])).unwrap();
        let err = forest.add_task(noop(TaskId::new("a"), &[])).unwrap_err();
        assert!(matches!(err, BatchdagError::DuplicateTask(_)));
    }

    #[test]
    fn dangling_prerequisite_fails_check() {
        let mut forest = TaskForest::new();
        forest
            .add_task(noop(TaskId::new("a"), &[TaskId::new("missing")]))
            .unwrap();
        assert!(matches!(forest.check(), Err(BatchdagError::UnknownTask(_))));
    }

    #[test]
    fn subtask_depending_on_parent_is_a_cycle() {
        let mut forest = TaskForest::new();
        let parent = TaskId::new("p");
        forest.add_task(noop(parent.clone(), &[])).unwrap();
        forest
            .add_subtask(&parent, noop(TaskId::subtask("p", "s"), &[parent.clone()]))
            .unwrap();
        assert!(matches!(forest.check(), Err(BatchdagError::DagCycle(_))));
    }
}
