// src/task/mod.rs

//! The unit of schedulable work.
//!
//! - [`id`] defines [`TaskId`], the `(task, subtask)` identity.
//! - [`forest`] is the arena that owns every declared task and the subtask
//!   edges between them; prerequisites are stored as identities only.
//! - [`command`] is the concrete task type declared in the TOML config.
//!
//! Anything implementing [`Task`] can be placed in a [`TaskForest`]; the
//! resolver and scheduler never look past this trait.

pub mod command;
pub mod forest;
pub mod id;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ConfigView;
use crate::errors::{ExecutionError, ValidationError};
use crate::selection::Selection;

pub use command::CommandTask;
pub use forest::{ForestNode, TaskForest};
pub use id::TaskId;

/// Static description of a task: who it is and what it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub id: TaskId,
    /// Grouping label, e.g. the subsystem a task belongs to.
    pub component: String,
    pub tags: BTreeSet<String>,
    /// Tasks that must finish successfully before this one may run.
    pub prerequisites: Vec<TaskId>,
}

impl TaskDescriptor {
    pub fn new(id: TaskId, component: impl Into<String>) -> Self {
        Self {
            id,
            component: component.into(),
            tags: BTreeSet::new(),
            prerequisites: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn after(mut self, prerequisite: TaskId) -> Self {
        if !self.prerequisites.contains(&prerequisite) {
            self.prerequisites.push(prerequisite);
        }
        self
    }
}

/// Everything a task may touch while executing.
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub id: TaskId,
    pub config: Arc<ConfigView>,
    /// Where the task's output goes when it runs in an isolated worker.
    /// `None` in sequential mode: output is inherited from the process.
    pub log_file: Option<PathBuf>,
}

/// Lifecycle contract every schedulable task implements.
///
/// `validate` is called at most once, during resolution, and may
/// materialize derived state from the configuration. `execute` is called
/// at most once, by the scheduler, and only after `validate` succeeded and
/// every prerequisite and subtask finished successfully.
pub trait Task: Send + Sync {
    fn descriptor(&self) -> &TaskDescriptor;

    /// Whether the selection language asks for this task.
    fn wants(&self, selection: &Selection) -> bool {
        selection.wants(self.descriptor())
    }

    fn validate(&mut self, config: &ConfigView) -> Result<(), ValidationError>;

    fn execute(&self, ctx: &ExecContext) -> Result<(), ExecutionError>;
}
