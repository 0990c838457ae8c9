// src/task/id.rs

use std::fmt;
use std::str::FromStr;

/// Globally unique identity of a task: a task name plus an optional subtask
/// name. Subtasks share their parent's task name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    pub task: String,
    pub subtask: Option<String>,
}

impl TaskId {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            subtask: None,
        }
    }

    pub fn subtask(task: impl Into<String>, subtask: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            subtask: Some(subtask.into()),
        }
    }

    pub fn is_subtask(&self) -> bool {
        self.subtask.is_some()
    }

    /// File-name friendly form, used for per-node log artifacts.
    pub fn log_stem(&self) -> String {
        match &self.subtask {
            Some(sub) => format!("{}_{}", self.task, sub),
            None => self.task.clone(),
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subtask {
            Some(sub) => write!(f, "{}:{}", self.task, sub),
            None => f.write_str(&self.task),
        }
    }
}

impl FromStr for TaskId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (task, subtask) = match s.split_once(':') {
            Some((task, sub)) => (task.trim(), Some(sub.trim())),
            None => (s, None),
        };

        if task.is_empty() {
            return Err(format!("invalid task identity {s:?}: empty task name"));
        }

        match subtask {
            Some("") => Err(format!("invalid task identity {s:?}: empty subtask name")),
            Some(sub) if sub.contains(':') => {
                Err(format!("invalid task identity {s:?}: more than one ':'"))
            }
            Some(sub) => Ok(TaskId::subtask(task, sub)),
            None => Ok(TaskId::new(task)),
        }
    }
}
