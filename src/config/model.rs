// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::view::ConfigView;
use crate::errors::{BatchdagError, Result};
use crate::selection::Selection;
use crate::types::{ExecutionMode, ReportStyle};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [execute]
/// parallel_task_count = 4
///
/// [output]
/// base_directory = "analysis_out"
/// generate = ["all", "no_sose"]
///
/// [task.climatologyMapSst]
/// component = "ocean"
/// tags = ["climatology", "sst"]
/// cmd = "plot_sst ${climatologyMapSst.seasons}"
/// after = ["mpasClimatology"]
///
/// [climatologyMapSst]
/// seasons = ["JFM", "JAS"]
/// ```
///
/// `[execute]`, `[output]` and `[task.*]` are reserved; every other table is
/// an opaque option section made available to tasks through [`ConfigView`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub execute: ExecuteSection,

    #[serde(default)]
    pub output: OutputSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Every other top-level table.
    #[serde(flatten)]
    pub options: toml::Table,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub execute: ExecuteSection,
    pub output: OutputSection,
    pub task: BTreeMap<String, TaskConfig>,
    pub options: toml::Table,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        execute: ExecuteSection,
        output: OutputSection,
        task: BTreeMap<String, TaskConfig>,
        options: toml::Table,
    ) -> Self {
        Self {
            execute,
            output,
            task,
            options,
        }
    }

    /// Selection tokens from `[output].generate`.
    pub fn selection(&self) -> Selection {
        Selection::parse(&self.output.generate)
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::from_task_count(self.execute.parallel_task_count)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.execute.poll_interval_ms)
    }

    /// Directory holding per-task log files of isolated workers.
    pub fn log_directory(&self) -> PathBuf {
        PathBuf::from(&self.output.base_directory).join(&self.output.log_subdirectory)
    }

    /// Opaque option store handed to tasks. Includes `[execute]` and
    /// `[output]` so tasks can refer to e.g. `${output.base_directory}`.
    pub fn view(&self) -> Result<ConfigView> {
        let mut table = self.options.clone();
        let execute = toml::Value::try_from(&self.execute)
            .map_err(|e| BatchdagError::ConfigError(format!("[execute]: {e}")))?;
        let output = toml::Value::try_from(&self.output)
            .map_err(|e| BatchdagError::ConfigError(format!("[output]: {e}")))?;
        table.insert("execute".to_string(), execute);
        table.insert("output".to_string(), output);
        Ok(ConfigView::new(table))
    }
}

/// `[execute]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecuteSection {
    /// Maximum number of tasks running at once. `1` runs everything
    /// in-process, one task at a time, stopping at the first failure.
    #[serde(default = "default_parallel_task_count")]
    pub parallel_task_count: usize,

    /// How long the coordinator waits for a worker before checking for
    /// cancellation again.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_parallel_task_count() -> usize {
    1
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for ExecuteSection {
    fn default() -> Self {
        Self {
            parallel_task_count: default_parallel_task_count(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputSection {
    #[serde(default = "default_base_directory")]
    pub base_directory: String,

    #[serde(default = "default_log_subdirectory")]
    pub log_subdirectory: String,

    /// Selection language tokens; see [`crate::selection`].
    #[serde(default = "default_generate")]
    pub generate: Vec<String>,

    #[serde(default, skip_serializing)]
    pub report: ReportStyle,
}

fn default_base_directory() -> String {
    ".".to_string()
}

fn default_log_subdirectory() -> String {
    "logs".to_string()
}

fn default_generate() -> Vec<String> {
    vec!["all".to_string()]
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            base_directory: default_base_directory(),
            log_subdirectory: default_log_subdirectory(),
            generate: default_generate(),
            report: ReportStyle::default(),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskConfig {
    /// Grouping label matched by `all_<component>`.
    #[serde(default = "default_component")]
    pub component: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Shell command; `${section.option}` placeholders are filled in during
    /// validation. Empty means the task only groups its subtasks.
    #[serde(default)]
    pub cmd: String,

    /// Prerequisites, as `task` or `task:subtask` identities.
    #[serde(default)]
    pub after: Vec<String>,

    /// `section.option` entries that must exist for the task to be valid.
    #[serde(default)]
    pub requires: Vec<String>,

    /// Paths (placeholders allowed) that must exist for the task to be valid.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Subtasks from `[task.<name>.subtask.<sub>]`.
    #[serde(default)]
    pub subtask: BTreeMap<String, SubtaskConfig>,
}

fn default_component() -> String {
    "default".to_string()
}

/// `[task.<name>.subtask.<sub>]` section. Inherits the parent's component
/// and tags.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SubtaskConfig {
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub cmd: String,

    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub requires: Vec<String>,

    #[serde(default)]
    pub inputs: Vec<String>,
}
