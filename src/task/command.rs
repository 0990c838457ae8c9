// src/task/command.rs

//! Tasks declared in the TOML config: a shell command plus the options and
//! input files it needs.

use std::path::PathBuf;

use tracing::debug;

use crate::config::view::split_key;
use crate::config::{ConfigView, SubtaskConfig, TaskConfig};
use crate::errors::{BatchdagError, ExecutionError, Result, ValidationError};
use crate::exec::command::run_shell;
use crate::task::{ExecContext, Task, TaskDescriptor, TaskId};

/// Command and inputs after placeholders were filled in.
#[derive(Debug, Clone)]
struct Materialized {
    cmd: String,
    inputs: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CommandTask {
    descriptor: TaskDescriptor,
    cmd: String,
    requires: Vec<String>,
    inputs: Vec<String>,
    materialized: Option<Materialized>,
}

impl CommandTask {
    pub fn new(descriptor: TaskDescriptor, cmd: impl Into<String>) -> Self {
        Self {
            descriptor,
            cmd: cmd.into(),
            requires: Vec::new(),
            inputs: Vec::new(),
            materialized: None,
        }
    }

    pub fn with_requires<I, S>(mut self, requires: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(requires.into_iter().map(Into::into));
        self
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(inputs.into_iter().map(Into::into));
        self
    }

    /// Build a top-level task from `[task.<name>]`.
    pub fn from_config(name: &str, cfg: &TaskConfig) -> Result<Self> {
        let id = TaskId::new(name);
        let descriptor = descriptor_for(id, &cfg.component, &cfg.tags, &cfg.after)?;
        Ok(Self::new(descriptor, cfg.cmd.clone())
            .with_requires(cfg.requires.iter().cloned())
            .with_inputs(cfg.inputs.iter().cloned()))
    }

    /// Build a subtask from `[task.<parent>.subtask.<name>]`; component and
    /// tags are inherited from the parent.
    pub fn from_subtask_config(
        parent: &str,
        parent_cfg: &TaskConfig,
        name: &str,
        cfg: &SubtaskConfig,
    ) -> Result<Self> {
        let id = TaskId::subtask(parent, name);
        let tags: Vec<String> = parent_cfg.tags.iter().chain(cfg.tags.iter()).cloned().collect();
        let descriptor = descriptor_for(id, &parent_cfg.component, &tags, &cfg.after)?;
        Ok(Self::new(descriptor, cfg.cmd.clone())
            .with_requires(cfg.requires.iter().cloned())
            .with_inputs(cfg.inputs.iter().cloned()))
    }

    /// The command as it will run, once validated.
    pub fn resolved_cmd(&self) -> Option<&str> {
        self.materialized.as_ref().map(|m| m.cmd.as_str())
    }

    /// Input paths checked during validation.
    pub fn resolved_inputs(&self) -> &[PathBuf] {
        self.materialized
            .as_ref()
            .map(|m| m.inputs.as_slice())
            .unwrap_or(&[])
    }
}

fn descriptor_for(
    id: TaskId,
    component: &str,
    tags: &[String],
    after: &[String],
) -> Result<TaskDescriptor> {
    let mut descriptor = TaskDescriptor::new(id, component).with_tags(tags.iter().cloned());
    for dep in after {
        let dep_id = dep.parse::<TaskId>().map_err(|e| {
            BatchdagError::ConfigError(format!("task '{}': {e}", descriptor.id))
        })?;
        descriptor = descriptor.after(dep_id);
    }
    Ok(descriptor)
}

impl Task for CommandTask {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    fn validate(&mut self, config: &ConfigView) -> std::result::Result<(), ValidationError> {
        for entry in &self.requires {
            let (section, option) = split_key(entry).ok_or_else(|| {
                ValidationError::Failed(format!("malformed requirement '{entry}'"))
            })?;
            config.require(section, option)?;
        }

        let cmd = config.interpolate(&self.cmd)?;

        let mut inputs = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let path = PathBuf::from(config.interpolate(input)?);
            if !path.exists() {
                return Err(ValidationError::MissingInput(path));
            }
            inputs.push(path);
        }

        debug!(task = %self.descriptor.id, cmd = %cmd, "materialized command");
        self.materialized = Some(Materialized { cmd, inputs });
        Ok(())
    }

    fn execute(&self, ctx: &ExecContext) -> std::result::Result<(), ExecutionError> {
        let Some(materialized) = &self.materialized else {
            return Err(ExecutionError::Failed(format!(
                "task '{}' was never validated",
                self.descriptor.id
            )));
        };

        if materialized.cmd.trim().is_empty() {
            debug!(task = %ctx.id, "no command; grouping task completes immediately");
            return Ok(());
        }

        run_shell(&ctx.id, &materialized.cmd, ctx.log_file.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn view(text: &str) -> ConfigView {
        ConfigView::new(toml::from_str(text).unwrap())
    }

    fn ctx(id: TaskId) -> ExecContext {
        ExecContext {
            id,
            config: Arc::new(ConfigView::default()),
            log_file: None,
        }
    }

    #[test]
    fn validate_reports_missing_requirements() {
        let mut task = CommandTask::new(TaskDescriptor::new(TaskId::new("sst"), "ocean"), "true")
            .with_requires(["climatologyMapSst.seasons"]);

        let err = task.validate(&view("[climatologyMapSst]\n")).unwrap_err();
        assert!(matches!(err, ValidationError::MissingOption { .. }));
    }

    #[test]
    fn validate_checks_interpolated_inputs_exist() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sst.nc"), b"").unwrap();
        let cfg = view(&format!("[obs]\nbase = {:?}\n", dir.path().display().to_string()));

        let mut ok = CommandTask::new(TaskDescriptor::new(TaskId::new("a"), "ocean"), "echo ${obs.base}")
            .with_inputs(["${obs.base}/sst.nc"]);
        assert!(ok.validate(&cfg).is_ok());
        assert_eq!(
            ok.resolved_cmd(),
            Some(format!("echo {}", dir.path().display()).as_str())
        );

        let mut missing = CommandTask::new(TaskDescriptor::new(TaskId::new("b"), "ocean"), "true")
            .with_inputs(["${obs.base}/sose.nc"]);
        assert!(matches!(
            missing.validate(&cfg),
            Err(ValidationError::MissingInput(_))
        ));
    }

    #[test]
    fn execute_before_validate_fails() {
        let task = CommandTask::new(TaskDescriptor::new(TaskId::new("a"), "ocean"), "true");
        assert!(task.execute(&ctx(TaskId::new("a"))).is_err());
    }

    #[test]
    fn empty_command_is_a_grouping_task() {
        let mut task = CommandTask::new(TaskDescriptor::new(TaskId::new("a"), "ocean"), "");
        task.validate(&ConfigView::default()).unwrap();
        assert!(task.execute(&ctx(TaskId::new("a"))).is_ok());
    }

    #[test]
    fn subtasks_inherit_component_and_tags() {
        let parent = TaskConfig {
            component: "ocean".to_string(),
            tags: vec!["sose".to_string()],
            ..TaskConfig::default()
        };
        let sub = SubtaskConfig {
            tags: vec!["plot".to_string()],
            after: vec!["sose:remap".to_string()],
            ..SubtaskConfig::default()
        };

        let task = CommandTask::from_subtask_config("sose", &parent, "plotJFM", &sub).unwrap();
        let d = task.descriptor();
        assert_eq!(d.id, TaskId::subtask("sose", "plotJFM"));
        assert_eq!(d.component, "ocean");
        assert!(d.tags.contains("sose") && d.tags.contains("plot"));
        assert_eq!(d.prerequisites, vec![TaskId::subtask("sose", "remap")]);
    }
}
