// crates/test-utils/src/builders.rs

use std::collections::BTreeMap;

use batchdag::config::{
    ConfigFile, ExecuteSection, OutputSection, RawConfigFile, SubtaskConfig, TaskConfig,
};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                execute: ExecuteSection::default(),
                output: OutputSection::default(),
                task: BTreeMap::new(),
                options: toml::Table::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn parallel_task_count(mut self, count: usize) -> Self {
        self.config.execute.parallel_task_count = count;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.execute.poll_interval_ms = ms;
        self
    }

    pub fn base_directory(mut self, dir: &str) -> Self {
        self.config.output.base_directory = dir.to_string();
        self
    }

    pub fn generate(mut self, tokens: &[&str]) -> Self {
        self.config.output.generate = tokens.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Set `[section].option = value` in the opaque option store.
    pub fn with_option(mut self, section: &str, option: &str, value: impl Into<toml::Value>) -> Self {
        let entry = self
            .config
            .options
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if let toml::Value::Table(table) = entry {
            table.insert(option.to_string(), value.into());
        }
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                component: "default".to_string(),
                cmd: cmd.to_string(),
                ..TaskConfig::default()
            },
        }
    }

    pub fn component(mut self, component: &str) -> Self {
        self.task.component = component.to_string();
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.task.tags.push(tag.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn requires(mut self, key: &str) -> Self {
        self.task.requires.push(key.to_string());
        self
    }

    pub fn input(mut self, path: &str) -> Self {
        self.task.inputs.push(path.to_string());
        self
    }

    pub fn subtask(mut self, name: &str, subtask: SubtaskConfig) -> Self {
        self.task.subtask.insert(name.to_string(), subtask);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Builder for `SubtaskConfig`.
pub struct SubtaskConfigBuilder {
    subtask: SubtaskConfig,
}

impl SubtaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            subtask: SubtaskConfig {
                cmd: cmd.to_string(),
                ..SubtaskConfig::default()
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.subtask.after.push(dep.to_string());
        self
    }

    pub fn requires(mut self, key: &str) -> Self {
        self.subtask.requires.push(key.to_string());
        self
    }

    pub fn build(self) -> SubtaskConfig {
        self.subtask
    }
}
