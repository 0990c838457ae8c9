// src/config/validate.rs

use std::collections::BTreeSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::config::view::split_key;
use crate::errors::{BatchdagError, Result};
use crate::task::TaskId;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BatchdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.execute,
            raw.output,
            raw.task,
            raw.options,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_execute_section(cfg)?;
    validate_task_names(cfg)?;
    validate_requires(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(BatchdagError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_execute_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.execute.parallel_task_count == 0 {
        return Err(BatchdagError::ConfigError(
            "[execute].parallel_task_count must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.execute.poll_interval_ms == 0 {
        return Err(BatchdagError::ConfigError(
            "[execute].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_names(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if name.contains(':') {
            return Err(BatchdagError::ConfigError(format!(
                "task name '{name}' must not contain ':'"
            )));
        }
        for sub in task.subtask.keys() {
            if sub.contains(':') {
                return Err(BatchdagError::ConfigError(format!(
                    "subtask name '{name}.{sub}' must not contain ':'"
                )));
            }
        }
    }
    Ok(())
}

fn validate_requires(cfg: &RawConfigFile) -> Result<()> {
    let entries = cfg.task.iter().flat_map(|(name, task)| {
        task.requires
            .iter()
            .map(move |r| (name.clone(), r))
            .chain(task.subtask.iter().flat_map(move |(sub, s)| {
                s.requires.iter().map(move |r| (format!("{name}:{sub}"), r))
            }))
    });

    for (owner, entry) in entries {
        if split_key(entry).is_none() {
            return Err(BatchdagError::ConfigError(format!(
                "task '{owner}' has malformed `requires` entry '{entry}' (expected section.option)"
            )));
        }
    }
    Ok(())
}

/// Every identity declared in the config (tasks and subtasks).
fn declared_ids(cfg: &RawConfigFile) -> BTreeSet<TaskId> {
    let mut ids = BTreeSet::new();
    for (name, task) in cfg.task.iter() {
        ids.insert(TaskId::new(name.as_str()));
        for sub in task.subtask.keys() {
            ids.insert(TaskId::subtask(name.as_str(), sub.as_str()));
        }
    }
    ids
}

/// `(owner, after)` pairs for every task and subtask.
fn dependency_edges(cfg: &RawConfigFile) -> Result<Vec<(TaskId, TaskId)>> {
    let mut edges = Vec::new();
    for (name, task) in cfg.task.iter() {
        let owner = TaskId::new(name.as_str());
        for dep in task.after.iter() {
            edges.push((owner.clone(), parse_reference(&owner, dep)?));
        }
        for (sub, sub_cfg) in task.subtask.iter() {
            let owner = TaskId::subtask(name.as_str(), sub.as_str());
            for dep in sub_cfg.after.iter() {
                edges.push((owner.clone(), parse_reference(&owner, dep)?));
            }
        }
    }
    Ok(edges)
}

fn parse_reference(owner: &TaskId, dep: &str) -> Result<TaskId> {
    dep.parse::<TaskId>().map_err(|e| {
        BatchdagError::ConfigError(format!("task '{owner}' has malformed `after` entry: {e}"))
    })
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    let ids = declared_ids(cfg);
    for (owner, dep) in dependency_edges(cfg)? {
        if !ids.contains(&dep) {
            return Err(BatchdagError::ConfigError(format!(
                "task '{owner}' has unknown dependency '{dep}' in `after`"
            )));
        }
        if dep == owner {
            return Err(BatchdagError::ConfigError(format!(
                "task '{owner}' cannot depend on itself in `after`"
            )));
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dependency -> dependent.
    //   [task.B]
    //   after = ["A"]
    // adds A -> B; every subtask adds sub -> parent.
    let ids = declared_ids(cfg);
    let edges = dependency_edges(cfg)?;
    let parents: Vec<(TaskId, TaskId)> = ids
        .iter()
        .filter(|id| id.is_subtask())
        .map(|id| (id.clone(), TaskId::new(id.task.as_str())))
        .collect();

    let mut graph: DiGraphMap<&TaskId, ()> = DiGraphMap::new();
    for id in ids.iter() {
        graph.add_node(id);
    }
    for (owner, dep) in edges.iter() {
        graph.add_edge(dep, owner, ());
    }

    for (sub, parent) in parents.iter() {
        graph.add_edge(sub, parent, ());
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(BatchdagError::DagCycle(format!(
            "cycle detected in task graph involving task '{}'",
            cycle.node_id()
        ))),
    }
}
