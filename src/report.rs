// src/report.rs

//! Run-level aggregation and the text printed for the operator.
//!
//! [`RunSummary`] is the final state of a run: one row per node, with its
//! setup status, run status and failure cause. [`RunSummary::outcome`]
//! turns it into the run's result.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use crate::dag::{Resolution, Scheduler, SetupFailure};
use crate::errors::{BatchdagError, Result};
use crate::selection::Selection;
use crate::task::{TaskForest, TaskId};
use crate::types::{ReportStyle, RunStatus, SetupStatus};

/// Final state of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSummary {
    pub id: TaskId,
    pub setup: SetupStatus,
    /// `None` if the node never entered the run set.
    pub run: Option<RunStatus>,
    pub failure: Option<String>,
    pub elapsed: Option<Duration>,
    pub log_file: Option<PathBuf>,
}

impl NodeSummary {
    pub fn is_failed(&self) -> bool {
        self.run == Some(RunStatus::Fail)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    nodes: Vec<NodeSummary>,
    setup_failures: Vec<SetupFailure>,
    halted: bool,
    cancelled: bool,
}

impl RunSummary {
    /// One row per scheduled node, in run-set order.
    pub fn from_scheduler(scheduler: &Scheduler) -> Self {
        let nodes = scheduler
            .nodes()
            .map(|n| NodeSummary {
                id: n.id.clone(),
                setup: SetupStatus::Success,
                run: Some(n.status),
                failure: n.failure.as_ref().map(ToString::to_string),
                elapsed: n.elapsed,
                log_file: n.log_file.clone(),
            })
            .collect();

        Self {
            nodes,
            ..Self::default()
        }
    }

    /// Add rows for nodes that failed setup and never reached the scheduler.
    pub fn with_resolution(mut self, resolution: &Resolution) -> Self {
        let mut setup_rows = Vec::new();
        for failure in resolution.setup_failures() {
            if self.nodes.iter().any(|n| n.id == failure.id) {
                continue;
            }
            setup_rows.push(NodeSummary {
                id: failure.id.clone(),
                setup: SetupStatus::Fail,
                run: None,
                failure: Some(failure.cause.to_string()),
                elapsed: None,
                log_file: None,
            });
        }
        setup_rows.append(&mut self.nodes);
        self.nodes = setup_rows;
        self.setup_failures = resolution.setup_failures().to_vec();
        self
    }

    pub fn with_cancelled(mut self, cancelled: bool) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn with_halted(mut self, halted: bool) -> Self {
        self.halted = halted;
        self
    }

    pub fn nodes(&self) -> &[NodeSummary] {
        &self.nodes
    }

    pub fn node(&self, id: &TaskId) -> Option<&NodeSummary> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn status_of(&self, id: &TaskId) -> Option<RunStatus> {
        self.node(id).and_then(|n| n.run)
    }

    pub fn setup_failures(&self) -> &[SetupFailure] {
        &self.setup_failures
    }

    /// Nodes whose run ended in `Fail`, in run-set order.
    pub fn failed(&self) -> Vec<&NodeSummary> {
        self.nodes.iter().filter(|n| n.is_failed()).collect()
    }

    /// Sequential mode stopped at the first execution error.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// `Ok` when nothing failed; otherwise one precise error for a single
    /// failure and a summary error for several.
    pub fn outcome(&self) -> Result<()> {
        if self.cancelled {
            return Err(BatchdagError::Cancelled);
        }

        let failed = self.failed();
        match failed.as_slice() {
            [] => Ok(()),
            [only] => Err(BatchdagError::TaskFailed {
                task: only.id.clone(),
                cause: only
                    .failure
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            }),
            many => Err(BatchdagError::TasksFailed {
                count: many.len(),
                tasks: many
                    .iter()
                    .map(|n| n.id.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// Status table printed once after the run.
pub fn render(summary: &RunSummary, style: ReportStyle) -> String {
    let rows: Vec<&NodeSummary> = summary
        .nodes()
        .iter()
        .filter(|n| match style {
            ReportStyle::Full => true,
            ReportStyle::Failures => n.setup == SetupStatus::Fail || n.is_failed(),
        })
        .collect();

    let width = rows
        .iter()
        .map(|n| n.id.to_string().len())
        .max()
        .unwrap_or(0)
        .max("task".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$}  {:<11}  {:<7}  {:>9}",
        "task", "setup", "run", "elapsed"
    );
    for n in &rows {
        let run = n.run.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
        let elapsed = n
            .elapsed
            .map(|d| format!("{:.1}s", d.as_secs_f64()))
            .unwrap_or_else(|| "-".into());
        let _ = writeln!(
            out,
            "{:<width$}  {:<11}  {:<7}  {:>9}",
            n.id.to_string(),
            n.setup.to_string(),
            run,
            elapsed
        );
    }

    let failed = summary.failed();
    if !failed.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "failed tasks ({}):", failed.len());
        for n in failed {
            let _ = write!(
                out,
                "  {}: {}",
                n.id,
                n.failure.as_deref().unwrap_or("unknown error")
            );
            if let Some(log) = &n.log_file {
                let _ = write!(out, " (log: {})", log.display());
            }
            let _ = writeln!(out);
        }
    }

    if summary.is_cancelled() {
        let _ = writeln!(out);
        let _ = writeln!(out, "run was cancelled");
    }

    out
}

/// Output of `--setup-only`: every visited node with its setup status.
pub fn render_setup(resolution: &Resolution) -> String {
    let mut out = String::new();
    for (id, status) in resolution.setup_statuses() {
        let _ = write!(out, "{id}: {status}");
        if let Some(failure) = resolution.setup_failures().iter().find(|f| &f.id == id) {
            let _ = write!(out, " ({})", failure.cause);
        }
        let _ = writeln!(out);
    }
    let _ = writeln!(
        out,
        "{} of {} visited tasks are runnable",
        resolution.run_set.len(),
        resolution.setup_statuses().count()
    );
    out
}

/// Output of `--list`: every top-level task and its subtasks, with
/// component, tags and whether the selection wants it.
pub fn render_task_list(forest: &TaskForest, selection: &Selection) -> String {
    let mut out = String::new();
    for id in forest.top_level() {
        let Some(node) = forest.get(id) else {
            continue;
        };
        let descriptor = node.task.descriptor();
        let marker = if node.task.wants(selection) { '*' } else { ' ' };
        let tags: Vec<&str> = descriptor.tags.iter().map(String::as_str).collect();
        let _ = writeln!(
            out,
            "{marker} {id}  component={}  tags=[{}]",
            descriptor.component,
            tags.join(", ")
        );

        for sub in forest.subtasks_of(id) {
            let _ = writeln!(out, "      {sub}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TaskOutcome;
    use crate::errors::ExecutionError;

    fn id(s: &str) -> TaskId {
        TaskId::new(s)
    }

    fn finished(outcomes: &[(&str, bool)]) -> RunSummary {
        let mut s = Scheduler::from_dependencies(
            outcomes.iter().map(|(n, _)| (id(n), vec![])),
            outcomes.len().max(1),
        );
        s.tick(true);
        for (n, ok) in outcomes {
            let outcome = if *ok {
                TaskOutcome::Success
            } else {
                TaskOutcome::Failed(ExecutionError::CommandFailed { code: Some(2) })
            };
            s.complete(&id(n), outcome, Some(Duration::from_millis(1500)), None);
        }
        s.tick(true);
        RunSummary::from_scheduler(&s)
    }

    #[test]
    fn no_failures_is_ok() {
        assert!(finished(&[("a", true), ("b", true)]).outcome().is_ok());
    }

    #[test]
    fn single_failure_names_the_task() {
        let err = finished(&[("a", true), ("b", false)]).outcome().unwrap_err();
        match err {
            BatchdagError::TaskFailed { task, cause } => {
                assert_eq!(task, id("b"));
                assert!(cause.contains("exited with status"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn several_failures_are_summarised() {
        let err = finished(&[("a", false), ("b", true), ("c", false)])
            .outcome()
            .unwrap_err();
        match err {
            BatchdagError::TasksFailed { count, tasks } => {
                assert_eq!(count, 2);
                assert_eq!(tasks, "a, c");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn cancellation_wins() {
        let summary = finished(&[("a", false)]).with_cancelled(true);
        assert!(matches!(summary.outcome(), Err(BatchdagError::Cancelled)));
    }

    #[test]
    fn failures_style_only_lists_failed_rows() {
        let summary = finished(&[("alpha", true), ("beta", false)]);
        let full = render(&summary, ReportStyle::Full);
        let failures = render(&summary, ReportStyle::Failures);

        assert!(full.contains("alpha"));
        assert!(full.contains("1.5s"));
        assert!(!failures.contains("alpha"));
        assert!(failures.contains("failed tasks (1):"));
        assert!(failures.contains("beta: command exited with status 2"));
    }
}
