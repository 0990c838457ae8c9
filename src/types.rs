// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Outcome of validating a task during resolution.
///
/// Written exactly once per task per resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetupStatus {
    #[default]
    Unattempted,
    Success,
    Fail,
}

impl fmt::Display for SetupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SetupStatus::Unattempted => "unattempted",
            SetupStatus::Success => "success",
            SetupStatus::Fail => "fail",
        };
        f.write_str(s)
    }
}

/// Position of a node in the scheduler's state machine:
/// `Blocked -> Ready -> Running -> {Success, Fail}`, plus `Blocked -> Fail`
/// when a dependency fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Blocked,
    Ready,
    Running,
    Success,
    Fail,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Fail)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Blocked => "blocked",
            RunStatus::Ready => "ready",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Fail => "fail",
        };
        f.write_str(s)
    }
}

/// How the scheduler executes ready nodes.
///
/// - `Sequential`: one node at a time, in-process, halting on the first
///   execution error (`parallel_task_count = 1`).
/// - `Parallel(w)`: up to `w` isolated workers; failures are contained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel(usize),
}

impl ExecutionMode {
    pub fn from_task_count(count: usize) -> Self {
        if count <= 1 {
            ExecutionMode::Sequential
        } else {
            ExecutionMode::Parallel(count)
        }
    }

    pub fn max_workers(self) -> usize {
        match self {
            ExecutionMode::Sequential => 1,
            ExecutionMode::Parallel(w) => w,
        }
    }
}

/// Verbosity of the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportStyle {
    /// Every node in the run set.
    #[default]
    Full,
    /// Only failed nodes plus the totals line.
    Failures,
}

impl FromStr for ReportStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(ReportStyle::Full),
            "failures" => Ok(ReportStyle::Failures),
            other => Err(format!(
                "invalid report style: {other} (expected \"full\" or \"failures\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_count_of_one_is_sequential() {
        assert_eq!(ExecutionMode::from_task_count(1), ExecutionMode::Sequential);
        assert_eq!(ExecutionMode::from_task_count(0), ExecutionMode::Sequential);
        assert_eq!(ExecutionMode::from_task_count(4), ExecutionMode::Parallel(4));
        assert_eq!(ExecutionMode::Parallel(4).max_workers(), 4);
    }

    #[test]
    fn only_success_and_fail_are_terminal() {
        assert!(RunStatus::Success.is_terminal());
        assert!(RunStatus::Fail.is_terminal());
        assert!(!RunStatus::Blocked.is_terminal());
        assert!(!RunStatus::Ready.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn report_style_parses_case_insensitively() {
        assert_eq!("Failures".parse::<ReportStyle>(), Ok(ReportStyle::Failures));
        assert!("verbose".parse::<ReportStyle>().is_err());
    }
}
