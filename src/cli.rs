// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::ReportStyle;

/// Command-line arguments for `batchdag`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "batchdag",
    version,
    about = "Resolve and run a graph of dependent analysis tasks.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `batchdag.toml` in the current working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Comma-separated selection, e.g. `all,no_ocean,climatologyMapSst`.
    ///
    /// Overrides `[output].generate`.
    #[arg(long, value_name = "TOKENS")]
    pub generate: Option<String>,

    /// Maximum number of tasks running at once. Overrides
    /// `[execute].parallel_task_count`; `1` runs sequentially.
    #[arg(long, short = 'j', value_name = "N")]
    pub jobs: Option<usize>,

    /// Overrides `[execute].poll_interval_ms`.
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// List tasks and whether they are selected; validate and run nothing.
    #[arg(long, conflicts_with_all = ["setup_only", "dry"])]
    pub list: bool,

    /// Validate selected tasks and print setup statuses; run nothing.
    #[arg(long, conflicts_with = "dry")]
    pub setup_only: bool,

    /// Run everything but skip the final report.
    #[arg(long)]
    pub dry: bool,

    /// Rows in the final report: `full` or `failures`. Overrides
    /// `[output].report`.
    #[arg(long, value_name = "STYLE")]
    pub report: Option<ReportStyle>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BATCHDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let args = CliArgs::try_parse_from([
            "batchdag",
            "--config",
            "run.toml",
            "--generate",
            "all,no_ocean",
            "-j",
            "4",
            "--dry",
            "--report",
            "failures",
        ])
        .unwrap();

        assert_eq!(args.config.as_deref(), Some("run.toml"));
        assert_eq!(args.generate.as_deref(), Some("all,no_ocean"));
        assert_eq!(args.jobs, Some(4));
        assert!(args.dry);
        assert_eq!(args.report, Some(ReportStyle::Failures));
        assert!(!args.list);
    }

    #[test]
    fn list_conflicts_with_dry() {
        assert!(CliArgs::try_parse_from(["batchdag", "--list", "--dry"]).is_err());
    }
}
