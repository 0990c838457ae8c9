// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod report;
pub mod selection;
pub mod task;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, default_config_path, load_and_validate};
use crate::dag::Resolver;
use crate::engine::{CancelSignal, RuntimeOptions, execute_run_set};
use crate::errors::BatchdagError;
use crate::exec::process::{EXIT_SETUP_FAILED, report_failure};
use crate::exec::{Isolation, WorkerCommand, execute_in_worker};
use crate::selection::Selection;
use crate::task::TaskForest;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - task forest construction and selection
/// - resolution (validation walk)
/// - execution in sequential or parallel mode
/// - Ctrl-C handling and the final report
pub async fn run(args: CliArgs) -> Result<()> {
    let worker = WorkerCommand::current_exe(&config_path(&args))?;
    run_with_worker(args, worker).await
}

/// [`run`], with parallel workers started from `worker` instead of the
/// current executable.
pub async fn run_with_worker(args: CliArgs, worker: WorkerCommand) -> Result<()> {
    let config_path = config_path(&args);
    let mut cfg = load_and_validate(&config_path)?;
    apply_overrides(&mut cfg, &args)?;

    let selection = match &args.generate {
        Some(csv) => Selection::from_csv(csv),
        None => cfg.selection(),
    };
    info!(config = %config_path.display(), %selection, "configuration loaded");

    let forest = TaskForest::from_config(&cfg)?;

    if args.list {
        print!("{}", report::render_task_list(&forest, &selection));
        return Ok(());
    }

    let view = cfg.view()?;
    let mut resolution = Resolver::new(&selection, &view).resolve(forest)?;

    if args.setup_only {
        print!("{}", report::render_setup(&resolution));
        return Ok(());
    }

    resolution.ensure_any_valid()?;

    let options = RuntimeOptions::from_config(&cfg)
        .with_isolation(Isolation::Process(worker));
    let cancel = CancelSignal::new();
    let _ctrl_c = cancel.listen_for_ctrl_c();

    let run_set = std::mem::take(&mut resolution.run_set);
    let summary = execute_run_set(run_set, &options, Arc::new(view), cancel)
        .await?
        .with_resolution(&resolution);

    if summary.is_halted() {
        // Sequential fast-fail: stop right here.
        summary.outcome()?;
    }

    if args.dry {
        debug!("dry run; skipping report");
    } else {
        print!("{}", report::render(&summary, cfg.output.report));
    }

    summary.outcome()?;
    Ok(())
}

/// Child side of a parallel run: rebuild the node named by the coordinator
/// from the same config, validate and execute it. Returns the exit code.
pub fn run_worker(args: &CliArgs, task: &str) -> i32 {
    let prepared = load_and_validate(config_path(args)).and_then(|cfg| {
        let forest = TaskForest::from_config(&cfg)?;
        Ok((forest, cfg.view()?))
    });

    match prepared {
        Ok((forest, view)) => execute_in_worker(forest, task, Arc::new(view)),
        Err(e) => report_failure(EXIT_SETUP_FAILED, &e.to_string()),
    }
}

fn config_path(args: &CliArgs) -> PathBuf {
    args.config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path)
}

/// Apply CLI flags on top of the validated config.
fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) -> std::result::Result<(), BatchdagError> {
    if let Some(jobs) = args.jobs {
        if jobs == 0 {
            return Err(BatchdagError::ConfigError(
                "--jobs must be at least 1".to_string(),
            ));
        }
        cfg.execute.parallel_task_count = jobs;
    }
    if let Some(ms) = args.poll_interval_ms {
        if ms == 0 {
            return Err(BatchdagError::ConfigError(
                "--poll-interval-ms must be at least 1".to_string(),
            ));
        }
        cfg.execute.poll_interval_ms = ms;
    }
    if let Some(style) = args.report {
        cfg.output.report = style;
    }
    Ok(())
}
