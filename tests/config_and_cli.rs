// tests/config_and_cli.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, SubtaskConfigBuilder, TaskConfigBuilder};
use crate::common::{id, init_tracing};

use std::io::Write;

use tempfile::NamedTempFile;

use batchdag::cli::CliArgs;
use batchdag::config::{ConfigFile, load_and_validate};
use batchdag::dag::{Resolver, SetupCause};
use batchdag::errors::{BatchdagError, ValidationError};
use batchdag::task::TaskForest;
use batchdag::types::SetupStatus;

fn write_config(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{text}").unwrap();
    file
}

#[test]
fn dag_cycle_returns_structured_error() {
    let file = write_config(
        r#"
[task.A]
cmd = "echo A"
after = ["B"]

[task.B]
cmd = "echo B"
after = ["A"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(BatchdagError::DagCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
        }
        other => panic!("expected DagCycle error, got: {other:?}"),
    }
}

#[test]
fn subtask_depending_on_its_parent_is_a_cycle() {
    let file = write_config(
        r#"
[task.sst]
cmd = ""

[task.sst.subtask.plot]
cmd = "true"
after = ["sst"]
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(BatchdagError::DagCycle(_))
    ));
}

#[test]
fn unknown_dependency_returns_config_error() {
    let file = write_config(
        r#"
[task.A]
cmd = "echo A"
after = ["NonExistent"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(BatchdagError::ConfigError(msg)) => {
            assert!(msg.contains("unknown dependency"));
            assert!(msg.contains("NonExistent"));
        }
        other => panic!("expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn zero_workers_is_rejected() {
    let file = write_config(
        r#"
[execute]
parallel_task_count = 0

[task.A]
cmd = "true"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(BatchdagError::ConfigError(_))
    ));
}

#[test]
fn forest_from_config_inherits_component_and_tags() {
    let cfg: ConfigFile = ConfigFileBuilder::new()
        .with_task(
            "climatologyMapSst",
            TaskConfigBuilder::new("")
                .component("ocean")
                .tag("climatology")
                .subtask(
                    "remap",
                    SubtaskConfigBuilder::new("remap ${climatologyMapSst.grid}").build(),
                )
                .build(),
        )
        .build();

    let forest = TaskForest::from_config(&cfg).unwrap();
    let sub = forest.get(&id("climatologyMapSst:remap")).unwrap();
    let descriptor = sub.task.descriptor();

    assert_eq!(descriptor.component, "ocean");
    assert!(descriptor.tags.contains("climatology"));
    assert_eq!(sub.parent, Some(id("climatologyMapSst")));
}

#[test]
fn missing_option_fails_setup_and_poisons_parent() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_option("climatologyMapSst", "seasons", vec!["JFM", "JAS"])
        .with_task(
            "climatologyMapSst",
            TaskConfigBuilder::new("echo ${climatologyMapSst.seasons}")
                .requires("climatologyMapSst.seasons")
                .subtask(
                    "remap",
                    SubtaskConfigBuilder::new("true")
                        .requires("climatologyMapSst.grid")
                        .build(),
                )
                .build(),
        )
        .with_task("timeSeriesOhc", TaskConfigBuilder::new("true").build())
        .build();

    let forest = TaskForest::from_config(&cfg).unwrap();
    let view = cfg.view().unwrap();
    let selection = cfg.selection();
    let resolution = Resolver::new(&selection, &view).resolve(forest).unwrap();

    assert_eq!(
        resolution.setup_status(&id("climatologyMapSst")),
        SetupStatus::Fail
    );
    assert_eq!(resolution.run_set.ids(), &[id("timeSeriesOhc")]);

    let remap = resolution
        .setup_failures()
        .iter()
        .find(|f| f.id == id("climatologyMapSst:remap"))
        .unwrap();
    assert_eq!(
        remap.cause,
        SetupCause::Validation(ValidationError::MissingOption {
            section: "climatologyMapSst".into(),
            option: "grid".into(),
        })
    );
}

#[cfg(unix)]
mod end_to_end {
    use super::*;

    use std::path::Path;

    use batchdag::exec::WorkerCommand;

    fn config_in(dir: &Path, parallel: usize, body: &str) -> std::path::PathBuf {
        let path = dir.join("batchdag.toml");
        let text = format!(
            "[execute]\nparallel_task_count = {parallel}\npoll_interval_ms = 10\n\n\
             [output]\nbase_directory = {:?}\n\n{body}",
            dir.display().to_string()
        );
        std::fs::write(&path, text).unwrap();
        path
    }

    fn args(config: &Path) -> CliArgs {
        CliArgs {
            config: Some(config.display().to_string()),
            ..CliArgs::default()
        }
    }

    /// Parallel workers re-run the real binary, not this test executable.
    async fn run(args: CliArgs) -> anyhow::Result<()> {
        let config = args.config.clone().unwrap_or_default();
        let worker = WorkerCommand::new(env!("CARGO_BIN_EXE_batchdag"))
            .arg("--config")
            .arg(config);
        batchdag::run_with_worker(args, worker).await
    }

    #[tokio::test]
    async fn successful_run_writes_outputs_and_logs() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let config = config_in(
            dir.path(),
            2,
            &format!(
                r#"
[task.produce]
cmd = "echo produced > {out}"

[task.consume]
cmd = "cat {out}"
after = ["produce"]
"#,
                out = out.display()
            ),
        );

        run(args(&config)).await.unwrap();

        assert!(out.exists());
        // The worker's own stdout and stderr land in the same file.
        let log = std::fs::read_to_string(dir.path().join("logs").join("consume.log")).unwrap();
        assert!(log.lines().any(|line| line == "produced"));
    }

    #[tokio::test]
    async fn single_failure_is_named_in_the_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(
            dir.path(),
            2,
            r#"
[task.good]
cmd = "true"

[task.bad]
cmd = "exit 3"
"#,
        );

        let err = run(args(&config)).await.unwrap_err();
        match err.downcast_ref::<BatchdagError>() {
            Some(BatchdagError::TaskFailed { task, cause }) => {
                assert_eq!(task, &id("bad"));
                assert!(cause.contains("status 3"));
            }
            other => panic!("expected TaskFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sequential_fast_fail_skips_remaining_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("b_ran");
        let config = config_in(
            dir.path(),
            1,
            &format!(
                r#"
[task.a]
cmd = "false"

[task.b]
cmd = "touch {}"
"#,
                marker.display()
            ),
        );

        let err = run(args(&config)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BatchdagError>(),
            Some(BatchdagError::TaskFailed { .. })
        ));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn empty_run_set_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(
            dir.path(),
            2,
            r#"
[task.needsInput]
cmd = "true"
inputs = ["/definitely/not/here.nc"]
"#,
        );

        let err = run(args(&config)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BatchdagError>(),
            Some(BatchdagError::NoValidTasks)
        ));
    }

    #[tokio::test]
    async fn list_mode_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let config = config_in(
            dir.path(),
            2,
            &format!("[task.a]\ncmd = \"touch {}\"\n", marker.display()),
        );

        let mut list = args(&config);
        list.list = true;
        run(list).await.unwrap();

        let mut setup = args(&config);
        setup.setup_only = true;
        run(setup).await.unwrap();

        assert!(!marker.exists());
    }
}
