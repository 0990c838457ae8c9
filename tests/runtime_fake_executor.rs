// tests/runtime_fake_executor.rs

mod common;
use crate::common::{FakeExecutor, Probe, ProbeTask, forest, id, init_tracing, with_timeout};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use batchdag::config::ConfigView;
use batchdag::dag::{Resolver, RunSet};
use batchdag::engine::{CancelSignal, Runtime, RuntimeOptions};
use batchdag::exec::Isolation;
use batchdag::selection::Selection;
use batchdag::types::{ExecutionMode, RunStatus};

/// A fans out to B and C; D is independent.
fn fan_out(probe: &Probe) -> RunSet {
    let forest = forest(
        vec![
            ProbeTask::new(probe, "A"),
            ProbeTask::new(probe, "B").after("A"),
            ProbeTask::new(probe, "C").after("A"),
            ProbeTask::new(probe, "D"),
        ],
        vec![],
    );
    let selection = Selection::parse(["all"]);
    let config = ConfigView::default();
    Resolver::new(&selection, &config)
        .resolve(forest)
        .unwrap()
        .run_set
}

fn options(workers: usize) -> RuntimeOptions {
    RuntimeOptions {
        mode: ExecutionMode::from_task_count(workers),
        poll_interval: Duration::from_millis(10),
        log_dir: None,
        isolation: Isolation::Thread,
    }
}

#[tokio::test]
async fn dispatches_in_dependency_waves() {
    init_tracing();
    let probe = Probe::new();
    let run_set = fan_out(&probe);

    let (tx, rx) = mpsc::channel(64);
    let executor = FakeExecutor::new(tx);
    let batches = executor.batches();

    let runtime = Runtime::new(
        &run_set,
        4,
        Arc::new(ConfigView::default()),
        rx,
        executor,
        &options(4),
        CancelSignal::new(),
    );
    let summary = with_timeout(runtime.run()).await.unwrap();

    assert!(summary.outcome().is_ok());
    let batches = batches.lock().unwrap().clone();
    assert_eq!(batches, vec![vec![id("A"), id("D")], vec![id("B"), id("C")]]);
    // The fake never calls execute().
    assert!(probe.executed().is_empty());
}

#[tokio::test]
async fn single_worker_dispatches_one_at_a_time_in_run_set_order() {
    let probe = Probe::new();
    let run_set = fan_out(&probe);

    let (tx, rx) = mpsc::channel(64);
    let executor = FakeExecutor::new(tx);
    let batches = executor.batches();

    let runtime = Runtime::new(
        &run_set,
        1,
        Arc::new(ConfigView::default()),
        rx,
        executor,
        &options(1),
        CancelSignal::new(),
    );
    with_timeout(runtime.run()).await.unwrap();

    let order: Vec<_> = batches.lock().unwrap().iter().flatten().cloned().collect();
    assert!(batches.lock().unwrap().iter().all(|b| b.len() == 1));
    assert_eq!(order, vec![id("A"), id("B"), id("C"), id("D")]);
}

#[tokio::test]
async fn failure_poisons_dependents_but_not_independent_branches() {
    let probe = Probe::new();
    let run_set = fan_out(&probe);

    let (tx, rx) = mpsc::channel(64);
    let executor = FakeExecutor::new(tx).failing("A");
    let batches = executor.batches();

    let runtime = Runtime::new(
        &run_set,
        2,
        Arc::new(ConfigView::default()),
        rx,
        executor,
        &options(2),
        CancelSignal::new(),
    );
    let summary = with_timeout(runtime.run()).await.unwrap();

    assert_eq!(batches.lock().unwrap().clone(), vec![vec![id("A"), id("D")]]);
    assert_eq!(summary.status_of(&id("D")), Some(RunStatus::Success));
    for poisoned in ["B", "C"] {
        let node = summary.node(&id(poisoned)).unwrap();
        assert_eq!(node.run, Some(RunStatus::Fail));
        assert_eq!(node.failure.as_deref(), Some("dependency A failed"));
    }
    let failed: Vec<_> = summary.failed().iter().map(|n| n.id.clone()).collect();
    assert_eq!(failed, vec![id("A"), id("B"), id("C")]);
}
