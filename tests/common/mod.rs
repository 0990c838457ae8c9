// tests/common/mod.rs

#![allow(dead_code)]

pub use batchdag_test_utils::*;

use batchdag::task::{TaskForest, TaskId};

pub fn id(s: &str) -> TaskId {
    s.parse().expect("valid task identity")
}

/// Build a forest from top-level probes and `(parent, subtask)` probes.
pub fn forest(top: Vec<ProbeTask>, subtasks: Vec<(&str, ProbeTask)>) -> TaskForest {
    let mut forest = TaskForest::new();
    for task in top {
        forest.add_task(task.boxed()).expect("unique top-level task");
    }
    for (parent, task) in subtasks {
        forest
            .add_subtask(&TaskId::new(parent), task.boxed())
            .expect("subtask of a declared parent");
    }
    forest
}
