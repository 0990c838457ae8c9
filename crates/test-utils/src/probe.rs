// crates/test-utils/src/probe.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use batchdag::config::ConfigView;
use batchdag::errors::{ExecutionError, ValidationError};
use batchdag::task::{ExecContext, Task, TaskDescriptor, TaskId};

/// Shared instrumentation for a group of [`ProbeTask`]s.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    inner: Arc<ProbeState>,
}

#[derive(Debug, Default)]
struct ProbeState {
    validations: Mutex<HashMap<TaskId, usize>>,
    executions: Mutex<Vec<TaskId>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validations_of(&self, id: &TaskId) -> usize {
        self.inner
            .validations
            .lock()
            .unwrap()
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_validations(&self) -> usize {
        self.inner.validations.lock().unwrap().values().sum()
    }

    /// Identities in the order their `execute()` started.
    pub fn executed(&self) -> Vec<TaskId> {
        self.inner.executions.lock().unwrap().clone()
    }

    pub fn executions_of(&self, id: &TaskId) -> usize {
        self.executed().iter().filter(|e| *e == id).count()
    }

    /// Highest number of `execute()` calls observed in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    fn record_validation(&self, id: &TaskId) {
        *self
            .inner
            .validations
            .lock()
            .unwrap()
            .entry(id.clone())
            .or_default() += 1;
    }

    fn enter(&self, id: &TaskId) {
        self.inner.executions.lock().unwrap().push(id.clone());
        let now = self.inner.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.inner.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Instrumented fake task.
pub struct ProbeTask {
    descriptor: TaskDescriptor,
    probe: Probe,
    fail_validate: bool,
    fail_execute: bool,
    panic_execute: bool,
    delay: Duration,
}

impl ProbeTask {
    pub fn new(probe: &Probe, name: &str) -> Self {
        Self::with_id(probe, TaskId::new(name))
    }

    pub fn subtask(probe: &Probe, parent: &str, name: &str) -> Self {
        Self::with_id(probe, TaskId::subtask(parent, name))
    }

    fn with_id(probe: &Probe, id: TaskId) -> Self {
        Self {
            descriptor: TaskDescriptor::new(id, "test"),
            probe: probe.clone(),
            fail_validate: false,
            fail_execute: false,
            panic_execute: false,
            delay: Duration::ZERO,
        }
    }

    pub fn component(mut self, component: &str) -> Self {
        self.descriptor.component = component.to_string();
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.descriptor = self.descriptor.with_tags(tags.iter().copied());
        self
    }

    /// Add a prerequisite, `task` or `task:subtask`.
    pub fn after(mut self, prerequisite: &str) -> Self {
        let id = prerequisite.parse().expect("valid task identity");
        self.descriptor = self.descriptor.after(id);
        self
    }

    pub fn fail_validate(mut self) -> Self {
        self.fail_validate = true;
        self
    }

    pub fn fail_execute(mut self) -> Self {
        self.fail_execute = true;
        self
    }

    pub fn panic_on_execute(mut self) -> Self {
        self.panic_execute = true;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn boxed(self) -> Box<dyn Task> {
        Box::new(self)
    }
}

impl Task for ProbeTask {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    fn validate(&mut self, _config: &ConfigView) -> Result<(), ValidationError> {
        self.probe.record_validation(&self.descriptor.id);
        if self.fail_validate {
            return Err(ValidationError::Failed(format!(
                "{} refused to validate",
                self.descriptor.id
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &ExecContext) -> Result<(), ExecutionError> {
        self.probe.enter(&ctx.id);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.probe.leave();

        if self.panic_execute {
            panic!("{} panicked on purpose", ctx.id);
        }
        if self.fail_execute {
            return Err(ExecutionError::Failed(format!("{} failed on purpose", ctx.id)));
        }
        Ok(())
    }
}
