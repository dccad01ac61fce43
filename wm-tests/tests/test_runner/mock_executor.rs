use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;

use wm_common::{meta::task::TaskModel, utils::time_util::TimeUtil};
use wm_engine::{
    executor::{ExecutorRegistry, PhaseExecutor, PhaseOutcome},
    task_fsm::Phase,
};

/// counts how many phase executions overlap, to assert the admission cap
#[derive(Default)]
pub struct ConcurrencyProbe {
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enter(&self) {
        let running = self.running.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_running.fetch_max(running, Ordering::AcqRel);
    }

    fn leave(&self) {
        self.running.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::Acquire)
    }
}

/// scripted phase collaborator: optional delay, optional per-table failure
/// budget, optional concurrency probe
pub struct MockPhaseExecutor {
    name: String,
    delay_millis: u64,
    fail_remaining: Mutex<HashMap<String, usize>>,
    probe: Option<Arc<ConcurrencyProbe>>,
}

impl MockPhaseExecutor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delay_millis: 0,
            fail_remaining: Mutex::new(HashMap::new()),
            probe: None,
        }
    }

    pub fn with_delay(mut self, delay_millis: u64) -> Self {
        self.delay_millis = delay_millis;
        self
    }

    /// the next `count` executions against `table` fail, later ones succeed
    pub fn with_failures(self, table: &str, count: usize) -> Self {
        self.fail_remaining
            .lock()
            .unwrap()
            .insert(table.to_string(), count);
        self
    }

    pub fn with_probe(mut self, probe: Arc<ConcurrencyProbe>) -> Self {
        self.probe = Some(probe);
        self
    }
}

#[async_trait]
impl PhaseExecutor for MockPhaseExecutor {
    async fn run(&self, task: &TaskModel) -> anyhow::Result<PhaseOutcome> {
        if let Some(probe) = &self.probe {
            probe.enter();
        }
        if self.delay_millis > 0 {
            TimeUtil::sleep_millis(self.delay_millis).await;
        }

        let outcome = {
            let mut fail_remaining = self.fail_remaining.lock().unwrap();
            match fail_remaining.get_mut(&task.table_name) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    PhaseOutcome::failed(&format!("{} failed by test script", self.name))
                }
                _ => PhaseOutcome::ok(&format!("{} ok", self.name)),
            }
        };

        if let Some(probe) = &self.probe {
            probe.leave();
        }
        Ok(outcome)
    }
}

pub struct MockRegistryBuilder {
    schema: MockPhaseExecutor,
    data: MockPhaseExecutor,
    verification: MockPhaseExecutor,
}

impl Default for MockRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRegistryBuilder {
    pub fn new() -> Self {
        Self {
            schema: MockPhaseExecutor::new("schema_copy"),
            data: MockPhaseExecutor::new("data_copy"),
            verification: MockPhaseExecutor::new("verification"),
        }
    }

    pub fn with_delay(mut self, delay_millis: u64) -> Self {
        self.schema = self.schema.with_delay(delay_millis);
        self.data = self.data.with_delay(delay_millis);
        self.verification = self.verification.with_delay(delay_millis);
        self
    }

    pub fn with_probe(mut self, probe: Arc<ConcurrencyProbe>) -> Self {
        self.schema = self.schema.with_probe(probe.clone());
        self.data = self.data.with_probe(probe.clone());
        self.verification = self.verification.with_probe(probe);
        self
    }

    pub fn with_phase_failures(mut self, phase: Phase, table: &str, count: usize) -> Self {
        match phase {
            Phase::Schema => self.schema = self.schema.with_failures(table, count),
            Phase::Data => self.data = self.data.with_failures(table, count),
            Phase::Verification => {
                self.verification = self.verification.with_failures(table, count)
            }
        }
        self
    }

    pub fn build(self) -> Arc<ExecutorRegistry> {
        Arc::new(ExecutorRegistry::new(
            Arc::new(self.schema),
            Arc::new(self.data),
            Arc::new(self.verification),
        ))
    }
}
