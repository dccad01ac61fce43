use std::sync::Arc;

use async_trait::async_trait;

use wm_common::meta::task::TaskModel;

use crate::task_fsm::Phase;

/// result reported by an external phase collaborator. a timeout inside the
/// collaborator surfaces here as a failed outcome like any other failure.
#[derive(Clone, Debug)]
pub struct PhaseOutcome {
    pub success: bool,
    pub message: String,
}

impl PhaseOutcome {
    pub fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }

    pub fn failed(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
        }
    }
}

/// the capability the engine requires from the schema-copy, data-copy and
/// verification collaborators. the engine performs no transfer i/o itself.
#[async_trait]
pub trait PhaseExecutor: Send + Sync {
    async fn run(&self, task: &TaskModel) -> anyhow::Result<PhaseOutcome>;
}

/// one named implementation per phase, selected by the task's current phase
pub struct ExecutorRegistry {
    schema_copy: Arc<dyn PhaseExecutor>,
    data_copy: Arc<dyn PhaseExecutor>,
    verification: Arc<dyn PhaseExecutor>,
}

impl ExecutorRegistry {
    pub fn new(
        schema_copy: Arc<dyn PhaseExecutor>,
        data_copy: Arc<dyn PhaseExecutor>,
        verification: Arc<dyn PhaseExecutor>,
    ) -> Self {
        Self {
            schema_copy,
            data_copy,
            verification,
        }
    }

    pub fn executor(&self, phase: Phase) -> Arc<dyn PhaseExecutor> {
        match phase {
            Phase::Schema => self.schema_copy.clone(),
            Phase::Data => self.data_copy.clone(),
            Phase::Verification => self.verification.clone(),
        }
    }
}

/// succeeds immediately, the placeholder wiring until real transfer
/// collaborators are plugged in
pub struct NoopPhaseExecutor {
    name: String,
}

impl NoopPhaseExecutor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn registry() -> ExecutorRegistry {
        ExecutorRegistry::new(
            Arc::new(Self::new("schema_copy")),
            Arc::new(Self::new("data_copy")),
            Arc::new(Self::new("verification")),
        )
    }
}

#[async_trait]
impl PhaseExecutor for NoopPhaseExecutor {
    async fn run(&self, task: &TaskModel) -> anyhow::Result<PhaseOutcome> {
        Ok(PhaseOutcome::ok(&format!(
            "{} skipped for [{}], no executor configured",
            self.name,
            task.task_name()
        )))
    }
}
