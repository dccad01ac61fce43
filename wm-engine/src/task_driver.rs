use std::sync::Arc;

use anyhow::bail;

use wm_common::{
    config::config_enums::{MigrationStatus, TaskStatus},
    error::Error,
    log_error, log_finished, log_task,
    meta::{task::TaskModel, task_log::TaskLogEntry},
};
use wm_store::{CatalogStore, JobStore, TaskStore};

use crate::{
    events::{EventQueue, TaskEvent},
    executor::{ExecutorRegistry, PhaseOutcome},
    task_fsm::{next_phase, Phase},
};

pub const ACTION_DONE: &str = "done";
pub const ACTION_STOP: &str = "stop";

/// drives one admitted task through its remaining phases. owns the task
/// record exclusively while running; the only outside write it observes
/// is the cooperative `stopped` flag, checked before each dispatch.
pub struct TaskDriver {
    task_id: i64,
    jobs: Arc<dyn JobStore>,
    tasks: Arc<dyn TaskStore>,
    catalog: Arc<dyn CatalogStore>,
    registry: Arc<ExecutorRegistry>,
    events: Arc<EventQueue>,
}

impl TaskDriver {
    pub fn new(
        task_id: i64,
        jobs: Arc<dyn JobStore>,
        tasks: Arc<dyn TaskStore>,
        catalog: Arc<dyn CatalogStore>,
        registry: Arc<ExecutorRegistry>,
        events: Arc<EventQueue>,
    ) -> Self {
        Self {
            task_id,
            jobs,
            tasks,
            catalog,
            registry,
            events,
        }
    }

    pub async fn run(self) -> anyhow::Result<TaskStatus> {
        let task = self.load_task().await?;
        if task.deleted || task.status == TaskStatus::Done {
            return Ok(task.status);
        }

        let job = match self.jobs.get_job(task.job_id).await? {
            Some(job) => job,
            None => bail!(Error::StoreError(format!(
                "job [{}] of task [{}] not found",
                task.job_id, task.id
            ))),
        };
        let schema_only = job.config.schema_only;
        let enable_verification = job.config.enable_verification;

        log_task!("task [{}] [{}] admitted", task.id, task.task_name());
        self.tasks.set_task_start(task.id).await?;
        self.update_target_status(&task, MigrationStatus::Doing)
            .await?;

        loop {
            let task = self.load_task().await?;
            if task.stopped {
                self.append_log(
                    &task,
                    task.status,
                    ACTION_STOP,
                    "task stopped, no further phases dispatched",
                )
                .await?;
                log_task!("task [{}] [{}] stopped", task.id, task.task_name());
                return Ok(task.status);
            }

            let phase = match next_phase(task.status, schema_only, enable_verification) {
                Some(phase) => phase,
                None => return self.complete(task).await,
            };

            self.transition(&task, phase.doing_status(), &phase.to_string(), "phase started")
                .await?;

            let outcome = match self.registry.executor(phase).run(&task).await {
                Ok(outcome) => outcome,
                // an executor error (timeouts included) is a failure outcome
                Err(e) => PhaseOutcome::failed(&format!("executor error: {}", e)),
            };

            if outcome.success {
                self.transition(&task, phase.done_status(), &phase.to_string(), &outcome.message)
                    .await?;

                // a partitioned table with nothing to copy is finished once
                // its destination schema exists
                if phase == Phase::Schema
                    && task.table_is_partitioned
                    && task.partition_ids.is_empty()
                {
                    let task = self.load_task().await?;
                    return self.complete(task).await;
                }
            } else {
                self.transition(&task, phase.failed_status(), &phase.to_string(), &outcome.message)
                    .await?;
                self.update_target_status(&task, MigrationStatus::Failed)
                    .await?;
                self.tasks.set_task_end(task.id).await?;
                log_error!(
                    "task [{}] [{}] failed in {}: {}",
                    task.id,
                    task.task_name(),
                    phase,
                    outcome.message
                );
                return Ok(phase.failed_status());
            }
        }
    }

    async fn complete(&self, task: TaskModel) -> anyhow::Result<TaskStatus> {
        if task.status != TaskStatus::Done {
            self.transition(&task, TaskStatus::Done, ACTION_DONE, "task is done")
                .await?;
        }
        self.update_target_status(&task, MigrationStatus::Done)
            .await?;
        self.tasks.set_task_end(task.id).await?;
        log_finished!("task [{}] [{}] done", task.id, task.task_name());
        Ok(TaskStatus::Done)
    }

    async fn load_task(&self) -> anyhow::Result<TaskModel> {
        match self.tasks.get_task(self.task_id).await? {
            Some(task) => Ok(task),
            None => bail!(Error::StoreError(format!(
                "task [{}] not found",
                self.task_id
            ))),
        }
    }

    async fn transition(
        &self,
        task: &TaskModel,
        status: TaskStatus,
        action: &str,
        message: &str,
    ) -> anyhow::Result<()> {
        self.tasks.update_task_status(task.id, status).await?;
        self.append_log(task, status, action, message).await?;
        self.events.push(TaskEvent {
            task_id: task.id,
            job_id: task.job_id,
            status,
        });
        Ok(())
    }

    async fn append_log(
        &self,
        task: &TaskModel,
        status: TaskStatus,
        action: &str,
        message: &str,
    ) -> anyhow::Result<()> {
        self.tasks
            .append_task_log(TaskLogEntry {
                task_id: task.id,
                status,
                action: action.to_string(),
                message: message.to_string(),
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    /// partition tasks own their partitions' status, whole-table tasks own
    /// the table's status; higher levels are rolled up by the aggregator
    async fn update_target_status(
        &self,
        task: &TaskModel,
        status: MigrationStatus,
    ) -> anyhow::Result<()> {
        if task.partition_ids.is_empty() {
            self.catalog
                .update_table_status(task.table_id, status)
                .await
        } else {
            self.catalog
                .update_partitions_status(&task.partition_ids, status)
                .await
        }
    }
}
