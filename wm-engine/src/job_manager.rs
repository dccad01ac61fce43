use std::sync::Arc;

use anyhow::bail;

use wm_common::{
    config::config_enums::{JobBatchStatus, JobType, MigrationStatus, TaskStatus},
    error::Error,
    log_error, log_info,
    meta::{
        catalog::PartitionModel, job::JobModel, job_batch::JobBatchModel, task::TaskModel,
        task_log::TaskLogEntry,
    },
};
use wm_store::{CatalogStore, JobStore, TaskStore};

use crate::{admission::AdmissionController, expansion::TaskExpander};

pub const ACTION_STOP: &str = "stop";
pub const ACTION_START: &str = "start";
pub const ACTION_RETRY: &str = "retry";
pub const ACTION_RESET: &str = "reset";
pub const ACTION_DELETE: &str = "delete";

pub struct BatchRun {
    pub batch_id: i64,
    pub batch_seq: i64,
    pub task_ids: Vec<i64>,
}

/// the engine surface collaborators call: submit and manage jobs, act on
/// tasks. all failures past submission are recorded as data on the batch
/// or the task, never thrown across the admission boundary.
pub struct JobManager {
    jobs: Arc<dyn JobStore>,
    tasks: Arc<dyn TaskStore>,
    catalog: Arc<dyn CatalogStore>,
    expander: TaskExpander,
    admission: Arc<AdmissionController>,
}

impl JobManager {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        tasks: Arc<dyn TaskStore>,
        catalog: Arc<dyn CatalogStore>,
        admission: Arc<AdmissionController>,
    ) -> Self {
        let expander = TaskExpander::new(catalog.clone(), tasks.clone());
        Self {
            jobs,
            tasks,
            catalog,
            expander,
            admission,
        }
    }

    /// configuration errors are rejected here, synchronously; they never
    /// reach the scheduler. expansion failures of the first batch are
    /// recorded on the batch and also returned to the submitter.
    pub async fn submit_job(&self, mut job: JobModel) -> anyhow::Result<i64> {
        job.config.validate()?;
        if job.dst_project.is_empty() {
            bail!(Error::ConfigError("dst_project must not be empty".into()));
        }
        match job.job_type {
            JobType::Tables if job.config.tables.is_empty() => {
                bail!(Error::ConfigError(
                    "job type `tables` requires a non-empty table list".into()
                ));
            }
            JobType::Partitions if job.config.partitions.is_empty() => {
                bail!(Error::ConfigError(
                    "job type `partitions` requires a non-empty partition list".into()
                ));
            }
            _ => {}
        }

        job.status = MigrationStatus::Init;
        job.stopped = false;
        job.deleted = false;
        job.last_batch_seq = 0;

        let job_id = self.jobs.insert_job(job).await?;
        log_info!("job [{}] submitted", job_id);
        self.run_batch(job_id).await?;
        Ok(job_id)
    }

    /// create the next batch of a job and expand it into tasks. called once
    /// at submission and again on each timer firing.
    pub async fn run_batch(&self, job_id: i64) -> anyhow::Result<BatchRun> {
        let job = self.must_get_job(job_id).await?;
        if job.deleted {
            bail!(Error::Unexpected(format!(
                "job [{}] is deleted, no new batches",
                job_id
            )));
        }
        if job.stopped {
            bail!(Error::Unexpected(format!(
                "job [{}] is stopped, no new batches",
                job_id
            )));
        }

        // expand against the pre-increment job so the first batch does not
        // look like a rerun
        let expanded = self.expander.expand(&job).await;
        let batch_seq = self.jobs.next_batch_seq(job_id).await?;

        match expanded {
            Ok(mut tasks) => {
                let err_msg = if tasks.is_empty() {
                    "no tasks to run".to_string()
                } else {
                    String::new()
                };
                let batch_id = self
                    .jobs
                    .insert_batch(JobBatchModel {
                        job_id,
                        batch_seq,
                        status: JobBatchStatus::Ok,
                        err_msg,
                        task_count: tasks.len(),
                        ..Default::default()
                    })
                    .await?;

                if tasks.is_empty() {
                    log_info!("job [{}] batch [{}] expanded to no tasks", job_id, batch_seq);
                    return Ok(BatchRun {
                        batch_id,
                        batch_seq,
                        task_ids: Vec::new(),
                    });
                }

                for task in tasks.iter_mut() {
                    task.batch_id = batch_id;
                }
                self.clear_consumed_updated_flags(&tasks).await?;
                let task_ids = self.tasks.insert_tasks(tasks).await?;
                self.admission.enqueue_all(&task_ids);
                log_info!(
                    "job [{}] batch [{}] expanded to {} tasks",
                    job_id,
                    batch_seq,
                    task_ids.len()
                );
                Ok(BatchRun {
                    batch_id,
                    batch_seq,
                    task_ids,
                })
            }
            Err(e) => {
                self.jobs
                    .insert_batch(JobBatchModel {
                        job_id,
                        batch_seq,
                        status: JobBatchStatus::Failed,
                        err_msg: e.to_string(),
                        ..Default::default()
                    })
                    .await?;
                log_error!("job [{}] batch [{}] failed: {}", job_id, batch_seq, e);
                Err(e)
            }
        }
    }

    async fn clear_consumed_updated_flags(&self, tasks: &[TaskModel]) -> anyhow::Result<()> {
        let mut table_ids = Vec::new();
        let mut partition_ids = Vec::new();
        for task in tasks {
            if task.partition_ids.is_empty() {
                table_ids.push(task.table_id);
            } else {
                partition_ids.extend(&task.partition_ids);
            }
        }
        self.catalog
            .clear_updated_flags(&table_ids, &partition_ids)
            .await
    }

    /// cooperative: removes the task from the queue and prevents the next
    /// phase dispatch, an in-flight executor call is never interrupted
    pub async fn stop_task(&self, task_id: i64) -> anyhow::Result<()> {
        let task = self.must_get_task(task_id).await?;
        if task.status.is_terminal() {
            bail!(Error::Unexpected(format!(
                "task [{}] is terminal ({}), cannot stop",
                task_id, task.status
            )));
        }
        self.tasks.set_task_stopped(task_id, true).await?;
        self.admission.remove_queued(task_id);
        self.append_action_log(&task, ACTION_STOP, "stop requested")
            .await?;
        log_info!("task [{}] stop requested", task_id);
        Ok(())
    }

    pub async fn start_task(&self, task_id: i64) -> anyhow::Result<()> {
        self.readmit_task(task_id, ACTION_START).await
    }

    /// re-admit at the current phase; a failed task re-runs the phase that
    /// failed, never an earlier one
    pub async fn retry_task(&self, task_id: i64) -> anyhow::Result<()> {
        self.readmit_task(task_id, ACTION_RETRY).await
    }

    async fn readmit_task(&self, task_id: i64, action: &str) -> anyhow::Result<()> {
        let task = self.must_get_task(task_id).await?;
        if task.deleted {
            bail!(Error::Unexpected(format!("task [{}] is deleted", task_id)));
        }
        if task.status == TaskStatus::Done {
            bail!(Error::Unexpected(format!(
                "task [{}] is already done",
                task_id
            )));
        }
        if task.status.is_failed() {
            self.tasks.increment_retried_times(task_id).await?;
        }
        self.tasks.set_task_stopped(task_id, false).await?;
        self.append_action_log(&task, action, "re-admitted at current phase")
            .await?;
        self.admission.enqueue(task_id);
        Ok(())
    }

    /// discard forward progress and redo the task from scratch. rejected on
    /// a done task and on a task currently held by a worker.
    pub async fn reset_task(&self, task_id: i64) -> anyhow::Result<()> {
        let task = self.must_get_task(task_id).await?;
        if task.deleted {
            bail!(Error::Unexpected(format!("task [{}] is deleted", task_id)));
        }
        if task.status == TaskStatus::Done {
            bail!(Error::Unexpected(format!(
                "task [{}] is done, reset is not allowed",
                task_id
            )));
        }
        if self.admission.is_running(task_id) {
            bail!(Error::Unexpected(format!(
                "task [{}] is running, stop it before reset",
                task_id
            )));
        }

        self.tasks
            .update_task_status(task_id, TaskStatus::Init)
            .await?;
        self.tasks.increment_retried_times(task_id).await?;
        self.tasks.set_task_stopped(task_id, false).await?;
        self.append_action_log(&task, ACTION_RESET, "phase reset to INIT")
            .await?;
        self.admission.enqueue(task_id);
        Ok(())
    }

    /// legal on terminal or stopped tasks only; deleting the last live task
    /// of a job marks the job deleted
    pub async fn delete_task(&self, task_id: i64) -> anyhow::Result<()> {
        let task = self.must_get_task(task_id).await?;
        if !task.status.is_terminal() && !task.stopped {
            bail!(Error::Unexpected(format!(
                "task [{}] is neither terminal nor stopped, cannot delete",
                task_id
            )));
        }
        self.admission.remove_queued(task_id);
        self.tasks.set_task_deleted(task_id).await?;
        self.append_action_log(&task, ACTION_DELETE, "task deleted")
            .await?;

        let remaining = self
            .tasks
            .tasks_of_job(task.job_id)
            .await?
            .iter()
            .filter(|t| !t.deleted)
            .count();
        if remaining == 0 {
            self.jobs.set_job_deleted(task.job_id).await?;
            log_info!(
                "job [{}] deleted, its last task [{}] was deleted",
                task.job_id,
                task_id
            );
        }
        Ok(())
    }

    pub async fn stop_job(&self, job_id: i64) -> anyhow::Result<()> {
        self.must_get_job(job_id).await?;
        self.jobs.set_job_stopped(job_id, true).await?;

        for task in self.tasks.tasks_of_job(job_id).await? {
            if task.deleted || task.status.is_terminal() {
                continue;
            }
            self.tasks.set_task_stopped(task.id, true).await?;
            self.admission.remove_queued(task.id);
            self.append_action_log(&task, ACTION_STOP, "job stopped")
                .await?;
            // targets that never ran to an outcome drop back to INIT
            if task.status.is_doing() {
                self.reset_target_status(&task).await?;
            }
        }
        log_info!("job [{}] stopped", job_id);
        Ok(())
    }

    /// clears stopped and re-admits every unfinished task at its phase
    pub async fn start_job(&self, job_id: i64) -> anyhow::Result<()> {
        self.must_get_job(job_id).await?;
        self.jobs.set_job_stopped(job_id, false).await?;

        for task in self.tasks.tasks_of_job(job_id).await? {
            if task.deleted || task.status == TaskStatus::Done {
                continue;
            }
            if task.status.is_failed() {
                self.tasks.increment_retried_times(task.id).await?;
            }
            self.tasks.set_task_stopped(task.id, false).await?;
            self.append_action_log(&task, ACTION_START, "job started")
                .await?;
            self.admission.enqueue(task.id);
        }
        log_info!("job [{}] started", job_id);
        Ok(())
    }

    /// re-admits failed tasks only
    pub async fn retry_job(&self, job_id: i64) -> anyhow::Result<()> {
        self.must_get_job(job_id).await?;
        self.jobs.set_job_stopped(job_id, false).await?;

        for task in self.tasks.tasks_of_job(job_id).await? {
            if task.deleted || !task.status.is_failed() {
                continue;
            }
            self.tasks.increment_retried_times(task.id).await?;
            self.tasks.set_task_stopped(task.id, false).await?;
            self.append_action_log(&task, ACTION_RETRY, "job retried")
                .await?;
            self.admission.enqueue(task.id);
        }
        log_info!("job [{}] retried", job_id);
        Ok(())
    }

    /// soft delete, the job and its tasks stay queryable for audit
    pub async fn delete_job(&self, job_id: i64) -> anyhow::Result<()> {
        self.must_get_job(job_id).await?;

        for task in self.tasks.tasks_of_job(job_id).await? {
            if task.deleted {
                continue;
            }
            self.admission.remove_queued(task.id);
            self.tasks.set_task_deleted(task.id).await?;
            if task.status.is_doing() {
                self.reset_target_status(&task).await?;
            }
        }
        self.jobs.set_job_deleted(job_id).await?;
        log_info!("job [{}] deleted", job_id);
        Ok(())
    }

    pub async fn partitions_of_task(&self, task_id: i64) -> anyhow::Result<Vec<PartitionModel>> {
        let task = self.must_get_task(task_id).await?;
        self.catalog.get_partitions(&task.partition_ids).await
    }

    async fn reset_target_status(&self, task: &TaskModel) -> anyhow::Result<()> {
        if task.partition_ids.is_empty() {
            self.catalog
                .update_table_status(task.table_id, MigrationStatus::Init)
                .await
        } else {
            self.catalog
                .update_partitions_status(&task.partition_ids, MigrationStatus::Init)
                .await
        }
    }

    async fn append_action_log(
        &self,
        task: &TaskModel,
        action: &str,
        message: &str,
    ) -> anyhow::Result<()> {
        self.tasks
            .append_task_log(TaskLogEntry {
                task_id: task.id,
                status: task.status,
                action: action.to_string(),
                message: message.to_string(),
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    async fn must_get_job(&self, job_id: i64) -> anyhow::Result<JobModel> {
        match self.jobs.get_job(job_id).await? {
            Some(job) => Ok(job),
            None => bail!(Error::StoreError(format!("job [{}] not found", job_id))),
        }
    }

    async fn must_get_task(&self, task_id: i64) -> anyhow::Result<TaskModel> {
        match self.tasks.get_task(task_id).await? {
            Some(task) => Ok(task),
            None => bail!(Error::StoreError(format!("task [{}] not found", task_id))),
        }
    }
}
