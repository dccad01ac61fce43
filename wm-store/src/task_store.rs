use async_trait::async_trait;

use wm_common::{
    config::config_enums::TaskStatus,
    meta::{task::TaskModel, task_log::TaskLogEntry},
};

#[derive(Clone, Debug, Default)]
pub struct TaskFilter {
    pub job_id: Option<i64>,
    pub batch_id: Option<i64>,
    pub source_name: Option<String>,
    pub db_name: Option<String>,
    pub table_name: Option<String>,
    pub status: Option<TaskStatus>,
    pub include_deleted: bool,
    pub offset: usize,
    /// 0 means no limit
    pub limit: usize,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// ids are assigned in insertion order, which is the admission order
    async fn insert_tasks(&self, tasks: Vec<TaskModel>) -> anyhow::Result<Vec<i64>>;

    async fn get_task(&self, task_id: i64) -> anyhow::Result<Option<TaskModel>>;

    async fn list_tasks(&self, filter: &TaskFilter) -> anyhow::Result<Vec<TaskModel>>;

    async fn count_tasks(&self, filter: &TaskFilter) -> anyhow::Result<usize>;

    async fn update_task_status(&self, task_id: i64, status: TaskStatus) -> anyhow::Result<()>;

    async fn set_task_start(&self, task_id: i64) -> anyhow::Result<()>;

    async fn set_task_end(&self, task_id: i64) -> anyhow::Result<()>;

    async fn set_task_stopped(&self, task_id: i64, stopped: bool) -> anyhow::Result<()>;

    async fn set_task_deleted(&self, task_id: i64) -> anyhow::Result<()>;

    async fn increment_retried_times(&self, task_id: i64) -> anyhow::Result<()>;

    async fn append_task_log(&self, entry: TaskLogEntry) -> anyhow::Result<i64>;

    async fn list_task_logs(&self, task_id: i64) -> anyhow::Result<Vec<TaskLogEntry>>;

    /// live (non-terminal, non-stopped, non-deleted) tasks touching any of
    /// the given whole tables or partitions, the duplicate-work guard
    async fn live_tasks_for(
        &self,
        table_ids: &[i64],
        partition_ids: &[i64],
    ) -> anyhow::Result<Vec<TaskModel>>;

    async fn tasks_of_job(&self, job_id: i64) -> anyhow::Result<Vec<TaskModel>>;

    async fn tasks_of_batch(&self, batch_id: i64) -> anyhow::Result<Vec<TaskModel>>;
}
