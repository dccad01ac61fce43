use async_trait::async_trait;

use wm_common::{
    config::config_enums::{JobBatchStatus, MigrationStatus},
    meta::{job::JobModel, job_batch::JobBatchModel},
};

#[derive(Clone, Debug, Default)]
pub struct JobFilter {
    pub source_name: Option<String>,
    pub db_name: Option<String>,
    pub status: Option<MigrationStatus>,
    pub include_deleted: bool,
    pub offset: usize,
    /// 0 means no limit
    pub limit: usize,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: JobModel) -> anyhow::Result<i64>;

    async fn get_job(&self, job_id: i64) -> anyhow::Result<Option<JobModel>>;

    async fn list_jobs(&self, filter: &JobFilter) -> anyhow::Result<Vec<JobModel>>;

    async fn count_jobs(&self, filter: &JobFilter) -> anyhow::Result<usize>;

    async fn update_job_status(&self, job_id: i64, status: MigrationStatus) -> anyhow::Result<()>;

    async fn set_job_stopped(&self, job_id: i64, stopped: bool) -> anyhow::Result<()>;

    async fn set_job_deleted(&self, job_id: i64) -> anyhow::Result<()>;

    /// atomically bump and return the job's batch sequence
    async fn next_batch_seq(&self, job_id: i64) -> anyhow::Result<i64>;

    async fn insert_batch(&self, batch: JobBatchModel) -> anyhow::Result<i64>;

    async fn get_batch(&self, batch_id: i64) -> anyhow::Result<Option<JobBatchModel>>;

    async fn update_batch(
        &self,
        batch_id: i64,
        status: JobBatchStatus,
        err_msg: &str,
    ) -> anyhow::Result<()>;

    async fn list_batches(&self, job_id: i64) -> anyhow::Result<Vec<JobBatchModel>>;

    /// non-deleted jobs carrying a timer, polled by the batch scheduler
    async fn list_timed_jobs(&self) -> anyhow::Result<Vec<JobModel>>;
}
