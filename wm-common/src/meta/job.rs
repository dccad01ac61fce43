use serde::{Deserialize, Serialize};

use crate::config::{
    config_enums::{JobType, MigrationStatus},
    job_config::JobConfig,
};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JobModel {
    pub id: i64,
    pub description: String,
    pub source_name: String,
    pub db_name: String,
    pub dst_project: String,
    pub dst_schema: String,
    pub job_type: JobType,
    pub status: MigrationStatus,
    pub stopped: bool,
    pub deleted: bool,
    /// sequence number of the most recent batch of this job
    pub last_batch_seq: i64,
    pub config: JobConfig,
    pub create_time: i64,
    pub update_time: i64,
}

impl JobModel {
    /// a job that has already produced at least one batch,
    /// relevant for incremental re-expansion decisions
    pub fn has_prior_batch(&self) -> bool {
        self.last_batch_seq > 0
    }
}
