use serde::{Deserialize, Serialize};

use crate::config::config_enums::JobBatchStatus;

/// one execution instance of a job, either the single run of a
/// one-shot job or one timer firing of a timed job
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JobBatchModel {
    pub id: i64,
    pub job_id: i64,
    /// per-job sequence number, 1 for the submission batch
    pub batch_seq: i64,
    pub status: JobBatchStatus,
    pub err_msg: String,
    pub task_count: usize,
    pub create_time: i64,
}
