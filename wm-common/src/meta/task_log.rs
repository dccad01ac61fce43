use serde::{Deserialize, Serialize};

use crate::config::config_enums::TaskStatus;

/// append-only audit trail of a task, one entry per phase transition
/// or user action, immutable once written
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TaskLogEntry {
    pub id: i64,
    pub task_id: i64,
    pub status: TaskStatus,
    pub action: String,
    pub message: String,
    pub create_time: i64,
}
