use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::config_enums::TaskStatus;

/// the unit of schedulable work: one table, or one partition group
/// of a partitioned table, within one job batch
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TaskModel {
    pub id: i64,
    pub job_id: i64,
    pub batch_id: i64,
    pub source_id: i64,
    pub db_id: i64,
    pub table_id: i64,
    pub source_name: String,
    pub db_name: String,
    pub table_name: String,
    pub dst_project: String,
    pub dst_schema: String,
    pub dst_table: String,
    /// destination column renames resolved at expansion time
    pub column_mapping: HashMap<String, String>,
    /// empty for a whole-table task of a non-partitioned table
    pub partition_ids: Vec<i64>,
    pub table_is_partitioned: bool,
    pub status: TaskStatus,
    pub stopped: bool,
    pub deleted: bool,
    pub retried_times: u32,
    pub start_time: i64,
    pub end_time: i64,
    pub create_time: i64,
    pub update_time: i64,
}

impl TaskModel {
    pub fn task_name(&self) -> String {
        format!("{}.{}.{}", self.source_name, self.db_name, self.table_name)
    }

    pub fn dst_full_name(&self) -> String {
        if self.dst_schema.is_empty() {
            format!("{}.{}", self.dst_project, self.dst_table)
        } else {
            format!("{}.{}.{}", self.dst_project, self.dst_schema, self.dst_table)
        }
    }

    /// no two tasks of one batch may share this identity
    pub fn dst_identity(&self) -> String {
        let mut partition_ids = self.partition_ids.clone();
        partition_ids.sort_unstable();
        format!("{}:{:?}", self.dst_full_name(), partition_ids)
    }

    /// a live task occupies its table/partitions, blocking duplicate work
    pub fn is_live(&self) -> bool {
        !self.deleted && !self.stopped && !self.status.is_terminal()
    }
}
