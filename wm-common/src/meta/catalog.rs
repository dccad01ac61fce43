use serde::{Deserialize, Serialize};

use crate::config::config_enums::{MigrationStatus, SourceType};

/// snapshot of an external source catalog, populated by a scanner,
/// read by task expansion and the progress aggregator
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SourceModel {
    pub id: i64,
    pub name: String,
    pub source_type: SourceType,
    pub status: MigrationStatus,
    pub last_scan_time: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DatabaseModel {
    pub id: i64,
    pub source_id: i64,
    pub name: String,
    pub status: MigrationStatus,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TableModel {
    pub id: i64,
    pub source_id: i64,
    pub db_id: i64,
    pub db_name: String,
    pub name: String,
    pub has_partitions: bool,
    /// changed since the last catalog scan
    pub updated: bool,
    pub size: u64,
    pub num_rows: u64,
    pub last_ddl_time: i64,
    pub status: MigrationStatus,
}

impl TableModel {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.db_name, self.name)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PartitionModel {
    pub id: i64,
    pub source_id: i64,
    pub db_id: i64,
    pub table_id: i64,
    /// slash separated key=value levels, e.g. `pt=20240101/region=cn`
    pub value: String,
    pub updated: bool,
    pub size: u64,
    pub num_rows: u64,
    pub last_ddl_time: i64,
    pub status: MigrationStatus,
}

impl PartitionModel {
    pub fn levels(&self) -> Vec<&str> {
        self.value.split('/').filter(|l| !l.is_empty()).collect()
    }

    /// partition value as (key, value) pairs, one per level
    pub fn key_values(&self) -> Vec<(String, String)> {
        self.levels()
            .iter()
            .map(|level| match level.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (level.to_string(), String::new()),
            })
            .collect()
    }

    /// the first `level_count` levels, the grouping key for merged tasks
    pub fn value_prefix(&self, level_count: usize) -> String {
        self.levels()
            .into_iter()
            .take(level_count)
            .collect::<Vec<_>>()
            .join("/")
    }
}
