use std::collections::HashMap;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use super::timer_config::TimerConfig;
use crate::{error::Error, meta::partition_filter::PartitionFilter};

pub const TABLE_PLACEHOLDER: &str = "${table}";
pub const DEFAULT_PARTITION_GROUP_MAX_NUM: usize = 50;

fn default_true() -> bool {
    true
}

fn default_partition_group_max_num() -> usize {
    DEFAULT_PARTITION_GROUP_MAX_NUM
}

/// the migration rules a caller submits together with a job,
/// kept as one serde document so the store can persist it as-is
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobConfig {
    /// explicit table list, used when job type is `tables`
    #[serde(default)]
    pub tables: Vec<String>,
    /// pre-resolved partition ids, used when job type is `partitions`
    #[serde(default)]
    pub partitions: Vec<i64>,
    #[serde(default)]
    pub table_whitelist: Vec<String>,
    #[serde(default)]
    pub table_blacklist: Vec<String>,
    /// exact destination-table overrides, src table -> dst table
    #[serde(default)]
    pub table_mapping: HashMap<String, String>,
    /// template applied when no exact override exists, must contain `${table}`
    #[serde(default)]
    pub table_mapping_pattern: String,
    /// destination column renames, applied to every candidate table
    #[serde(default)]
    pub column_mapping: HashMap<String, String>,
    /// per-table partition predicate, e.g. `pt >= '20240101' and region = 'cn'`
    #[serde(default)]
    pub partition_filters: HashMap<String, String>,
    #[serde(default)]
    pub schema_only: bool,
    #[serde(default = "default_true")]
    pub increment: bool,
    #[serde(default = "default_true")]
    pub enable_verification: bool,
    #[serde(default)]
    pub merge_partition_enabled: bool,
    /// partition-value levels kept when merging partition groups
    #[serde(default)]
    pub max_partition_level: u32,
    #[serde(default = "default_partition_group_max_num")]
    pub partition_group_max_num: usize,
    /// 0 disables the size cap
    #[serde(default)]
    pub partition_group_max_size_gb: u64,
    #[serde(default)]
    pub timer: TimerConfig,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            partitions: Vec::new(),
            table_whitelist: Vec::new(),
            table_blacklist: Vec::new(),
            table_mapping: HashMap::new(),
            table_mapping_pattern: String::new(),
            column_mapping: HashMap::new(),
            partition_filters: HashMap::new(),
            schema_only: false,
            increment: true,
            enable_verification: true,
            merge_partition_enabled: false,
            max_partition_level: 0,
            partition_group_max_num: DEFAULT_PARTITION_GROUP_MAX_NUM,
            partition_group_max_size_gb: 0,
            timer: TimerConfig::none(),
        }
    }
}

impl JobConfig {
    /// rejects inconsistent configs synchronously, before anything is stored
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.table_mapping_pattern.is_empty()
            && !self.table_mapping_pattern.contains(TABLE_PLACEHOLDER)
        {
            bail!(Error::ConfigError(format!(
                "table_mapping_pattern [{}] must contain {}",
                self.table_mapping_pattern, TABLE_PLACEHOLDER
            )));
        }

        for (table, expr) in &self.partition_filters {
            PartitionFilter::parse(expr).map_err(|e| {
                Error::ConfigError(format!(
                    "invalid partition_filter for table [{}]: {}",
                    table, e
                ))
            })?;
        }

        for (src_col, dst_col) in &self.column_mapping {
            if src_col.is_empty() || dst_col.is_empty() {
                bail!(Error::ConfigError(
                    "column_mapping entries must be non-empty".into()
                ));
            }
        }

        self.timer.validate()?;
        Ok(())
    }

    /// exact override first, then the template, then the source name as-is
    pub fn dst_table_name(&self, src_table: &str) -> String {
        if let Some(dst_table) = self.table_mapping.get(src_table) {
            return dst_table.clone();
        }
        if !self.table_mapping_pattern.is_empty() {
            return self
                .table_mapping_pattern
                .replace(TABLE_PLACEHOLDER, src_table);
        }
        src_table.to_string()
    }

    pub fn partition_filter(&self, table: &str) -> anyhow::Result<Option<PartitionFilter>> {
        match self.partition_filters.get(table) {
            Some(expr) => Ok(Some(PartitionFilter::parse(expr)?)),
            None => Ok(None),
        }
    }
}
