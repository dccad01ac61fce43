use std::collections::HashMap;

use wm_common::{config::job_config::JobConfig, meta::catalog::PartitionModel};

/// splits the partitions of one table into task-sized groups
pub trait PartitionGrouping: Send + Sync {
    fn group(&self, partitions: Vec<PartitionModel>) -> Vec<Vec<PartitionModel>>;
}

/// packs partitions in order until a count or byte cap is hit
pub struct CommonPartitionGrouping {
    max_partition_num: usize,
    max_partition_bytes: u64,
}

impl CommonPartitionGrouping {
    pub fn new(max_partition_num: usize, max_partition_size_gb: u64) -> Self {
        Self {
            max_partition_num,
            max_partition_bytes: max_partition_size_gb * 1024 * 1024 * 1024,
        }
    }
}

impl PartitionGrouping for CommonPartitionGrouping {
    fn group(&self, partitions: Vec<PartitionModel>) -> Vec<Vec<PartitionModel>> {
        if partitions.is_empty() {
            return Vec::new();
        }

        if self.max_partition_num == 0 && self.max_partition_bytes == 0 {
            return vec![partitions];
        }

        let mut groups = Vec::new();
        let mut group = Vec::new();
        let mut size = 0u64;

        for partition in partitions {
            size += partition.size;
            group.push(partition);

            let num_full = self.max_partition_num > 0 && group.len() >= self.max_partition_num;
            let size_full = self.max_partition_bytes > 0 && size >= self.max_partition_bytes;
            if num_full || size_full {
                groups.push(std::mem::take(&mut group));
                size = 0;
            }
        }

        if !group.is_empty() {
            groups.push(group);
        }
        groups
    }
}

/// merges partitions sharing a value prefix of `max_level` levels into one
/// group, then packs the merged groups up to a count cap. trades task
/// granularity for throughput on deeply partitioned tables.
pub struct MergedPartitionGrouping {
    max_level: usize,
    max_partition_num: usize,
    fallback: CommonPartitionGrouping,
}

impl MergedPartitionGrouping {
    pub fn new(max_level: usize, max_partition_num: usize, fallback: CommonPartitionGrouping) -> Self {
        Self {
            max_level,
            max_partition_num,
            fallback,
        }
    }
}

impl PartitionGrouping for MergedPartitionGrouping {
    fn group(&self, partitions: Vec<PartitionModel>) -> Vec<Vec<PartitionModel>> {
        if partitions.is_empty() {
            return Vec::new();
        }

        // nothing to merge when the table is not partitioned deeper than the cut
        if partitions[0].levels().len() <= self.max_level {
            return self.fallback.group(partitions);
        }

        if self.max_level == 0 {
            return vec![partitions];
        }

        let mut prefix_order = Vec::new();
        let mut by_prefix: HashMap<String, Vec<PartitionModel>> = HashMap::new();
        for partition in partitions {
            let prefix = partition.value_prefix(self.max_level);
            if !by_prefix.contains_key(&prefix) {
                prefix_order.push(prefix.clone());
            }
            by_prefix.entry(prefix).or_default().push(partition);
        }

        let mut groups = Vec::new();
        let mut group = Vec::new();
        let mut num = 0usize;
        for prefix in prefix_order {
            let merged = by_prefix.remove(&prefix).unwrap();
            num += merged.len();
            group.extend(merged);

            if self.max_partition_num > 0 && num >= self.max_partition_num {
                groups.push(std::mem::take(&mut group));
                num = 0;
            }
        }

        if !group.is_empty() {
            groups.push(group);
        }
        groups
    }
}

pub fn grouping_for(config: &JobConfig) -> Box<dyn PartitionGrouping> {
    let common = CommonPartitionGrouping::new(
        config.partition_group_max_num,
        config.partition_group_max_size_gb,
    );
    if config.merge_partition_enabled {
        Box::new(MergedPartitionGrouping::new(
            config.max_partition_level as usize,
            config.partition_group_max_num,
            common,
        ))
    } else {
        Box::new(common)
    }
}
