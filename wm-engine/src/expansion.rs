use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use anyhow::bail;

use wm_common::{
    config::config_enums::{JobType, MigrationStatus},
    error::Error,
    log_info, log_warn,
    meta::{
        catalog::{PartitionModel, SourceModel, TableModel},
        job::JobModel,
        task::TaskModel,
    },
};
use wm_store::{CatalogStore, TaskStore};

use crate::grouping::{grouping_for, PartitionGrouping};

/// turns a job definition plus the current catalog snapshot into the
/// concrete task set of one batch. fails fast on inconsistent config,
/// an empty candidate set is a no-op, not an error.
pub struct TaskExpander {
    catalog: Arc<dyn CatalogStore>,
    tasks: Arc<dyn TaskStore>,
}

impl TaskExpander {
    pub fn new(catalog: Arc<dyn CatalogStore>, tasks: Arc<dyn TaskStore>) -> Self {
        Self { catalog, tasks }
    }

    pub async fn expand(&self, job: &JobModel) -> anyhow::Result<Vec<TaskModel>> {
        let tasks = match job.job_type {
            JobType::Database => self.expand_database(job).await?,
            JobType::Tables => self.expand_tables(job).await?,
            JobType::Partitions => self.expand_partitions(job).await?,
        };

        Self::check_duplicate_destinations(&tasks)?;
        self.check_live_conflicts(&tasks).await?;
        Ok(Self::interleave_by_table(tasks))
    }

    async fn resolve_source(&self, job: &JobModel) -> anyhow::Result<SourceModel> {
        match self.catalog.get_source_by_name(&job.source_name).await? {
            Some(source) => Ok(source),
            None => bail!(Error::ExpansionError(format!(
                "source [{}] not found in catalog",
                job.source_name
            ))),
        }
    }

    async fn expand_database(&self, job: &JobModel) -> anyhow::Result<Vec<TaskModel>> {
        let source = self.resolve_source(job).await?;
        let db = match self
            .catalog
            .get_database_by_name(source.id, &job.db_name)
            .await?
        {
            Some(db) => db,
            None => bail!(Error::ExpansionError(format!(
                "database [{}.{}] not found in catalog",
                job.source_name, job.db_name
            ))),
        };

        let mut tables = self.catalog.list_tables(db.id).await?;
        let config = &job.config;
        if !config.table_whitelist.is_empty() {
            let whitelist: HashSet<&String> = config.table_whitelist.iter().collect();
            tables.retain(|table| whitelist.contains(&table.name));
        } else if !config.table_blacklist.is_empty() {
            let blacklist: HashSet<&String> = config.table_blacklist.iter().collect();
            tables.retain(|table| !blacklist.contains(&table.name));
        }

        if tables.is_empty() {
            log_warn!(
                "job [{}]: no candidate tables in [{}.{}]",
                job.id,
                job.source_name,
                job.db_name
            );
            return Ok(Vec::new());
        }
        self.tasks_for_tables(job, tables).await
    }

    async fn expand_tables(&self, job: &JobModel) -> anyhow::Result<Vec<TaskModel>> {
        let source = self.resolve_source(job).await?;
        let db = match self
            .catalog
            .get_database_by_name(source.id, &job.db_name)
            .await?
        {
            Some(db) => db,
            None => bail!(Error::ExpansionError(format!(
                "database [{}.{}] not found in catalog",
                job.source_name, job.db_name
            ))),
        };

        let mut tables = Vec::with_capacity(job.config.tables.len());
        for name in &job.config.tables {
            match self.catalog.get_table_by_name(db.id, name).await? {
                Some(table) => tables.push(table),
                None => bail!(Error::ExpansionError(format!(
                    "table [{}.{}] referenced by job [{}] does not exist",
                    job.db_name, name, job.id
                ))),
            }
        }
        self.tasks_for_tables(job, tables).await
    }

    /// partition mode bypasses whitelist/blacklist, filters and the
    /// increment decision: the caller already picked the partitions
    async fn expand_partitions(&self, job: &JobModel) -> anyhow::Result<Vec<TaskModel>> {
        let partition_ids = &job.config.partitions;
        let partitions = self.catalog.get_partitions(partition_ids).await?;
        if partitions.len() != partition_ids.len() {
            let found: HashSet<i64> = partitions.iter().map(|p| p.id).collect();
            let missing: Vec<i64> = partition_ids
                .iter()
                .filter(|id| !found.contains(id))
                .copied()
                .collect();
            bail!(Error::ExpansionError(format!(
                "job [{}] references unknown partitions: {:?}",
                job.id, missing
            )));
        }

        let mut by_table: HashMap<i64, Vec<PartitionModel>> = HashMap::new();
        for partition in partitions {
            by_table.entry(partition.table_id).or_default().push(partition);
        }
        let mut table_ids: Vec<i64> = by_table.keys().copied().collect();
        table_ids.sort_unstable();

        let grouping = grouping_for(&job.config);
        let mut tasks = Vec::new();
        for table_id in table_ids {
            let table = match self.catalog.get_table(table_id).await? {
                Some(table) => table,
                None => bail!(Error::ExpansionError(format!(
                    "table [{}] of submitted partitions not found",
                    table_id
                ))),
            };
            let partitions = by_table.remove(&table_id).unwrap();
            for group in grouping.group(partitions) {
                let mut task = Self::base_task(job, &table);
                task.partition_ids = group.iter().map(|p| p.id).collect();
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    async fn tasks_for_tables(
        &self,
        job: &JobModel,
        tables: Vec<TableModel>,
    ) -> anyhow::Result<Vec<TaskModel>> {
        let grouping = grouping_for(&job.config);
        let mut tasks = Vec::new();
        for table in tables {
            let partitions = if table.has_partitions {
                self.catalog.list_partitions(table.id).await?
            } else {
                Vec::new()
            };
            tasks.extend(Self::tasks_for_table(job, &table, partitions, &*grouping)?);
        }
        Ok(tasks)
    }

    fn tasks_for_table(
        job: &JobModel,
        table: &TableModel,
        mut partitions: Vec<PartitionModel>,
        grouping: &dyn PartitionGrouping,
    ) -> anyhow::Result<Vec<TaskModel>> {
        let config = &job.config;

        if !table.has_partitions {
            // a timed incremental job re-migrates a finished table only when
            // the scanner saw it change
            if job.has_prior_batch()
                && config.increment
                && table.status == MigrationStatus::Done
                && !table.updated
            {
                log_info!(
                    "job [{}]: table [{}] unchanged since last batch, no task",
                    job.id,
                    table.full_name()
                );
                return Ok(Vec::new());
            }
            return Ok(vec![Self::base_task(job, table)]);
        }

        if let Some(filter) = config.partition_filter(&table.name)? {
            partitions.retain(|partition| {
                let key_values: HashMap<String, String> =
                    partition.key_values().into_iter().collect();
                filter.matches(&key_values)
            });
            if partitions.is_empty() {
                log_warn!(
                    "job [{}]: partition filter [{}] selected no partitions of [{}]",
                    job.id,
                    filter.expr_str(),
                    table.full_name()
                );
            }
        }

        if config.increment {
            partitions.retain(|partition| {
                partition.updated
                    || (partition.status != MigrationStatus::Done
                        && partition.status != MigrationStatus::Doing)
            });
        }

        if partitions.is_empty() {
            // nothing to copy, the destination table still has to exist
            if job.has_prior_batch() && table.status == MigrationStatus::Done {
                log_info!(
                    "job [{}]: table [{}] already done and has no new partitions, no task",
                    job.id,
                    table.full_name()
                );
                return Ok(Vec::new());
            }
            return Ok(vec![Self::base_task(job, table)]);
        }

        let mut tasks = Vec::new();
        for group in grouping.group(partitions) {
            let mut task = Self::base_task(job, table);
            task.partition_ids = group.iter().map(|p| p.id).collect();
            tasks.push(task);
        }
        Ok(tasks)
    }

    fn base_task(job: &JobModel, table: &TableModel) -> TaskModel {
        TaskModel {
            job_id: job.id,
            source_id: table.source_id,
            db_id: table.db_id,
            table_id: table.id,
            source_name: job.source_name.clone(),
            db_name: table.db_name.clone(),
            table_name: table.name.clone(),
            dst_project: job.dst_project.clone(),
            dst_schema: job.dst_schema.clone(),
            dst_table: job.config.dst_table_name(&table.name),
            column_mapping: job.config.column_mapping.clone(),
            table_is_partitioned: table.has_partitions,
            ..Default::default()
        }
    }

    /// a destination collision is a configuration error, never silently
    /// resolved
    fn check_duplicate_destinations(tasks: &[TaskModel]) -> anyhow::Result<()> {
        let mut seen: HashSet<String> = HashSet::new();
        for task in tasks {
            let identity = task.dst_identity();
            if !seen.insert(identity) {
                bail!(Error::ExpansionError(format!(
                    "mapping rules produce duplicate destination [{}] (source table [{}])",
                    task.dst_full_name(),
                    task.task_name()
                )));
            }
        }
        Ok(())
    }

    async fn check_live_conflicts(&self, tasks: &[TaskModel]) -> anyhow::Result<()> {
        let mut table_ids = Vec::new();
        let mut partition_ids = Vec::new();
        for task in tasks {
            if task.partition_ids.is_empty() {
                table_ids.push(task.table_id);
            } else {
                partition_ids.extend(&task.partition_ids);
            }
        }

        let live = self.tasks.live_tasks_for(&table_ids, &partition_ids).await?;
        if !live.is_empty() {
            let names: HashSet<String> = live.iter().map(|task| task.task_name()).collect();
            let mut names: Vec<String> = names.into_iter().collect();
            names.sort();
            bail!(Error::ExpansionError(format!(
                "tasks are already running or ready to run for: {}",
                names.join(", ")
            )));
        }
        Ok(())
    }

    /// reorder so consecutive tasks rarely hit the same table, which keeps
    /// destination-side partition DDL from contending on one table
    fn interleave_by_table(tasks: Vec<TaskModel>) -> Vec<TaskModel> {
        let mut group_order = Vec::new();
        let mut by_table: HashMap<i64, Vec<TaskModel>> = HashMap::new();
        for task in tasks {
            if !by_table.contains_key(&task.table_id) {
                group_order.push(task.table_id);
            }
            by_table.entry(task.table_id).or_default().push(task);
        }

        let mut groups: Vec<Vec<TaskModel>> = group_order
            .into_iter()
            .map(|table_id| by_table.remove(&table_id).unwrap())
            .collect();

        let mut interleaved = Vec::new();
        let mut index = 0;
        loop {
            let mut stop = true;
            for group in groups.iter_mut() {
                if index < group.len() {
                    interleaved.push(std::mem::take(&mut group[index]));
                    stop = false;
                }
            }
            if stop {
                break;
            }
            index += 1;
        }
        interleaved
    }
}
