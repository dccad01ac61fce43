use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use serde::Serialize;

use wm_common::{
    config::config_enums::{MigrationStatus, TaskStatus},
    log_info,
};
use wm_store::{CatalogStore, JobFilter, JobStore, TaskStore};

/// the roll-up of child statuses into one entity status:
/// anything running wins, then failure, then partial completion.
pub fn roll_up(statuses: &[MigrationStatus]) -> MigrationStatus {
    if statuses.is_empty() {
        return MigrationStatus::Init;
    }

    let mut has_done = false;
    let mut has_init = false;
    let mut has_part_done = false;
    for status in statuses {
        match status {
            MigrationStatus::Doing => return MigrationStatus::Doing,
            MigrationStatus::Done => has_done = true,
            MigrationStatus::Init => has_init = true,
            MigrationStatus::PartDone => has_part_done = true,
            MigrationStatus::Failed => {}
        }
    }

    if statuses.contains(&MigrationStatus::Failed) {
        return MigrationStatus::Failed;
    }
    if has_part_done {
        return MigrationStatus::PartDone;
    }
    if has_done && has_init {
        return MigrationStatus::PartDone;
    }
    if has_done {
        return MigrationStatus::Done;
    }
    MigrationStatus::Init
}

/// a task's contribution to its job's roll-up
pub fn task_migration_status(status: TaskStatus) -> MigrationStatus {
    match status {
        TaskStatus::Done => MigrationStatus::Done,
        TaskStatus::Init => MigrationStatus::Init,
        _ if status.is_failed() => MigrationStatus::Failed,
        // mid-pipeline, running or parked between phases
        _ => MigrationStatus::Doing,
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct StatusCounters {
    pub init: usize,
    pub doing: usize,
    pub done: usize,
    pub failed: usize,
    pub part_done: usize,
}

impl StatusCounters {
    pub fn add(&mut self, status: MigrationStatus) {
        match status {
            MigrationStatus::Init => self.init += 1,
            MigrationStatus::Doing => self.doing += 1,
            MigrationStatus::Done => self.done += 1,
            MigrationStatus::Failed => self.failed += 1,
            MigrationStatus::PartDone => self.part_done += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.init + self.doing + self.done + self.failed + self.part_done
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct DatabaseProgress {
    pub db_id: i64,
    pub status: MigrationStatus,
    pub tables: StatusCounters,
    pub partitions: StatusCounters,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SourceProgress {
    pub source_id: i64,
    pub status: MigrationStatus,
    pub databases: StatusCounters,
    pub tables: StatusCounters,
    pub partitions: StatusCounters,
}

/// recomputes the partition -> table -> database -> source roll-up and the
/// per-job status after task transitions. the roll-up is a pure function of
/// current child states, so no consistency pass is ever needed; previous
/// results are kept only to skip writes for unchanged entities.
pub struct ProgressAggregator {
    jobs: Arc<dyn JobStore>,
    tasks: Arc<dyn TaskStore>,
    catalog: Arc<dyn CatalogStore>,
    prev_tables: Mutex<HashMap<i64, MigrationStatus>>,
    prev_dbs: Mutex<HashMap<i64, MigrationStatus>>,
    prev_sources: Mutex<HashMap<i64, MigrationStatus>>,
    prev_jobs: Mutex<HashMap<i64, MigrationStatus>>,
}

impl ProgressAggregator {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        tasks: Arc<dyn TaskStore>,
        catalog: Arc<dyn CatalogStore>,
    ) -> Self {
        Self {
            jobs,
            tasks,
            catalog,
            prev_tables: Mutex::new(HashMap::new()),
            prev_dbs: Mutex::new(HashMap::new()),
            prev_sources: Mutex::new(HashMap::new()),
            prev_jobs: Mutex::new(HashMap::new()),
        }
    }

    /// returns the number of entities whose status changed
    pub async fn refresh(&self) -> anyhow::Result<usize> {
        let mut changed = 0;

        // partitioned tables roll up from their partitions; non-partitioned
        // tables are written directly by their task driver
        let partition_stat = self.catalog.partition_status_stat().await?;
        let table_status = Self::roll_up_stat(&partition_stat);
        for (table_id, status) in Self::diff(&self.prev_tables, table_status) {
            self.catalog.update_table_status(table_id, status).await?;
            changed += 1;
        }

        let table_stat = self.catalog.table_status_stat().await?;
        let db_status = Self::roll_up_stat(&table_stat);
        for (db_id, status) in Self::diff(&self.prev_dbs, db_status) {
            self.catalog.update_database_status(db_id, status).await?;
            changed += 1;
        }

        let db_stat = self.catalog.database_status_stat().await?;
        let source_status = Self::roll_up_stat(&db_stat);
        for (source_id, status) in Self::diff(&self.prev_sources, source_status) {
            self.catalog.update_source_status(source_id, status).await?;
            changed += 1;
        }

        changed += self.refresh_job_statuses().await?;
        Ok(changed)
    }

    async fn refresh_job_statuses(&self) -> anyhow::Result<usize> {
        let jobs = self.jobs.list_jobs(&JobFilter::default()).await?;
        let mut changed = 0;
        for job in jobs {
            let tasks = self.tasks.tasks_of_job(job.id).await?;
            if tasks.is_empty() {
                continue;
            }
            let statuses: Vec<MigrationStatus> = tasks
                .iter()
                .map(|task| task_migration_status(task.status))
                .collect();
            let status = roll_up(&statuses);

            let stale = {
                let mut prev = self.prev_jobs.lock().unwrap();
                prev.insert(job.id, status) != Some(status)
            };
            if stale && job.status != status {
                self.jobs.update_job_status(job.id, status).await?;
                log_info!("job [{}] status -> {}", job.id, status);
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn roll_up_stat(stat: &[(i64, MigrationStatus)]) -> HashMap<i64, MigrationStatus> {
        let mut grouped: HashMap<i64, Vec<MigrationStatus>> = HashMap::new();
        for (entity_id, status) in stat {
            grouped.entry(*entity_id).or_default().push(*status);
        }
        grouped
            .into_iter()
            .map(|(entity_id, statuses)| (entity_id, roll_up(&statuses)))
            .collect()
    }

    /// entries whose status differs from the previous refresh
    fn diff(
        prev: &Mutex<HashMap<i64, MigrationStatus>>,
        current: HashMap<i64, MigrationStatus>,
    ) -> Vec<(i64, MigrationStatus)> {
        let mut prev = prev.lock().unwrap();
        let changed: Vec<(i64, MigrationStatus)> = current
            .iter()
            .filter(|(entity_id, status)| prev.get(entity_id) != Some(status))
            .map(|(entity_id, status)| (*entity_id, *status))
            .collect();
        *prev = current;
        changed
    }

    pub async fn database_progress(&self, db_id: i64) -> anyhow::Result<DatabaseProgress> {
        let tables = self.catalog.list_tables(db_id).await?;
        let mut progress = DatabaseProgress {
            db_id,
            ..Default::default()
        };
        let mut table_statuses = Vec::with_capacity(tables.len());
        for table in tables {
            progress.tables.add(table.status);
            table_statuses.push(table.status);
            if table.has_partitions {
                for partition in self.catalog.list_partitions(table.id).await? {
                    progress.partitions.add(partition.status);
                }
            }
        }
        progress.status = roll_up(&table_statuses);
        Ok(progress)
    }

    pub async fn source_progress(&self, source_id: i64) -> anyhow::Result<SourceProgress> {
        let dbs = self.catalog.list_databases(source_id).await?;
        let mut progress = SourceProgress {
            source_id,
            ..Default::default()
        };
        let mut db_statuses = Vec::with_capacity(dbs.len());
        for db in dbs {
            progress.databases.add(db.status);
            db_statuses.push(db.status);
            let db_progress = self.database_progress(db.id).await?;
            progress.tables.init += db_progress.tables.init;
            progress.tables.doing += db_progress.tables.doing;
            progress.tables.done += db_progress.tables.done;
            progress.tables.failed += db_progress.tables.failed;
            progress.tables.part_done += db_progress.tables.part_done;
            progress.partitions.init += db_progress.partitions.init;
            progress.partitions.doing += db_progress.partitions.doing;
            progress.partitions.done += db_progress.partitions.done;
            progress.partitions.failed += db_progress.partitions.failed;
            progress.partitions.part_done += db_progress.partitions.part_done;
        }
        progress.status = roll_up(&db_statuses);
        Ok(progress)
    }
}
