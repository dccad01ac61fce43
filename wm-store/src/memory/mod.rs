use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use anyhow::bail;
use async_trait::async_trait;
use dashmap::DashMap;

use wm_common::{
    config::config_enums::{JobBatchStatus, MigrationStatus, TaskStatus, TimerType},
    error::Error,
    meta::{
        catalog::{DatabaseModel, PartitionModel, SourceModel, TableModel},
        job::JobModel,
        job_batch::JobBatchModel,
        task::TaskModel,
        task_log::TaskLogEntry,
    },
    monitor::scan_progress::ScanProgress,
    utils::time_util::TimeUtil,
};

use crate::{
    catalog_store::CatalogStore,
    job_store::{JobFilter, JobStore},
    task_store::{TaskFilter, TaskStore},
};

/// arena-style store keyed by integer ids, the in-process stand-in for
/// the durable store. back-references are id fields, never pointers.
#[derive(Default)]
pub struct MemoryStore {
    jobs: DashMap<i64, JobModel>,
    batches: DashMap<i64, JobBatchModel>,
    tasks: DashMap<i64, TaskModel>,
    task_logs: DashMap<i64, Vec<TaskLogEntry>>,

    sources: DashMap<i64, SourceModel>,
    databases: DashMap<i64, DatabaseModel>,
    tables: DashMap<i64, TableModel>,
    partitions: DashMap<i64, PartitionModel>,
    scan_progresses: DashMap<i64, Arc<ScanProgress>>,

    next_job_id: AtomicI64,
    next_batch_id: AtomicI64,
    next_task_id: AtomicI64,
    next_log_id: AtomicI64,
    next_catalog_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(counter: &AtomicI64) -> i64 {
        counter.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn job_matches(job: &JobModel, filter: &JobFilter) -> bool {
        if job.deleted && !filter.include_deleted {
            return false;
        }
        if let Some(source_name) = &filter.source_name {
            if &job.source_name != source_name {
                return false;
            }
        }
        if let Some(db_name) = &filter.db_name {
            if &job.db_name != db_name {
                return false;
            }
        }
        if let Some(status) = &filter.status {
            if &job.status != status {
                return false;
            }
        }
        true
    }

    fn task_matches(task: &TaskModel, filter: &TaskFilter) -> bool {
        if task.deleted && !filter.include_deleted {
            return false;
        }
        if let Some(job_id) = filter.job_id {
            if task.job_id != job_id {
                return false;
            }
        }
        if let Some(batch_id) = filter.batch_id {
            if task.batch_id != batch_id {
                return false;
            }
        }
        if let Some(source_name) = &filter.source_name {
            if &task.source_name != source_name {
                return false;
            }
        }
        if let Some(db_name) = &filter.db_name {
            if &task.db_name != db_name {
                return false;
            }
        }
        if let Some(table_name) = &filter.table_name {
            if &task.table_name != table_name {
                return false;
            }
        }
        if let Some(status) = &filter.status {
            if &task.status != status {
                return false;
            }
        }
        true
    }

    fn page<T>(mut items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
        if offset >= items.len() {
            return Vec::new();
        }
        let mut items = items.split_off(offset);
        if limit > 0 && items.len() > limit {
            items.truncate(limit);
        }
        items
    }

    fn with_task<F>(&self, task_id: i64, mutate: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut TaskModel),
    {
        match self.tasks.get_mut(&task_id) {
            Some(mut task) => {
                mutate(&mut task);
                task.update_time = TimeUtil::now_millis();
                Ok(())
            }
            None => bail!(Error::StoreError(format!("task [{}] not found", task_id))),
        }
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, mut job: JobModel) -> anyhow::Result<i64> {
        let id = Self::next_id(&self.next_job_id);
        job.id = id;
        job.create_time = TimeUtil::now_millis();
        job.update_time = job.create_time;
        self.jobs.insert(id, job);
        Ok(id)
    }

    async fn get_job(&self, job_id: i64) -> anyhow::Result<Option<JobModel>> {
        Ok(self.jobs.get(&job_id).map(|job| job.value().clone()))
    }

    async fn list_jobs(&self, filter: &JobFilter) -> anyhow::Result<Vec<JobModel>> {
        let mut jobs: Vec<JobModel> = self
            .jobs
            .iter()
            .filter(|entry| Self::job_matches(entry.value(), filter))
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by_key(|job| job.id);
        Ok(Self::page(jobs, filter.offset, filter.limit))
    }

    async fn count_jobs(&self, filter: &JobFilter) -> anyhow::Result<usize> {
        Ok(self
            .jobs
            .iter()
            .filter(|entry| Self::job_matches(entry.value(), filter))
            .count())
    }

    async fn update_job_status(&self, job_id: i64, status: MigrationStatus) -> anyhow::Result<()> {
        match self.jobs.get_mut(&job_id) {
            Some(mut job) => {
                job.status = status;
                job.update_time = TimeUtil::now_millis();
                Ok(())
            }
            None => bail!(Error::StoreError(format!("job [{}] not found", job_id))),
        }
    }

    async fn set_job_stopped(&self, job_id: i64, stopped: bool) -> anyhow::Result<()> {
        match self.jobs.get_mut(&job_id) {
            Some(mut job) => {
                job.stopped = stopped;
                job.update_time = TimeUtil::now_millis();
                Ok(())
            }
            None => bail!(Error::StoreError(format!("job [{}] not found", job_id))),
        }
    }

    async fn set_job_deleted(&self, job_id: i64) -> anyhow::Result<()> {
        match self.jobs.get_mut(&job_id) {
            Some(mut job) => {
                job.deleted = true;
                job.stopped = true;
                job.update_time = TimeUtil::now_millis();
                Ok(())
            }
            None => bail!(Error::StoreError(format!("job [{}] not found", job_id))),
        }
    }

    async fn next_batch_seq(&self, job_id: i64) -> anyhow::Result<i64> {
        match self.jobs.get_mut(&job_id) {
            Some(mut job) => {
                job.last_batch_seq += 1;
                Ok(job.last_batch_seq)
            }
            None => bail!(Error::StoreError(format!("job [{}] not found", job_id))),
        }
    }

    async fn insert_batch(&self, mut batch: JobBatchModel) -> anyhow::Result<i64> {
        let id = Self::next_id(&self.next_batch_id);
        batch.id = id;
        batch.create_time = TimeUtil::now_millis();
        self.batches.insert(id, batch);
        Ok(id)
    }

    async fn get_batch(&self, batch_id: i64) -> anyhow::Result<Option<JobBatchModel>> {
        Ok(self.batches.get(&batch_id).map(|batch| batch.value().clone()))
    }

    async fn update_batch(
        &self,
        batch_id: i64,
        status: JobBatchStatus,
        err_msg: &str,
    ) -> anyhow::Result<()> {
        match self.batches.get_mut(&batch_id) {
            Some(mut batch) => {
                batch.status = status;
                batch.err_msg = err_msg.to_string();
                Ok(())
            }
            None => bail!(Error::StoreError(format!("batch [{}] not found", batch_id))),
        }
    }

    async fn list_batches(&self, job_id: i64) -> anyhow::Result<Vec<JobBatchModel>> {
        let mut batches: Vec<JobBatchModel> = self
            .batches
            .iter()
            .filter(|entry| entry.value().job_id == job_id)
            .map(|entry| entry.value().clone())
            .collect();
        batches.sort_by_key(|batch| batch.batch_seq);
        Ok(batches)
    }

    async fn list_timed_jobs(&self) -> anyhow::Result<Vec<JobModel>> {
        let mut jobs: Vec<JobModel> = self
            .jobs
            .iter()
            .filter(|entry| {
                let job = entry.value();
                !job.deleted && job.config.timer.timer_type != TimerType::None
            })
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by_key(|job| job.id);
        Ok(jobs)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_tasks(&self, tasks: Vec<TaskModel>) -> anyhow::Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(tasks.len());
        for mut task in tasks {
            let id = Self::next_id(&self.next_task_id);
            task.id = id;
            task.create_time = TimeUtil::now_millis();
            task.update_time = task.create_time;
            self.tasks.insert(id, task);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn get_task(&self, task_id: i64) -> anyhow::Result<Option<TaskModel>> {
        Ok(self.tasks.get(&task_id).map(|task| task.value().clone()))
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> anyhow::Result<Vec<TaskModel>> {
        let mut tasks: Vec<TaskModel> = self
            .tasks
            .iter()
            .filter(|entry| Self::task_matches(entry.value(), filter))
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by_key(|task| task.id);
        Ok(Self::page(tasks, filter.offset, filter.limit))
    }

    async fn count_tasks(&self, filter: &TaskFilter) -> anyhow::Result<usize> {
        Ok(self
            .tasks
            .iter()
            .filter(|entry| Self::task_matches(entry.value(), filter))
            .count())
    }

    async fn update_task_status(&self, task_id: i64, status: TaskStatus) -> anyhow::Result<()> {
        self.with_task(task_id, |task| task.status = status)
    }

    async fn set_task_start(&self, task_id: i64) -> anyhow::Result<()> {
        self.with_task(task_id, |task| {
            task.start_time = TimeUtil::now_millis();
            task.end_time = 0;
        })
    }

    async fn set_task_end(&self, task_id: i64) -> anyhow::Result<()> {
        self.with_task(task_id, |task| task.end_time = TimeUtil::now_millis())
    }

    async fn set_task_stopped(&self, task_id: i64, stopped: bool) -> anyhow::Result<()> {
        self.with_task(task_id, |task| task.stopped = stopped)
    }

    async fn set_task_deleted(&self, task_id: i64) -> anyhow::Result<()> {
        self.with_task(task_id, |task| {
            task.deleted = true;
            task.stopped = true;
        })
    }

    async fn increment_retried_times(&self, task_id: i64) -> anyhow::Result<()> {
        self.with_task(task_id, |task| task.retried_times += 1)
    }

    async fn append_task_log(&self, mut entry: TaskLogEntry) -> anyhow::Result<i64> {
        let id = Self::next_id(&self.next_log_id);
        entry.id = id;
        if entry.create_time == 0 {
            entry.create_time = TimeUtil::now_millis();
        }
        self.task_logs
            .entry(entry.task_id)
            .or_default()
            .push(entry);
        Ok(id)
    }

    async fn list_task_logs(&self, task_id: i64) -> anyhow::Result<Vec<TaskLogEntry>> {
        Ok(self
            .task_logs
            .get(&task_id)
            .map(|logs| logs.value().clone())
            .unwrap_or_default())
    }

    async fn live_tasks_for(
        &self,
        table_ids: &[i64],
        partition_ids: &[i64],
    ) -> anyhow::Result<Vec<TaskModel>> {
        let table_ids: HashSet<i64> = table_ids.iter().copied().collect();
        let partition_ids: HashSet<i64> = partition_ids.iter().copied().collect();

        let mut tasks: Vec<TaskModel> = self
            .tasks
            .iter()
            .filter(|entry| {
                let task = entry.value();
                if !task.is_live() {
                    return false;
                }
                if task.partition_ids.is_empty() {
                    table_ids.contains(&task.table_id)
                } else {
                    task.partition_ids.iter().any(|id| partition_ids.contains(id))
                }
            })
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by_key(|task| task.id);
        Ok(tasks)
    }

    async fn tasks_of_job(&self, job_id: i64) -> anyhow::Result<Vec<TaskModel>> {
        self.list_tasks(&TaskFilter {
            job_id: Some(job_id),
            ..Default::default()
        })
        .await
    }

    async fn tasks_of_batch(&self, batch_id: i64) -> anyhow::Result<Vec<TaskModel>> {
        self.list_tasks(&TaskFilter {
            batch_id: Some(batch_id),
            ..Default::default()
        })
        .await
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn upsert_source(&self, mut source: SourceModel) -> anyhow::Result<i64> {
        if let Some(existing) = self.get_source_by_name(&source.name).await? {
            source.id = existing.id;
        } else {
            source.id = Self::next_id(&self.next_catalog_id);
        }
        let id = source.id;
        self.sources.insert(id, source);
        Ok(id)
    }

    async fn upsert_database(&self, mut db: DatabaseModel) -> anyhow::Result<i64> {
        if let Some(existing) = self.get_database_by_name(db.source_id, &db.name).await? {
            db.id = existing.id;
        } else {
            db.id = Self::next_id(&self.next_catalog_id);
        }
        let id = db.id;
        self.databases.insert(id, db);
        Ok(id)
    }

    async fn upsert_table(&self, mut table: TableModel) -> anyhow::Result<i64> {
        if let Some(existing) = self.get_table_by_name(table.db_id, &table.name).await? {
            table.id = existing.id;
            table.status = existing.status;
        } else {
            table.id = Self::next_id(&self.next_catalog_id);
        }
        let id = table.id;
        self.tables.insert(id, table);
        Ok(id)
    }

    async fn upsert_partition(&self, mut partition: PartitionModel) -> anyhow::Result<i64> {
        let existing = self
            .partitions
            .iter()
            .find(|entry| {
                entry.value().table_id == partition.table_id
                    && entry.value().value == partition.value
            })
            .map(|entry| entry.value().clone());
        if let Some(existing) = existing {
            partition.id = existing.id;
            partition.status = existing.status;
        } else {
            partition.id = Self::next_id(&self.next_catalog_id);
        }
        let id = partition.id;
        self.partitions.insert(id, partition);
        Ok(id)
    }

    async fn get_source_by_name(&self, name: &str) -> anyhow::Result<Option<SourceModel>> {
        Ok(self
            .sources
            .iter()
            .find(|entry| entry.value().name == name)
            .map(|entry| entry.value().clone()))
    }

    async fn get_database_by_name(
        &self,
        source_id: i64,
        name: &str,
    ) -> anyhow::Result<Option<DatabaseModel>> {
        Ok(self
            .databases
            .iter()
            .find(|entry| entry.value().source_id == source_id && entry.value().name == name)
            .map(|entry| entry.value().clone()))
    }

    async fn get_table(&self, table_id: i64) -> anyhow::Result<Option<TableModel>> {
        Ok(self.tables.get(&table_id).map(|table| table.value().clone()))
    }

    async fn get_table_by_name(
        &self,
        db_id: i64,
        name: &str,
    ) -> anyhow::Result<Option<TableModel>> {
        Ok(self
            .tables
            .iter()
            .find(|entry| entry.value().db_id == db_id && entry.value().name == name)
            .map(|entry| entry.value().clone()))
    }

    async fn list_databases(&self, source_id: i64) -> anyhow::Result<Vec<DatabaseModel>> {
        let mut dbs: Vec<DatabaseModel> = self
            .databases
            .iter()
            .filter(|entry| entry.value().source_id == source_id)
            .map(|entry| entry.value().clone())
            .collect();
        dbs.sort_by_key(|db| db.id);
        Ok(dbs)
    }

    async fn list_tables(&self, db_id: i64) -> anyhow::Result<Vec<TableModel>> {
        let mut tables: Vec<TableModel> = self
            .tables
            .iter()
            .filter(|entry| entry.value().db_id == db_id)
            .map(|entry| entry.value().clone())
            .collect();
        tables.sort_by_key(|table| table.id);
        Ok(tables)
    }

    async fn list_partitions(&self, table_id: i64) -> anyhow::Result<Vec<PartitionModel>> {
        let mut partitions: Vec<PartitionModel> = self
            .partitions
            .iter()
            .filter(|entry| entry.value().table_id == table_id)
            .map(|entry| entry.value().clone())
            .collect();
        partitions.sort_by_key(|partition| partition.id);
        Ok(partitions)
    }

    async fn get_partitions(&self, partition_ids: &[i64]) -> anyhow::Result<Vec<PartitionModel>> {
        let mut partitions = Vec::with_capacity(partition_ids.len());
        for id in partition_ids {
            if let Some(partition) = self.partitions.get(id) {
                partitions.push(partition.value().clone());
            }
        }
        Ok(partitions)
    }

    async fn update_source_status(
        &self,
        source_id: i64,
        status: MigrationStatus,
    ) -> anyhow::Result<()> {
        if let Some(mut source) = self.sources.get_mut(&source_id) {
            source.status = status;
        }
        Ok(())
    }

    async fn update_database_status(
        &self,
        db_id: i64,
        status: MigrationStatus,
    ) -> anyhow::Result<()> {
        if let Some(mut db) = self.databases.get_mut(&db_id) {
            db.status = status;
        }
        Ok(())
    }

    async fn update_table_status(
        &self,
        table_id: i64,
        status: MigrationStatus,
    ) -> anyhow::Result<()> {
        if let Some(mut table) = self.tables.get_mut(&table_id) {
            table.status = status;
        }
        Ok(())
    }

    async fn update_partitions_status(
        &self,
        partition_ids: &[i64],
        status: MigrationStatus,
    ) -> anyhow::Result<()> {
        for id in partition_ids {
            if let Some(mut partition) = self.partitions.get_mut(id) {
                partition.status = status;
            }
        }
        Ok(())
    }

    async fn clear_updated_flags(
        &self,
        table_ids: &[i64],
        partition_ids: &[i64],
    ) -> anyhow::Result<()> {
        for id in table_ids {
            if let Some(mut table) = self.tables.get_mut(id) {
                table.updated = false;
            }
        }
        for id in partition_ids {
            if let Some(mut partition) = self.partitions.get_mut(id) {
                partition.updated = false;
            }
        }
        Ok(())
    }

    async fn partition_status_stat(&self) -> anyhow::Result<Vec<(i64, MigrationStatus)>> {
        let mut pairs: HashSet<(i64, MigrationStatus)> = HashSet::new();
        for entry in self.partitions.iter() {
            pairs.insert((entry.value().table_id, entry.value().status));
        }
        Ok(pairs.into_iter().collect())
    }

    async fn table_status_stat(&self) -> anyhow::Result<Vec<(i64, MigrationStatus)>> {
        let mut pairs: HashSet<(i64, MigrationStatus)> = HashSet::new();
        for entry in self.tables.iter() {
            pairs.insert((entry.value().db_id, entry.value().status));
        }
        Ok(pairs.into_iter().collect())
    }

    async fn database_status_stat(&self) -> anyhow::Result<Vec<(i64, MigrationStatus)>> {
        let mut pairs: HashSet<(i64, MigrationStatus)> = HashSet::new();
        for entry in self.databases.iter() {
            pairs.insert((entry.value().source_id, entry.value().status));
        }
        Ok(pairs.into_iter().collect())
    }

    async fn reset_doing_statuses(&self) -> anyhow::Result<()> {
        for mut entry in self.partitions.iter_mut() {
            if entry.value().status == MigrationStatus::Doing {
                entry.value_mut().status = MigrationStatus::Init;
            }
        }
        for mut entry in self.tables.iter_mut() {
            if entry.value().status == MigrationStatus::Doing {
                entry.value_mut().status = MigrationStatus::Init;
            }
        }
        Ok(())
    }

    fn scan_progress(&self, source_id: i64) -> Arc<ScanProgress> {
        self.scan_progresses
            .entry(source_id)
            .or_insert_with(|| Arc::new(ScanProgress::new()))
            .value()
            .clone()
    }
}
