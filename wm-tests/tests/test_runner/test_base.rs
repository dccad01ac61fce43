use std::sync::Arc;

use wm_common::{
    config::{config_enums::JobType, job_config::JobConfig, server_config::ServerConfig},
    meta::{
        catalog::{DatabaseModel, PartitionModel, SourceModel, TableModel},
        job::JobModel,
        task::TaskModel,
    },
    utils::time_util::TimeUtil,
};
use wm_engine::{executor::ExecutorRegistry, scheduler::MigrationScheduler};
use wm_store::{CatalogStore, JobStore, MemoryStore, TaskStore};

pub const SOURCE_NAME: &str = "hive_prod";
pub const DB_NAME: &str = "sales";
pub const DST_PROJECT: &str = "dw";

pub struct TestBase {
    pub store: Arc<MemoryStore>,
    pub scheduler: Arc<MigrationScheduler>,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl TestBase {
    pub fn test_config() -> ServerConfig {
        ServerConfig {
            task_max_num: 4,
            scheduling_interval_secs: 1,
            timer_check_interval_secs: 1,
            progress_interval_secs: 1,
            monitor_flush_interval_secs: 1,
            ..Default::default()
        }
    }

    pub async fn start(registry: Arc<ExecutorRegistry>) -> Self {
        Self::start_with(Self::test_config(), registry).await
    }

    pub async fn start_with(config: ServerConfig, registry: Arc<ExecutorRegistry>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let scheduler = MigrationScheduler::new(
            config,
            store.clone(),
            store.clone(),
            store.clone(),
            registry,
        );
        let runner = scheduler.clone();
        let handle = tokio::spawn(runner.run());
        Self {
            store,
            scheduler,
            handle,
        }
    }

    pub async fn shutdown(self) {
        self.scheduler.shutdown();
        let _ = self.handle.await;
    }

    pub async fn seed_source_db(&self) -> (i64, i64) {
        let source_id = self
            .store
            .upsert_source(SourceModel {
                name: SOURCE_NAME.to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let db_id = self
            .store
            .upsert_database(DatabaseModel {
                source_id,
                name: DB_NAME.to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        (source_id, db_id)
    }

    pub async fn add_table(
        &self,
        source_id: i64,
        db_id: i64,
        name: &str,
        partition_values: &[&str],
    ) -> i64 {
        let table_id = self
            .store
            .upsert_table(TableModel {
                source_id,
                db_id,
                db_name: DB_NAME.to_string(),
                name: name.to_string(),
                has_partitions: !partition_values.is_empty(),
                ..Default::default()
            })
            .await
            .unwrap();
        for value in partition_values {
            self.store
                .upsert_partition(PartitionModel {
                    source_id,
                    db_id,
                    table_id,
                    value: value.to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        table_id
    }

    pub fn tables_job(tables: &[&str]) -> JobModel {
        JobModel {
            source_name: SOURCE_NAME.to_string(),
            db_name: DB_NAME.to_string(),
            dst_project: DST_PROJECT.to_string(),
            job_type: JobType::Tables,
            config: JobConfig {
                tables: tables.iter().map(|t| t.to_string()).collect(),
                increment: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub async fn submit(&self, job: JobModel) -> i64 {
        self.scheduler.job_manager().submit_job(job).await.unwrap()
    }

    pub async fn wait_job_tasks_terminal(&self, job_id: i64, timeout_secs: u64) -> Vec<TaskModel> {
        let deadline = TimeUtil::now_millis() + (timeout_secs * 1000) as i64;
        loop {
            let tasks = self.store.tasks_of_job(job_id).await.unwrap();
            if !tasks.is_empty() && tasks.iter().all(|task| task.status.is_terminal()) {
                return tasks;
            }
            if TimeUtil::now_millis() > deadline {
                panic!(
                    "job [{}] tasks not terminal after {}s: {:?}",
                    job_id,
                    timeout_secs,
                    tasks
                        .iter()
                        .map(|t| (t.id, t.status))
                        .collect::<Vec<_>>()
                );
            }
            TimeUtil::sleep_millis(50).await;
        }
    }

    pub async fn wait_task_status(
        &self,
        task_id: i64,
        expected: wm_common::config::config_enums::TaskStatus,
        timeout_secs: u64,
    ) -> TaskModel {
        let deadline = TimeUtil::now_millis() + (timeout_secs * 1000) as i64;
        loop {
            let task = self.store.get_task(task_id).await.unwrap().unwrap();
            if task.status == expected {
                return task;
            }
            if TimeUtil::now_millis() > deadline {
                panic!(
                    "task [{}] stuck at {}, expected {}",
                    task_id, task.status, expected
                );
            }
            TimeUtil::sleep_millis(50).await;
        }
    }

    pub async fn refresh_progress(&self) {
        self.scheduler.aggregator().refresh().await.unwrap();
    }

    pub async fn job(&self, job_id: i64) -> JobModel {
        self.store.get_job(job_id).await.unwrap().unwrap()
    }
}
