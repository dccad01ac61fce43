#[cfg(test)]
mod test {

    use std::sync::Arc;

    use chrono::{DateTime, Local, TimeZone};
    use serial_test::serial;

    use wm_common::{
        config::{
            config_enums::{JobType, TaskStatus},
            job_config::JobConfig,
            server_config::DynamicConfig,
            timer_config::TimerConfig,
        },
        meta::{
            catalog::{DatabaseModel, SourceModel, TableModel},
            job::JobModel,
        },
        monitor::{counter_type::CounterType, scheduler_monitor::SchedulerMonitor},
    };
    use wm_engine::{AdmissionController, BatchScheduler, JobManager};
    use wm_store::{CatalogStore, JobStore, MemoryStore, TaskStore};

    struct Fixture {
        store: Arc<MemoryStore>,
        job_manager: Arc<JobManager>,
        batch_scheduler: BatchScheduler,
        monitor: Arc<SchedulerMonitor>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let admission = Arc::new(AdmissionController::new(Arc::new(DynamicConfig::new(4))));
        let job_manager = Arc::new(JobManager::new(
            store.clone(),
            store.clone(),
            store.clone(),
            admission,
        ));
        let monitor = Arc::new(SchedulerMonitor::new());
        let batch_scheduler = BatchScheduler::new(
            store.clone(),
            store.clone(),
            job_manager.clone(),
            monitor.clone(),
        );

        let source_id = store
            .upsert_source(SourceModel {
                name: "hive_prod".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let db_id = store
            .upsert_database(DatabaseModel {
                source_id,
                name: "sales".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .upsert_table(TableModel {
                source_id,
                db_id,
                db_name: "sales".to_string(),
                name: "t1".to_string(),
                updated: true,
                ..Default::default()
            })
            .await
            .unwrap();

        Fixture {
            store,
            job_manager,
            batch_scheduler,
            monitor,
        }
    }

    fn timed_job(timer: TimerConfig) -> JobModel {
        JobModel {
            source_name: "hive_prod".to_string(),
            db_name: "sales".to_string(),
            dst_project: "dw".to_string(),
            job_type: JobType::Tables,
            config: JobConfig {
                tables: vec!["t1".to_string()],
                timer,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 6, hour, minute, 0).unwrap()
    }

    async fn finish_all_tasks(store: &Arc<MemoryStore>, job_id: i64) {
        for task in store.tasks_of_job(job_id).await.unwrap() {
            store
                .update_task_status(task.id, TaskStatus::Done)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    #[serial]
    async fn non_timer_job_gets_exactly_one_batch_test() {
        let fx = fixture().await;
        let job_id = fx
            .job_manager
            .submit_job(timed_job(TimerConfig::none()))
            .await
            .unwrap();

        assert_eq!(fx.store.list_batches(job_id).await.unwrap().len(), 1);
        assert_eq!(fx.store.tasks_of_job(job_id).await.unwrap().len(), 1);

        // ticks never touch a job without a timer
        finish_all_tasks(&fx.store, job_id).await;
        fx.batch_scheduler.tick(&at(3, 30)).await.unwrap();
        assert_eq!(fx.store.list_batches(job_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    #[serial]
    async fn daily_timer_fires_once_per_minute_test() {
        let fx = fixture().await;
        let job_id = fx
            .job_manager
            .submit_job(timed_job(TimerConfig::daily("03:30")))
            .await
            .unwrap();
        finish_all_tasks(&fx.store, job_id).await;

        // wrong minute, nothing happens
        fx.batch_scheduler.tick(&at(3, 29)).await.unwrap();
        assert_eq!(fx.store.list_batches(job_id).await.unwrap().len(), 1);

        // matching minute fires exactly once, a second tick in the same
        // minute is a no-op
        let new_tasks = fx.batch_scheduler.tick(&at(3, 30)).await.unwrap();
        assert_eq!(new_tasks.len(), 1);
        assert_eq!(fx.store.list_batches(job_id).await.unwrap().len(), 2);
        fx.batch_scheduler.tick(&at(3, 30)).await.unwrap();
        assert_eq!(fx.store.list_batches(job_id).await.unwrap().len(), 2);

        let batches = fx.store.list_batches(job_id).await.unwrap();
        assert_eq!(batches[0].batch_seq, 1);
        assert_eq!(batches[1].batch_seq, 2);
    }

    #[tokio::test]
    #[serial]
    async fn hourly_timer_matches_minute_of_every_hour_test() {
        let fx = fixture().await;
        let job_id = fx
            .job_manager
            .submit_job(timed_job(TimerConfig::hourly("15")))
            .await
            .unwrap();
        finish_all_tasks(&fx.store, job_id).await;

        fx.batch_scheduler.tick(&at(7, 15)).await.unwrap();
        assert_eq!(fx.store.list_batches(job_id).await.unwrap().len(), 2);

        finish_all_tasks(&fx.store, job_id).await;
        fx.batch_scheduler.tick(&at(8, 15)).await.unwrap();
        assert_eq!(fx.store.list_batches(job_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    #[serial]
    async fn overlapping_batch_is_skipped_test() {
        let fx = fixture().await;
        let job_id = fx
            .job_manager
            .submit_job(timed_job(TimerConfig::daily("03:30")))
            .await
            .unwrap();

        // the submission batch is still unfinished (tasks are INIT)
        let new_tasks = fx.batch_scheduler.tick(&at(3, 30)).await.unwrap();
        assert!(new_tasks.is_empty());
        assert_eq!(fx.store.list_batches(job_id).await.unwrap().len(), 1);
        assert_eq!(fx.monitor.get(CounterType::TimerFiresSkipped), 1);

        // once the batch finishes, the next matching minute fires
        finish_all_tasks(&fx.store, job_id).await;
        fx.batch_scheduler.tick(&at(3, 31)).await.unwrap();
        assert_eq!(fx.store.list_batches(job_id).await.unwrap().len(), 1);
        let next_day = Local.with_ymd_and_hms(2026, 8, 7, 3, 30, 0).unwrap();
        fx.batch_scheduler.tick(&next_day).await.unwrap();
        assert_eq!(fx.store.list_batches(job_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    #[serial]
    async fn stopped_job_never_fires_test() {
        let fx = fixture().await;
        let job_id = fx
            .job_manager
            .submit_job(timed_job(TimerConfig::daily("03:30")))
            .await
            .unwrap();
        finish_all_tasks(&fx.store, job_id).await;

        fx.job_manager.stop_job(job_id).await.unwrap();
        fx.batch_scheduler.tick(&at(3, 30)).await.unwrap();
        assert_eq!(fx.store.list_batches(job_id).await.unwrap().len(), 1);
    }
}
