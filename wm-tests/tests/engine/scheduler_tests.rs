#[cfg(test)]
mod test {

    use serial_test::serial;

    use wm_common::{
        config::config_enums::{MigrationStatus, TaskStatus},
        utils::time_util::TimeUtil,
    };
    use wm_engine::task_fsm::Phase;
    use wm_store::{CatalogStore, TaskStore};

    use crate::test_runner::{
        mock_executor::{ConcurrencyProbe, MockRegistryBuilder},
        test_base::TestBase,
    };

    #[tokio::test]
    #[serial]
    async fn tables_job_full_pipeline_test() {
        let base = TestBase::start(MockRegistryBuilder::new().build()).await;
        let (source_id, db_id) = base.seed_source_db().await;
        let t1 = base
            .add_table(source_id, db_id, "t1", &["pt=1", "pt=2", "pt=3"])
            .await;
        let t2 = base.add_table(source_id, db_id, "t2", &[]).await;

        let mut job = TestBase::tables_job(&["t1", "t2"]);
        job.config.partition_group_max_num = 1;
        let job_id = base.submit(job).await;

        let tasks = base.wait_job_tasks_terminal(job_id, 20).await;
        // 3 partition tasks for t1 plus 1 whole-table task for t2
        assert_eq!(tasks.len(), 4);
        assert!(tasks.iter().all(|task| task.status == TaskStatus::Done));
        assert!(tasks.iter().all(|task| task.retried_times == 0));
        assert!(tasks.iter().all(|task| task.end_time >= task.start_time));

        // full phase order on a data task, one log entry per transition
        let data_task = tasks.iter().find(|task| !task.partition_ids.is_empty()).unwrap();
        let logs = base.store.list_task_logs(data_task.id).await.unwrap();
        let statuses: Vec<TaskStatus> = logs.iter().map(|log| log.status).collect();
        assert_eq!(
            statuses,
            vec![
                TaskStatus::SchemaDoing,
                TaskStatus::SchemaDone,
                TaskStatus::DataDoing,
                TaskStatus::DataDone,
                TaskStatus::VerificationDoing,
                TaskStatus::VerificationDone,
                TaskStatus::Done,
            ]
        );
        let create_times: Vec<i64> = logs.iter().map(|log| log.create_time).collect();
        let mut sorted = create_times.clone();
        sorted.sort_unstable();
        assert_eq!(create_times, sorted);

        base.refresh_progress().await;
        let t1_table = base.store.get_table(t1).await.unwrap().unwrap();
        let t2_table = base.store.get_table(t2).await.unwrap().unwrap();
        assert_eq!(t1_table.status, MigrationStatus::Done);
        assert_eq!(t2_table.status, MigrationStatus::Done);
        assert_eq!(base.job(job_id).await.status, MigrationStatus::Done);

        base.shutdown().await;
    }

    #[tokio::test]
    #[serial]
    async fn admission_cap_test() {
        let probe = ConcurrencyProbe::new();
        let registry = MockRegistryBuilder::new()
            .with_delay(150)
            .with_probe(probe.clone())
            .build();
        let mut config = TestBase::test_config();
        config.task_max_num = 2;
        let base = TestBase::start_with(config, registry).await;

        let (source_id, db_id) = base.seed_source_db().await;
        for name in ["t1", "t2", "t3", "t4", "t5"] {
            base.add_table(source_id, db_id, name, &[]).await;
        }
        let job_id = base
            .submit(TestBase::tables_job(&["t1", "t2", "t3", "t4", "t5"]))
            .await;

        let tasks = base.wait_job_tasks_terminal(job_id, 30).await;
        assert_eq!(tasks.len(), 5);
        assert!(tasks.iter().all(|task| task.status == TaskStatus::Done));

        // never more than task_max_num phases in flight
        assert!(probe.max_running() <= 2, "max was {}", probe.max_running());
        assert_eq!(probe.running(), 0);
        assert_eq!(base.scheduler.admission().admitted_total(), 5);

        base.shutdown().await;
    }

    #[tokio::test]
    #[serial]
    async fn failed_task_terminal_until_retry_test() {
        let registry = MockRegistryBuilder::new()
            .with_phase_failures(Phase::Data, "t1", 1)
            .build();
        let base = TestBase::start(registry).await;
        let (source_id, db_id) = base.seed_source_db().await;
        let table_id = base.add_table(source_id, db_id, "t1", &[]).await;

        let job_id = base.submit(TestBase::tables_job(&["t1"])).await;
        let tasks = base.wait_job_tasks_terminal(job_id, 20).await;
        let task_id = tasks[0].id;
        assert_eq!(tasks[0].status, TaskStatus::DataFailed);

        // the engine never auto-retries a failed task
        TimeUtil::sleep_millis(1500).await;
        let task = base.store.get_task(task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::DataFailed);
        assert_eq!(task.retried_times, 0);

        base.refresh_progress().await;
        let table = base.store.get_table(table_id).await.unwrap().unwrap();
        assert_eq!(table.status, MigrationStatus::Failed);

        let logs_before = base.store.list_task_logs(task_id).await.unwrap().len();

        // retry re-admits at the failed phase, schema is not re-run
        base.scheduler
            .job_manager()
            .retry_task(task_id)
            .await
            .unwrap();
        let task = base.wait_task_status(task_id, TaskStatus::Done, 20).await;
        assert_eq!(task.retried_times, 1);

        let logs = base.store.list_task_logs(task_id).await.unwrap();
        assert!(logs.len() > logs_before);
        let schema_runs = logs
            .iter()
            .filter(|log| log.status == TaskStatus::SchemaDoing)
            .count();
        assert_eq!(schema_runs, 1);

        base.shutdown().await;
    }

    #[tokio::test]
    #[serial]
    async fn reset_task_test() {
        let registry = MockRegistryBuilder::new()
            .with_phase_failures(Phase::Schema, "t1", 1)
            .build();
        let base = TestBase::start(registry).await;
        let (source_id, db_id) = base.seed_source_db().await;
        base.add_table(source_id, db_id, "t1", &[]).await;

        let job_id = base.submit(TestBase::tables_job(&["t1"])).await;
        let tasks = base.wait_job_tasks_terminal(job_id, 20).await;
        let task_id = tasks[0].id;
        assert_eq!(tasks[0].status, TaskStatus::SchemaFailed);

        let logs_before = base.store.list_task_logs(task_id).await.unwrap();
        assert!(!logs_before.is_empty());

        base.scheduler
            .job_manager()
            .reset_task(task_id)
            .await
            .unwrap();
        let task = base.wait_task_status(task_id, TaskStatus::Done, 20).await;
        assert_eq!(task.retried_times, 1);

        // the audit trail survives the reset
        let logs = base.store.list_task_logs(task_id).await.unwrap();
        assert!(logs.len() > logs_before.len());
        assert_eq!(logs[0].id, logs_before[0].id);

        // reset on a done task is rejected
        assert!(base
            .scheduler
            .job_manager()
            .reset_task(task_id)
            .await
            .is_err());

        base.shutdown().await;
    }

    #[tokio::test]
    #[serial]
    async fn stop_queued_task_test() {
        let registry = MockRegistryBuilder::new().with_delay(300).build();
        let mut config = TestBase::test_config();
        config.task_max_num = 1;
        let base = TestBase::start_with(config, registry).await;

        let (source_id, db_id) = base.seed_source_db().await;
        base.add_table(source_id, db_id, "a1", &[]).await;
        base.add_table(source_id, db_id, "b1", &[]).await;

        let job_a = base.submit(TestBase::tables_job(&["a1"])).await;
        let job_b = base.submit(TestBase::tables_job(&["b1"])).await;
        let task_b = base.store.tasks_of_job(job_b).await.unwrap()[0].id;

        // b1 is queued behind a1, stopping it prevents its admission
        base.scheduler
            .job_manager()
            .stop_task(task_b)
            .await
            .unwrap();

        base.wait_job_tasks_terminal(job_a, 20).await;
        TimeUtil::sleep_millis(1500).await;

        let task = base.store.get_task(task_b).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Init);
        assert!(task.stopped);

        // resume re-enters the queue at the current phase
        base.scheduler
            .job_manager()
            .start_task(task_b)
            .await
            .unwrap();
        base.wait_task_status(task_b, TaskStatus::Done, 20).await;

        base.shutdown().await;
    }

    #[tokio::test]
    #[serial]
    async fn stop_running_task_parks_after_phase_test() {
        let registry = MockRegistryBuilder::new().with_delay(400).build();
        let base = TestBase::start(registry).await;
        let (source_id, db_id) = base.seed_source_db().await;
        base.add_table(source_id, db_id, "t1", &[]).await;

        let job_id = base.submit(TestBase::tables_job(&["t1"])).await;
        let task_id = base.store.tasks_of_job(job_id).await.unwrap()[0].id;

        // stop while the schema phase is in flight; the phase finishes, the
        // next one is never dispatched
        base.wait_task_status(task_id, TaskStatus::SchemaDoing, 10)
            .await;
        base.scheduler
            .job_manager()
            .stop_task(task_id)
            .await
            .unwrap();

        let task = base
            .wait_task_status(task_id, TaskStatus::SchemaDone, 10)
            .await;
        assert!(task.stopped);

        TimeUtil::sleep_millis(1500).await;
        let task = base.store.get_task(task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::SchemaDone);

        base.scheduler
            .job_manager()
            .start_task(task_id)
            .await
            .unwrap();
        base.wait_task_status(task_id, TaskStatus::Done, 20).await;

        base.shutdown().await;
    }

    #[tokio::test]
    #[serial]
    async fn schema_only_job_test() {
        let base = TestBase::start(MockRegistryBuilder::new().build()).await;
        let (source_id, db_id) = base.seed_source_db().await;
        base.add_table(source_id, db_id, "t1", &[]).await;

        let mut job = TestBase::tables_job(&["t1"]);
        job.config.schema_only = true;
        let job_id = base.submit(job).await;

        let tasks = base.wait_job_tasks_terminal(job_id, 20).await;
        assert_eq!(tasks[0].status, TaskStatus::Done);

        let logs = base.store.list_task_logs(tasks[0].id).await.unwrap();
        let statuses: Vec<TaskStatus> = logs.iter().map(|log| log.status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::SchemaDoing, TaskStatus::SchemaDone, TaskStatus::Done]
        );

        base.shutdown().await;
    }

    #[tokio::test]
    #[serial]
    async fn verification_disabled_job_test() {
        let base = TestBase::start(MockRegistryBuilder::new().build()).await;
        let (source_id, db_id) = base.seed_source_db().await;
        base.add_table(source_id, db_id, "t1", &[]).await;

        let mut job = TestBase::tables_job(&["t1"]);
        job.config.enable_verification = false;
        let job_id = base.submit(job).await;

        let tasks = base.wait_job_tasks_terminal(job_id, 20).await;
        let logs = base.store.list_task_logs(tasks[0].id).await.unwrap();
        let statuses: Vec<TaskStatus> = logs.iter().map(|log| log.status).collect();
        assert_eq!(
            statuses,
            vec![
                TaskStatus::SchemaDoing,
                TaskStatus::SchemaDone,
                TaskStatus::DataDoing,
                TaskStatus::DataDone,
                TaskStatus::Done,
            ]
        );

        base.shutdown().await;
    }

    #[tokio::test]
    #[serial]
    async fn delete_last_task_cascades_to_job_test() {
        let base = TestBase::start(MockRegistryBuilder::new().build()).await;
        let (source_id, db_id) = base.seed_source_db().await;
        base.add_table(source_id, db_id, "t1", &[]).await;

        let job_id = base.submit(TestBase::tables_job(&["t1"])).await;
        let tasks = base.wait_job_tasks_terminal(job_id, 20).await;

        base.scheduler
            .job_manager()
            .delete_task(tasks[0].id)
            .await
            .unwrap();

        let job = base.job(job_id).await;
        assert!(job.deleted);
        // the task record survives for audit
        let task = base.store.get_task(tasks[0].id).await.unwrap().unwrap();
        assert!(task.deleted);

        base.shutdown().await;
    }

    #[tokio::test]
    #[serial]
    async fn empty_partitioned_table_completes_after_schema_test() {
        let base = TestBase::start(MockRegistryBuilder::new().build()).await;
        let (source_id, db_id) = base.seed_source_db().await;
        // partitioned table with no partitions in the snapshot
        let table_id = base
            .store
            .upsert_table(wm_common::meta::catalog::TableModel {
                source_id,
                db_id,
                db_name: crate::test_runner::test_base::DB_NAME.to_string(),
                name: "t1".to_string(),
                has_partitions: true,
                ..Default::default()
            })
            .await
            .unwrap();

        let job_id = base.submit(TestBase::tables_job(&["t1"])).await;
        let tasks = base.wait_job_tasks_terminal(job_id, 20).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Done);

        let logs = base.store.list_task_logs(tasks[0].id).await.unwrap();
        let statuses: Vec<TaskStatus> = logs.iter().map(|log| log.status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::SchemaDoing, TaskStatus::SchemaDone, TaskStatus::Done]
        );

        base.refresh_progress().await;
        let table = base.store.get_table(table_id).await.unwrap().unwrap();
        assert_eq!(table.status, MigrationStatus::Done);

        base.shutdown().await;
    }
}
