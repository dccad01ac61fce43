use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use chrono::Local;
use tokio::{select, task::JoinSet, time::Duration};

use wm_common::{
    config::{
        config_enums::TaskStatus,
        server_config::{DynamicConfig, ServerConfig},
    },
    log_error, log_info,
    monitor::{
        counter_type::CounterType, scheduler_monitor::SchedulerMonitor, FlushableMonitor,
    },
    utils::limit_queue::LimitedQueue,
};
use wm_store::{CatalogStore, JobStore, TaskFilter, TaskStore};

use crate::{
    admission::AdmissionController, events::EventQueue, executor::ExecutorRegistry,
    job_manager::JobManager, progress::ProgressAggregator, task_driver::TaskDriver,
    timer::BatchScheduler,
};

/// the engine runtime: a worker pool bounded by the admission controller,
/// the timer loop, the progress loop and the monitor loop. tasks execute
/// independently once admitted, a failing task never touches its siblings.
pub struct MigrationScheduler {
    config: ServerConfig,
    dynamic_config: Arc<DynamicConfig>,
    jobs: Arc<dyn JobStore>,
    tasks: Arc<dyn TaskStore>,
    catalog: Arc<dyn CatalogStore>,
    registry: Arc<ExecutorRegistry>,
    admission: Arc<AdmissionController>,
    events: Arc<EventQueue>,
    monitor: Arc<SchedulerMonitor>,
    aggregator: Arc<ProgressAggregator>,
    job_manager: Arc<JobManager>,
    batch_scheduler: BatchScheduler,
    shut_down: AtomicBool,
    recently_succeeded: Mutex<LimitedQueue<i64>>,
    recently_failed: Mutex<LimitedQueue<i64>>,
}

impl MigrationScheduler {
    pub fn new(
        config: ServerConfig,
        jobs: Arc<dyn JobStore>,
        tasks: Arc<dyn TaskStore>,
        catalog: Arc<dyn CatalogStore>,
        registry: Arc<ExecutorRegistry>,
    ) -> Arc<Self> {
        let dynamic_config = Arc::new(DynamicConfig::new(config.task_max_num));
        let admission = Arc::new(AdmissionController::new(dynamic_config.clone()));
        let monitor = Arc::new(SchedulerMonitor::new());
        let events = Arc::new(EventQueue::new());
        let aggregator = Arc::new(ProgressAggregator::new(
            jobs.clone(),
            tasks.clone(),
            catalog.clone(),
        ));
        let job_manager = Arc::new(JobManager::new(
            jobs.clone(),
            tasks.clone(),
            catalog.clone(),
            admission.clone(),
        ));
        let batch_scheduler = BatchScheduler::new(
            jobs.clone(),
            tasks.clone(),
            job_manager.clone(),
            monitor.clone(),
        );
        let ring_size = config.terminated_ring_size;

        Arc::new(Self {
            config,
            dynamic_config,
            jobs,
            tasks,
            catalog,
            registry,
            admission,
            events,
            monitor,
            aggregator,
            job_manager,
            batch_scheduler,
            shut_down: AtomicBool::new(false),
            recently_succeeded: Mutex::new(LimitedQueue::new(ring_size)),
            recently_failed: Mutex::new(LimitedQueue::new(ring_size)),
        })
    }

    pub fn job_manager(&self) -> Arc<JobManager> {
        self.job_manager.clone()
    }

    pub fn admission(&self) -> Arc<AdmissionController> {
        self.admission.clone()
    }

    pub fn aggregator(&self) -> Arc<ProgressAggregator> {
        self.aggregator.clone()
    }

    pub fn monitor(&self) -> Arc<SchedulerMonitor> {
        self.monitor.clone()
    }

    pub fn events(&self) -> Arc<EventQueue> {
        self.events.clone()
    }

    /// takes effect for future admissions only, running tasks keep running
    pub fn set_task_max_num(&self, value: usize) {
        log_info!("task_max_num -> {}", value);
        self.dynamic_config.set_task_max_num(value);
    }

    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    pub fn recently_succeeded(&self) -> Vec<i64> {
        self.recently_succeeded.lock().unwrap().to_vec()
    }

    pub fn recently_failed(&self) -> Vec<i64> {
        self.recently_failed.lock().unwrap().to_vec()
    }

    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        log_info!(
            "scheduler started, task_max_num: {}",
            self.dynamic_config.task_max_num()
        );
        self.recover().await?;

        let me = self.clone();
        let dispatch = tokio::spawn(async move { me.dispatch_loop().await });
        let me = self.clone();
        let timer = tokio::spawn(async move { me.timer_loop().await });
        let me = self.clone();
        let progress = tokio::spawn(async move { me.progress_loop().await });
        let me = self.clone();
        let monitor = tokio::spawn(async move { me.monitor_loop().await });

        let (r1, r2, r3, r4) = tokio::join!(dispatch, timer, progress, monitor);
        r1?;
        r2?;
        r3?;
        r4?;
        log_info!("scheduler stopped");
        Ok(())
    }

    /// re-admit work left behind by a previous process: every live task goes
    /// back into the queue at its current phase, targets stuck in DOING drop
    /// back to INIT until a driver picks them up again
    async fn recover(&self) -> anyhow::Result<()> {
        self.catalog.reset_doing_statuses().await?;

        let tasks = self.tasks.list_tasks(&TaskFilter::default()).await?;
        let live: Vec<i64> = tasks
            .iter()
            .filter(|task| task.is_live())
            .map(|task| task.id)
            .collect();
        if !live.is_empty() {
            let enqueued = self.admission.enqueue_all(&live);
            log_info!("recovered {} unfinished tasks into the queue", enqueued);
        }
        Ok(())
    }

    async fn dispatch_loop(&self) {
        let mut join_set: JoinSet<(i64, anyhow::Result<TaskStatus>)> = JoinSet::new();
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.scheduling_interval_secs));

        loop {
            if self.is_shut_down() {
                // let running tasks finish their current phase work
                while let Some(result) = join_set.join_next().await {
                    self.handle_driver_result(result);
                }
                break;
            }

            while let Some(task_id) = self.admission.try_admit() {
                let driver = TaskDriver::new(
                    task_id,
                    self.jobs.clone(),
                    self.tasks.clone(),
                    self.catalog.clone(),
                    self.registry.clone(),
                    self.events.clone(),
                );
                join_set.spawn(async move { (task_id, driver.run().await) });
            }

            select! {
                _ = interval.tick() => {}
                _ = self.admission.notified() => {}
                Some(result) = join_set.join_next(), if !join_set.is_empty() => {
                    self.handle_driver_result(result);
                }
            }
        }
    }

    fn handle_driver_result(
        &self,
        result: Result<(i64, anyhow::Result<TaskStatus>), tokio::task::JoinError>,
    ) {
        match result {
            Ok((task_id, Ok(status))) => {
                self.admission.finish(task_id);
                if status == TaskStatus::Done {
                    self.monitor.add(CounterType::SucceededTotal, 1);
                    self.recently_succeeded.lock().unwrap().push(task_id);
                } else if status.is_failed() {
                    self.monitor.add(CounterType::FailedTotal, 1);
                    self.recently_failed.lock().unwrap().push(task_id);
                } else {
                    self.monitor.add(CounterType::StoppedTotal, 1);
                }
            }
            Ok((task_id, Err(e))) => {
                self.admission.finish(task_id);
                self.monitor.add(CounterType::FailedTotal, 1);
                self.recently_failed.lock().unwrap().push(task_id);
                log_error!("task [{}] driver error: {}", task_id, e);
            }
            Err(e) => {
                log_error!("task worker join error: {}", e);
            }
        }
    }

    async fn timer_loop(&self) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.timer_check_interval_secs));
        loop {
            if self.is_shut_down() {
                break;
            }
            interval.tick().await;

            let now = Local::now();
            if let Err(e) = self.batch_scheduler.tick(&now).await {
                log_error!("timer tick failed: {}", e);
            }
        }
    }

    async fn progress_loop(&self) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.progress_interval_secs));
        loop {
            if self.is_shut_down() {
                break;
            }
            select! {
                _ = interval.tick() => {}
                _ = self.events.notified() => {}
            }

            self.events.drain();
            if let Err(e) = self.aggregator.refresh().await {
                log_error!("progress refresh failed: {}", e);
            }
        }
    }

    async fn monitor_loop(&self) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.monitor_flush_interval_secs));
        loop {
            if self.is_shut_down() {
                break;
            }
            interval.tick().await;

            self.monitor
                .set(CounterType::QueuedTasks, self.admission.queue_depth() as u64);
            self.monitor.set(
                CounterType::RunningTasks,
                self.admission.running_count() as u64,
            );
            self.monitor.set(
                CounterType::TaskMaxNum,
                self.dynamic_config.task_max_num() as u64,
            );
            self.monitor
                .set(CounterType::AdmittedTotal, self.admission.admitted_total());
            self.monitor.flush().await;
        }
    }
}
