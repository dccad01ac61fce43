use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Local};

use wm_common::{
    log_error, log_info, log_warn,
    meta::job::JobModel,
    monitor::{counter_type::CounterType, scheduler_monitor::SchedulerMonitor},
};
use wm_store::{JobStore, TaskStore};

use crate::job_manager::JobManager;

/// evaluates job timers at minute resolution. each matching minute fires
/// at most once per job; a firing is skipped (and logged) while an earlier
/// batch of the job still has unfinished tasks.
pub struct BatchScheduler {
    jobs: Arc<dyn JobStore>,
    tasks: Arc<dyn TaskStore>,
    job_manager: Arc<JobManager>,
    monitor: Arc<SchedulerMonitor>,
    last_fired: Mutex<HashMap<i64, i64>>,
}

impl BatchScheduler {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        tasks: Arc<dyn TaskStore>,
        job_manager: Arc<JobManager>,
        monitor: Arc<SchedulerMonitor>,
    ) -> Self {
        Self {
            jobs,
            tasks,
            job_manager,
            monitor,
            last_fired: Mutex::new(HashMap::new()),
        }
    }

    /// returns the task ids of all batches created by this tick
    pub async fn tick(&self, now: &DateTime<Local>) -> anyhow::Result<Vec<i64>> {
        let minute_stamp = now.timestamp() / 60;
        let mut new_task_ids = Vec::new();

        for job in self.jobs.list_timed_jobs().await? {
            if job.stopped {
                continue;
            }
            if !job.config.timer.matches(now) {
                continue;
            }
            if !self.mark_fired(job.id, minute_stamp) {
                continue;
            }

            if self.has_unfinished_tasks(&job).await? {
                log_warn!(
                    "job [{}] timer fired but an earlier batch is unfinished, skipping",
                    job.id
                );
                self.monitor.add(CounterType::TimerFiresSkipped, 1);
                continue;
            }

            match self.job_manager.run_batch(job.id).await {
                Ok(run) => {
                    log_info!(
                        "job [{}] timer created batch [{}] with {} tasks",
                        job.id,
                        run.batch_seq,
                        run.task_ids.len()
                    );
                    self.monitor.add(CounterType::BatchesCreated, 1);
                    new_task_ids.extend(run.task_ids);
                }
                // already recorded on the failed batch, the scheduler moves on
                Err(e) => log_error!("job [{}] timer batch failed: {}", job.id, e),
            }
        }
        Ok(new_task_ids)
    }

    /// false when the job already fired in this minute
    fn mark_fired(&self, job_id: i64, minute_stamp: i64) -> bool {
        let mut last_fired = self.last_fired.lock().unwrap();
        if last_fired.get(&job_id) == Some(&minute_stamp) {
            return false;
        }
        last_fired.insert(job_id, minute_stamp);
        true
    }

    /// a stopped-but-unfinished task keeps the batch open on purpose: the
    /// operator has to resolve it before the timer may pile on new work
    async fn has_unfinished_tasks(&self, job: &JobModel) -> anyhow::Result<bool> {
        let tasks = self.tasks.tasks_of_job(job.id).await?;
        Ok(tasks
            .iter()
            .any(|task| !task.deleted && !task.status.is_terminal()))
    }
}
