use std::{
    collections::{HashSet, VecDeque},
    sync::{Arc, Mutex},
};

use tokio::sync::Notify;

use wm_common::config::server_config::DynamicConfig;

struct AdmissionInner {
    queue: VecDeque<i64>,
    queued: HashSet<i64>,
    running: HashSet<i64>,
    admitted_total: u64,
}

/// the single shared resource of the engine: a FIFO of runnable task ids
/// and the count of running tasks, bounded by `task.max.num`. every access
/// goes through the one mutex, workers never touch the queue directly.
pub struct AdmissionController {
    inner: Mutex<AdmissionInner>,
    dynamic_config: Arc<DynamicConfig>,
    notify: Notify,
}

impl AdmissionController {
    pub fn new(dynamic_config: Arc<DynamicConfig>) -> Self {
        Self {
            inner: Mutex::new(AdmissionInner {
                queue: VecDeque::new(),
                queued: HashSet::new(),
                running: HashSet::new(),
                admitted_total: 0,
            }),
            dynamic_config,
            notify: Notify::new(),
        }
    }

    /// false when the task is already queued or running
    pub fn enqueue(&self, task_id: i64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.queued.contains(&task_id) || inner.running.contains(&task_id) {
            return false;
        }
        inner.queue.push_back(task_id);
        inner.queued.insert(task_id);
        drop(inner);
        self.notify.notify_one();
        true
    }

    pub fn enqueue_all(&self, task_ids: &[i64]) -> usize {
        task_ids.iter().filter(|id| self.enqueue(**id)).count()
    }

    /// promote the oldest queued task if capacity allows. the ceiling is
    /// read here, so a config change applies to future admissions only.
    pub fn try_admit(&self) -> Option<i64> {
        let max_running = self.dynamic_config.task_max_num();
        let mut inner = self.inner.lock().unwrap();
        if inner.running.len() >= max_running {
            return None;
        }
        let task_id = inner.queue.pop_front()?;
        inner.queued.remove(&task_id);
        inner.running.insert(task_id);
        inner.admitted_total += 1;
        Some(task_id)
    }

    /// called once per task completion, frees the slot and wakes the dispatcher
    pub fn finish(&self, task_id: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.running.remove(&task_id);
        drop(inner);
        self.notify.notify_one();
    }

    /// drop a task from the queue (stop/delete actions); running tasks are
    /// never preempted here, stop is cooperative
    pub fn remove_queued(&self, task_id: i64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if !inner.queued.remove(&task_id) {
            return false;
        }
        inner.queue.retain(|id| *id != task_id);
        true
    }

    pub fn is_running(&self, task_id: i64) -> bool {
        self.inner.lock().unwrap().running.contains(&task_id)
    }

    pub fn queue_depth(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    pub fn running_count(&self) -> usize {
        self.inner.lock().unwrap().running.len()
    }

    pub fn admitted_total(&self) -> u64 {
        self.inner.lock().unwrap().admitted_total
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}
