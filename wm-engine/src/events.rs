use concurrent_queue::ConcurrentQueue;
use tokio::sync::Notify;

use wm_common::config::config_enums::TaskStatus;

/// emitted by a task driver on every phase transition, consumed by the
/// progress aggregator
#[derive(Clone, Debug)]
pub struct TaskEvent {
    pub task_id: i64,
    pub job_id: i64,
    pub status: TaskStatus,
}

pub struct EventQueue {
    queue: ConcurrentQueue<TaskEvent>,
    notify: Notify,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            queue: ConcurrentQueue::unbounded(),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, event: TaskEvent) {
        // the queue only closes on drop, a failed push can be ignored
        let _ = self.queue.push(event);
        self.notify.notify_one();
    }

    pub fn drain(&self) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.queue.pop() {
            events.push(event);
        }
        events
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}
