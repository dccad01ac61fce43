use async_trait::async_trait;
use dashmap::DashMap;

use super::{counter_type::CounterType, FlushableMonitor};
use crate::log_monitor;

/// gauge/counter snapshot of the scheduler, flushed to the monitor log
/// on an interval so queue starvation stays observable
#[derive(Default)]
pub struct SchedulerMonitor {
    counters: DashMap<CounterType, u64>,
}

#[async_trait]
impl FlushableMonitor for SchedulerMonitor {
    async fn flush(&self) {
        let mut entries: Vec<(CounterType, u64)> = self
            .counters
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        if entries.is_empty() {
            return;
        }
        entries.sort_by_key(|(counter_type, _)| format!("{}", counter_type));

        let mut log = "scheduler".to_string();
        for (counter_type, value) in entries {
            log = format!("{} | {}={}", log, counter_type, value);
        }
        log_monitor!("{}", log);
    }
}

impl SchedulerMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, counter_type: CounterType, value: u64) {
        self.counters.insert(counter_type, value);
    }

    pub fn add(&self, counter_type: CounterType, value: u64) {
        *self.counters.entry(counter_type).or_insert(0) += value;
    }

    pub fn get(&self, counter_type: CounterType) -> u64 {
        self.counters
            .get(&counter_type)
            .map(|entry| *entry.value())
            .unwrap_or(0)
    }
}
