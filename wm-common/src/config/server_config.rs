use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::bail;

use super::ini_loader::IniLoader;
use crate::error::Error;

const SCHEDULER: &str = "scheduler";
const RUNTIME: &str = "runtime";

const TASK_MAX_NUM: &str = "task_max_num";
const SCHEDULING_INTERVAL_SECS: &str = "scheduling_interval_secs";
const TIMER_CHECK_INTERVAL_SECS: &str = "timer_check_interval_secs";
const PROGRESS_INTERVAL_SECS: &str = "progress_interval_secs";
const MONITOR_FLUSH_INTERVAL_SECS: &str = "monitor_flush_interval_secs";
const TERMINATED_RING_SIZE: &str = "terminated_ring_size";
const LOG_LEVEL: &str = "log_level";
const LOG_DIR: &str = "log_dir";
const LOG4RS_FILE: &str = "log4rs_file";

pub const DEFAULT_TASK_MAX_NUM: usize = 8;

#[derive(Clone)]
pub struct ServerConfig {
    pub task_max_num: usize,
    pub scheduling_interval_secs: u64,
    pub timer_check_interval_secs: u64,
    pub progress_interval_secs: u64,
    pub monitor_flush_interval_secs: u64,
    pub terminated_ring_size: usize,
    pub log_level: String,
    pub log_dir: String,
    pub log4rs_file: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            task_max_num: DEFAULT_TASK_MAX_NUM,
            scheduling_interval_secs: 2,
            timer_check_interval_secs: 10,
            progress_interval_secs: 3,
            monitor_flush_interval_secs: 10,
            terminated_ring_size: 1000,
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log4rs_file: String::new(),
        }
    }
}

impl ServerConfig {
    pub fn new(config_file: &str) -> anyhow::Result<Self> {
        let loader = IniLoader::new(config_file);
        let defaults = Self::default();

        let config = Self {
            task_max_num: loader.get_with_default(SCHEDULER, TASK_MAX_NUM, defaults.task_max_num),
            scheduling_interval_secs: loader.get_with_default(
                SCHEDULER,
                SCHEDULING_INTERVAL_SECS,
                defaults.scheduling_interval_secs,
            ),
            timer_check_interval_secs: loader.get_with_default(
                SCHEDULER,
                TIMER_CHECK_INTERVAL_SECS,
                defaults.timer_check_interval_secs,
            ),
            progress_interval_secs: loader.get_with_default(
                SCHEDULER,
                PROGRESS_INTERVAL_SECS,
                defaults.progress_interval_secs,
            ),
            monitor_flush_interval_secs: loader.get_with_default(
                SCHEDULER,
                MONITOR_FLUSH_INTERVAL_SECS,
                defaults.monitor_flush_interval_secs,
            ),
            terminated_ring_size: loader.get_with_default(
                SCHEDULER,
                TERMINATED_RING_SIZE,
                defaults.terminated_ring_size,
            ),
            log_level: loader.get_with_default(RUNTIME, LOG_LEVEL, defaults.log_level),
            log_dir: loader.get_with_default(RUNTIME, LOG_DIR, defaults.log_dir),
            log4rs_file: loader.get_with_default(RUNTIME, LOG4RS_FILE, defaults.log4rs_file),
        };

        if config.task_max_num == 0 {
            bail!(Error::ConfigError(format!(
                "[{}] {} must be > 0",
                SCHEDULER, TASK_MAX_NUM
            )));
        }
        Ok(config)
    }
}

/// values that may be changed while the scheduler runs, read at admission time,
/// swapped atomically so workers never see a torn update
pub struct DynamicConfig {
    task_max_num: AtomicUsize,
}

impl DynamicConfig {
    pub fn new(task_max_num: usize) -> Self {
        Self {
            task_max_num: AtomicUsize::new(task_max_num),
        }
    }

    pub fn task_max_num(&self) -> usize {
        self.task_max_num.load(Ordering::Acquire)
    }

    pub fn set_task_max_num(&self, value: usize) {
        self.task_max_num.store(value.max(1), Ordering::Release);
    }
}
