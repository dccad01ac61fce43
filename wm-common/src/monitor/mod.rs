pub mod counter_type;
pub mod scan_progress;
pub mod scheduler_monitor;

use async_trait::async_trait;

#[async_trait]
pub trait FlushableMonitor {
    async fn flush(&self);
}
