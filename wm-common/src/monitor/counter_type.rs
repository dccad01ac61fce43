use strum::{Display, EnumString, IntoStaticStr};

#[derive(EnumString, IntoStaticStr, Display, PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum CounterType {
    #[strum(serialize = "queued_tasks")]
    QueuedTasks,
    #[strum(serialize = "running_tasks")]
    RunningTasks,
    #[strum(serialize = "task_max_num")]
    TaskMaxNum,
    #[strum(serialize = "admitted_total")]
    AdmittedTotal,
    #[strum(serialize = "succeeded_total")]
    SucceededTotal,
    #[strum(serialize = "failed_total")]
    FailedTotal,
    #[strum(serialize = "stopped_total")]
    StoppedTotal,
    #[strum(serialize = "batches_created")]
    BatchesCreated,
    #[strum(serialize = "timer_fires_skipped")]
    TimerFiresSkipped,
}
