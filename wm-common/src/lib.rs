pub mod config;
pub mod error;
pub mod meta;
pub mod monitor;
pub mod utils;

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => {
        log::info!($($arg)+)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)+) => {
        log::warn!($($arg)+)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => {
        log::error!($($arg)+)
    };
}

#[macro_export]
macro_rules! log_finished {
    ($($arg:tt)+) => {
        log::info!(target: "finished", $($arg)+)
    };
}

#[macro_export]
macro_rules! log_monitor {
    ($($arg:tt)+) => {
        log::info!(target: "monitor", $($arg)+)
    };
}

#[macro_export]
macro_rules! log_task {
    ($($arg:tt)+) => {
        log::info!(target: "task", $($arg)+)
    };
}
