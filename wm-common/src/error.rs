use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config error: {0}")]
    ConfigError(String),

    #[error("expansion error: {0}")]
    ExpansionError(String),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("executor error: {0}")]
    ExecutorError(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}
