use std::{env, panic, sync::Arc};

use anyhow::bail;
use log4rs::config::{Config, Deserializers, RawConfig};
use tokio::{
    fs::{metadata, File},
    io::AsyncReadExt,
};

use wm_common::{config::server_config::ServerConfig, log_error, log_info};
use wm_engine::{executor::NoopPhaseExecutor, scheduler::MigrationScheduler};
use wm_store::MemoryStore;

const LOG_LEVEL_PLACEHOLDER: &str = "LOG_LEVEL_PLACEHOLDER";
const LOG_DIR_PLACEHOLDER: &str = "LOG_DIR_PLACEHOLDER";
const DEFAULT_CONFIG_FILE: &str = "conf/server_config.ini";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let config_file = args
        .get(1)
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_FILE);
    let config = ServerConfig::new(config_file)?;

    init_log4rs(&config).await?;

    panic::set_hook(Box::new(|panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();
        log_error!("panic: {}\nbacktrace:\n{}", panic_info, backtrace);
    }));

    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(NoopPhaseExecutor::registry());
    let scheduler = MigrationScheduler::new(
        config,
        store.clone(),
        store.clone(),
        store.clone(),
        registry,
    );

    let handle = scheduler.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log_info!("shutdown signal received");
            handle.shutdown();
        }
    });

    scheduler.run().await?;
    log::logger().flush();
    Ok(())
}

async fn init_log4rs(config: &ServerConfig) -> anyhow::Result<()> {
    let log4rs_file = &config.log4rs_file;
    if log4rs_file.is_empty() || metadata(log4rs_file).await.is_err() {
        return Ok(());
    }

    let mut config_str = String::new();
    let mut file = File::open(log4rs_file).await?;
    file.read_to_string(&mut config_str).await?;

    config_str = config_str
        .replace(LOG_DIR_PLACEHOLDER, &config.log_dir)
        .replace(LOG_LEVEL_PLACEHOLDER, &config.log_level);

    let raw: RawConfig = serde_yaml::from_str(&config_str)?;
    let deserializers = Deserializers::default();
    let (appenders, errors) = raw.appenders_lossy(&deserializers);
    if !errors.is_empty() {
        bail!("errors deserializing appenders: {:?}", errors);
    }

    let log4rs_config = Config::builder()
        .appenders(appenders)
        .loggers(raw.loggers())
        .build(raw.root())?;
    log4rs::init_config(log4rs_config)?;
    Ok(())
}
