//! Workshop ledger server.
//!
//! Configuration comes from the environment (and `.env`), see
//! [`ServerConfig::from_env`].

use repair_kit::config::ServerConfig;
use repair_kit::observability::OperationCounters;
use repair_kit::{http, JobController, MemoryStore};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init()
        .ok();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("repair-kit stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;

    let store = match &config.snapshot_path {
        Some(path) => MemoryStore::open(path).await?,
        None => {
            log::warn!("REPAIR_KIT_SNAPSHOT not set, jobs are kept in memory only");
            MemoryStore::new()
        }
    };
    store.log_stats().await;

    let counters = Arc::new(OperationCounters::new());
    let controller = JobController::new(store)
        .with_config(config.controller.clone())
        .with_metrics(counters.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    log::info!(
        "repair-kit {} listening on http://{}",
        repair_kit::VERSION,
        config.bind_address
    );

    axum::serve(listener, http::router(controller))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for (op, count) in counters.snapshot() {
        log::info!(
            "{}: {} succeeded, {} failed",
            op,
            count.succeeded,
            count.failed()
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}
