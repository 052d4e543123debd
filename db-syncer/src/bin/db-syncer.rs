use anyhow::Context;
use db_syncer::telemetry::{self, LogFormat};
use db_syncer::{
    JsonRpcLedgerClient, LedgerClient, PgSourceStore, Scheduler, SourceStore, Syncer,
    CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH,
};
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;
use sync_core::AppSettings;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const LEDGER_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    telemetry::init(LogFormat::from_env());

    info!("Starting DB Syncer...");

    // Load configuration
    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut settings = AppSettings::from_file(&config_path)
        .with_context(|| format!("Failed to load settings from {}", config_path))?;
    settings.apply_env()?;

    let targets = settings.resolve_targets()?;
    let options = settings.sync_options();
    let delay = settings.sync_delay();

    info!(targets = targets.len(), "Configuration loaded successfully");

    let source: Arc<dyn SourceStore> = Arc::new(PgSourceStore::new());
    let ledger: Arc<dyn LedgerClient> = Arc::new(JsonRpcLedgerClient::new(LEDGER_TIMEOUT)?);

    let syncers: Vec<Arc<Syncer>> = targets
        .into_iter()
        .map(|target| {
            Arc::new(Syncer::new(
                Arc::new(target),
                Arc::clone(&source),
                Arc::clone(&ledger),
                options,
            ))
        })
        .collect();

    let destinations = syncers
        .iter()
        .map(|s| format!("{}|{}", s.target().ledger_address, s.target().ledger_table_name))
        .collect::<Vec<_>>()
        .join(",");

    let scheduler = Scheduler::new(syncers, delay, CancellationToken::new());

    // Graceful shutdown
    let signal_token = scheduler.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Prepared for graceful shutdown...");
                signal_token.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    info!("System started, Ctrl + C to terminate...");
    info!(
        "Syncing to [{}] by [{}s] delay",
        destinations,
        delay.as_secs()
    );

    scheduler.run().await;

    Ok(())
}
