use std::sync::Arc;

use anyhow::{Context, bail};
use exercise_catalog_client::CatalogClient;
use exercise_catalog_client::config::Config;
use exercise_catalog_client::http_client::ReqwestCatalogClient;
use exercise_sync::{
    CatalogStore, InMemoryCatalogStore, LoggingMiddleware, SyncCoordinator, SyncEngine,
    SyncOptions, SyncStatus, TokioBackgroundExecutor,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configure logging from env var `EXERCISE_SYNC_LOG_LEVEL` (or fallback to `RUST_LOG`, default `info`).
    let log_env = std::env::var("EXERCISE_SYNC_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::info!("exercise-sync: log filter: {}", log_env);

    let config = Config::from_env().context("invalid catalog configuration")?;
    tracing::info!("exercise-sync: catalog at {}", config.base_url);
    let client = LoggingMiddleware::new(
        ReqwestCatalogClient::new(&config).context("failed to build catalog client")?,
    );

    // `exercise-sync search <query>` looks records up without touching the store.
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let [command, query @ ..] = args.as_slice() {
        if command == "search" {
            let records = client.search(&query.join(" ")).await?;
            for record in records {
                println!("{}", serde_json::to_string(&record)?);
            }
            return Ok(());
        }
        bail!("unknown command {command:?}; expected no arguments or `search <query>`");
    }

    let store = Arc::new(InMemoryCatalogStore::new());
    let engine = SyncEngine::new(Arc::new(client), store.clone());
    let coordinator = SyncCoordinator::new(
        Arc::new(TokioBackgroundExecutor::new(engine)),
        SyncOptions {
            page_size: config.page_size,
            limit: config.sync_limit,
        },
    );

    let mut status_rx = coordinator.observe_status();
    let request = coordinator.sync_now().await?;
    tracing::info!("exercise-sync: session {} requested", request.task_id());

    let mut ctrl_c = std::pin::pin!(tokio::signal::ctrl_c());
    let mut interrupted = false;
    let mut last_printed: Option<SyncStatus> = None;
    let terminal = loop {
        let status = status_rx.borrow_and_update().clone();
        if last_printed.as_ref() != Some(&status) {
            println!("{}", serde_json::to_string(&status)?);
            last_printed = Some(status.clone());
        }
        if status.is_terminal() {
            break status;
        }
        tokio::select! {
            changed = status_rx.changed() => changed.context("status feed closed")?,
            signal = &mut ctrl_c, if !interrupted => {
                signal.context("failed to listen for ctrl-c")?;
                interrupted = true;
                tracing::info!("exercise-sync: interrupt received, cancelling");
                coordinator.cancel_all_sync().await;
            }
        }
    };

    let stored = store.count().await?;
    tracing::info!("exercise-sync: {} exercises in local store", stored);
    match terminal {
        SyncStatus::Error { message } => bail!("exercise sync failed: {message}"),
        _ => Ok(()),
    }
}
