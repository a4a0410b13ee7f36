use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info, warn};

use recipe_sync::config::{Config, DatabaseConfig};
use recipe_sync::error::{RefreshPhase, SyncError};
use recipe_sync::fetch::Trello;
use recipe_sync::infra::http_client::ReqwestHttp;
use recipe_sync::logging;
use recipe_sync::metrics::install_recorder;
use recipe_sync::populate::populate_all;
use recipe_sync::refresh::{spawn_schedule, Refresher};
use recipe_sync::server::{start_server, AppState};
use recipe_sync::storage::{DocumentStore, InMemoryStore};

#[derive(Parser)]
#[command(name = "recipe_sync")]
#[command(about = "Mirrors a Trello recipe board into a document store and serves it")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the read API and the board webhook
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Run a full refresh before accepting requests
        #[arg(long)]
        refresh_on_start: bool,
    },
    /// Archive the collections and repopulate them from the board
    Refresh,
    /// Populate the collections without archiving first
    Populate,
}

#[cfg(feature = "db")]
async fn connect_store(database: &DatabaseConfig) -> recipe_sync::error::Result<Arc<dyn DocumentStore>> {
    use recipe_sync::storage::libsql_store::LibsqlStore;

    match &database.url {
        Some(url) => {
            let token = database.auth_token.clone().unwrap_or_default();
            Ok(Arc::new(LibsqlStore::connect(url, &token).await?))
        }
        None => {
            warn!("No database URL configured, using the in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

#[cfg(not(feature = "db"))]
async fn connect_store(database: &DatabaseConfig) -> recipe_sync::error::Result<Arc<dyn DocumentStore>> {
    if database.url.is_some() {
        warn!("Database URL ignored: built without the `db` feature");
    }
    info!("Using the in-memory store");
    Ok(Arc::new(InMemoryStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;

    let store = connect_store(&config.database)
        .await
        .map_err(|e| SyncError::refresh(RefreshPhase::Connecting, e))?;
    let trello = Arc::new(Trello::new(config.trello.clone(), Arc::new(ReqwestHttp::new())));

    let outcome = run(cli.command, &config, store.clone(), trello).await;

    if let Err(e) = store.close().await {
        warn!("Closing the store failed: {}", e);
    }
    outcome
}

async fn run(command: Commands, config: &Config, store: Arc<dyn DocumentStore>, trello: Arc<Trello>) -> Result<()> {
    match command {
        Commands::Serve { port, refresh_on_start } => {
            let refresher = Arc::new(Refresher::new(store.clone(), trello.clone(), config.refresh.clone()));
            if refresh_on_start {
                if let Err(e) = refresher.run().await {
                    error!("Initial refresh failed: {}", e);
                }
            }

            let schedule = config.refresh.interval().map(|period| {
                info!("Refreshing every {} hours", config.refresh.interval_hours);
                spawn_schedule(refresher.clone(), period)
            });

            let mut state = AppState::new(store, trello);
            match install_recorder() {
                Ok(handle) => state = state.with_metrics(handle),
                Err(e) => warn!("Metrics disabled: {}", e),
            }

            let served = start_server(state, port.unwrap_or(config.server.port)).await;
            if let Some(schedule) = schedule {
                schedule.abort();
            }
            served.context("running HTTP server")?;
        }
        Commands::Refresh => {
            let refresher = Refresher::new(store, trello, config.refresh.clone());
            let report = refresher.run().await?;
            info!(
                "Archived {:?}, pruned {:?}",
                report.archived, report.pruned
            );
            println!(
                "Refreshed: {} tags, {} recipes, {} details",
                report.populated.tags, report.populated.recipes, report.populated.details
            );
        }
        Commands::Populate => {
            let summary = populate_all(store.as_ref(), &trello, config.refresh.detail_delay()).await?;
            println!(
                "Populated: {} tags, {} recipes, {} details",
                summary.tags, summary.recipes, summary.details
            );
        }
    }
    Ok(())
}
