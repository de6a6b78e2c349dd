use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use tote::adapter::outbound::sqlite::database::connection::{create_pool_with, run_migrations};
use tote::adapter::outbound::sqlite::uow::SqliteUnitOfWorkFactory;
use tote::application::sweeper::Sweeper;
use tote::config::Config;
use tote::port::outbound::bus::{EventKind, LocalHandlerRegistry, LogEventBus};
use tote::port::outbound::uow::UnitOfWorkFactory;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = match Config::load("config.toml") {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    config.logging.init();
    info!("tote starting");

    let pool = match create_pool_with(&config.database.url, config.database.max_connections) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "Failed to open database");
            std::process::exit(1);
        }
    };
    if let Err(e) = run_migrations(&pool) {
        error!(error = %e, "Failed to run database migrations");
        std::process::exit(1);
    }

    // Frontends register their own handlers here; the bare core logs
    // every committed event.
    let mut handlers = LocalHandlerRegistry::new();
    for kind in [
        EventKind::GroupWagerStateChanged,
        EventKind::ParticipantUpdated,
        EventKind::BalanceChanged,
    ] {
        handlers.register(kind, |event| {
            info!(kind = %event.kind(), guild_id = %event.guild_id(), "Wagering event");
            Ok(())
        });
    }

    let factory: Arc<dyn UnitOfWorkFactory> = Arc::new(SqliteUnitOfWorkFactory::new(
        pool,
        Arc::new(handlers),
        Arc::new(LogEventBus),
    ));

    let sweeper_handle = if config.sweeper.enabled {
        Some(Sweeper::new(config.sweeper.clone(), factory).start())
    } else {
        info!("Expiry sweeper disabled");
        None
    };

    if signal::ctrl_c().await.is_err() {
        error!("Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");

    if let Some(handle) = sweeper_handle {
        handle.shutdown().await;
    }

    info!("tote stopped");
}
