//! SlotKeeper service
//!
//! Main application entry point

use std::sync::Arc;

use tracing::{error, info};

use SlotKeeper::{
    config::Settings,
    database::{create_pool, run_migrations, DatabaseService, EventStore},
    services::{log_notifications, BookingEngine, CompletionSweeper, NotificationEmitter},
    utils::logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Environment overrides from .env are optional
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;
    settings.validate()?;

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", SlotKeeper::info());

    // Initialize database connection
    info!("Connecting to database...");
    let db_pool = create_pool(&settings.database).await?;
    run_migrations(&db_pool).await?;

    let store: Arc<dyn EventStore> = Arc::new(DatabaseService::new(
        db_pool.clone(),
        settings.booking.transaction_timeout_ms,
    ));

    // Notification facts go to the log until a messaging collaborator is attached
    let (emitter, receiver) = NotificationEmitter::channel();
    let consumer = tokio::spawn(log_notifications(receiver));

    let engine = BookingEngine::new(Arc::clone(&store), settings.booking.clone(), emitter);

    let mut sweeper = CompletionSweeper::new(store, settings.booking.completion_sweep_interval());
    sweeper.start();

    info!("SlotKeeper is ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down...");
    sweeper.stop();

    // Dropping the last emitter closes the channel and lets the consumer drain
    drop(engine);
    match consumer.await {
        Ok(consumed) => info!(consumed, "Notification consumer finished"),
        Err(e) => error!("Notification consumer failed: {}", e),
    }

    db_pool.close().await;
    info!("SlotKeeper has been shut down.");

    Ok(())
}
