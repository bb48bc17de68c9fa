//! Discipline Timer - break timers backed by a shared daily break pool
//!
//! This is the main entry point for the discipline-timer service.

use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use discipline_timer::{
    config::Config,
    engine::AccountingEngine,
    state::AppState,
    api::create_router,
    sync::JsonFileStore,
    tasks::{day_rollover_task, follower_task, tick_driver_task},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("discipline_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting discipline-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, pool={}min, state={}",
          config.host, config.port, config.pool_minutes, config.state_file.display());

    let table = config.timer_table()?;
    info!("Loaded {} timers", table.len());

    let engine = AccountingEngine::new(table, config.daily_allowance());
    let store = Arc::new(JsonFileStore::new(&config.state_file));
    let state = Arc::new(AppState::new(engine, store, config.server_info()));

    // A missing or unreadable store leaves the fresh day in place
    if let Err(e) = state.load_from_store() {
        warn!("Continuing with default state: {}", e);
    }

    if config.follow {
        info!("Follower mode: mirroring {} read-only", config.state_file.display());
        let follower_state = Arc::clone(&state);
        tokio::spawn(async move {
            follower_task(follower_state, Duration::from_secs(1)).await;
        });
    } else {
        let tick_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = tick_driver_task(tick_state).await {
                error!("Tick driver stopped: {}", e);
            }
        });

        if config.reset_hour.is_some() {
            let rollover_state = Arc::clone(&state);
            tokio::spawn(async move {
                day_rollover_task(rollover_state).await;
            });
        }
    }

    // Create HTTP router with all endpoints
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /state               - Pool and all timers");
    info!("  GET  /timers/:id          - Single timer");
    info!("  GET  /log                 - Activity feed");
    info!("  GET  /events              - Snapshot stream (server-sent events)");
    info!("  GET  /health              - Health check");
    info!("  POST /timers/:id/start    - Start a timer (admin)");
    info!("  POST /timers/:id/stop     - Stop a timer (admin)");
    info!("  POST /timers/:id/restart  - Restart an overflowing timer (admin)");
    info!("  POST /timers/:id/adjust   - Adjust elapsed seconds (admin)");
    info!("  POST /timers/:id/jump     - Jump forward in minutes (admin)");
    info!("  POST /day/reset           - Start a fresh day (admin)");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
