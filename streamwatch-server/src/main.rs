//! Streamwatch Server - Headless Daemon
//!
//! Polls Perforce servers for stream sizes and keeps their history:
//! - REST API for the dashboard and scripts on /api/*
//! - Periodic mass update of every stream of every active server
//! - One-shot CLI subcommands over the same engine
//!
//! Access via: http://localhost:5000

#![allow(clippy::print_stdout, reason = "CLI subcommands write their results to stdout")]

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

mod api;
mod cli;
mod commands;
mod logging;
mod router;
mod scheduler;
mod server_utils;
mod state;

#[cfg(test)]
mod test_helpers;

use cli::{Cli, Commands};
use state::AppState;
use streamwatch_core::utils::paths;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let serving = matches!(cli.command, None | Some(Commands::Serve { .. }));
    let log_dir = if serving { paths::get_log_dir().ok() } else { None };
    let _log_guard = logging::init_logging(&cli.log_level, log_dir.as_deref());

    let config_path = resolve_config_path(cli.config)?;
    let config = streamwatch_core::load_config_or_default(&config_path)?;
    let state = AppState::open(config, config_path)?;

    match cli.command {
        None => run_server(state, cli.port).await,
        Some(Commands::Serve { port }) => run_server(state, port).await,
        Some(Commands::SyncServers) => commands::handle_sync_servers(&state).await,
        Some(Commands::SyncStreams { server }) => {
            commands::handle_sync_streams(&state, server).await
        },
        Some(Commands::Refresh { all, server, stream }) => {
            commands::handle_refresh(&state, all, server, stream).await
        },
        Some(Commands::Servers { json }) => commands::handle_servers(&state, json).await,
        Some(Commands::Status) => commands::handle_status(&state).await,
        Some(Commands::AuthCheck) => commands::handle_auth_check(&state).await,
        Some(Commands::Login { server }) => commands::handle_login(&state, server).await,
    }
}

fn resolve_config_path(flag: Option<PathBuf>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path),
        None => paths::get_default_config_path()
            .map_err(|e| anyhow::anyhow!("Failed to resolve config path: {}", e)),
    }
}

async fn run_server(state: AppState, port: u16) -> Result<()> {
    info!("🚀 Streamwatch Server v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("📄 Config: {}", state.config_path().display());

    if streamwatch_core::metrics::init_metrics().is_some() {
        info!("📈 Prometheus metrics at /metrics");
    }

    match state.sync_servers().await {
        Ok(stats) => info!("📊 {}", stats.message()),
        Err(e) => tracing::warn!("⚠️ Initial server sync failed: {}", e),
    }
    info!("✅ Application state initialized");

    scheduler::start_mass_update(state.clone());

    let addr = state.http_config().await.socket_addr(port)?;
    let app = router::build_router(state);
    let listener = server_utils::create_listener(addr).await?;

    info!("🌐 Server listening on http://{}", listener.local_addr()?);
    info!("🔌 API available at http://{}/api/", listener.local_addr()?);

    axum::serve(listener, app).with_graceful_shutdown(server_utils::shutdown_signal()).await?;

    info!("👋 Server stopped");
    Ok(())
}
