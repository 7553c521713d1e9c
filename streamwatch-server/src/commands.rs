use anyhow::Result;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use std::io::{self, Write};

use streamwatch_core::utils::format::human_size;
use streamwatch_types::{RefreshStats, Server, ServerEntry};

use crate::state::AppState;

pub async fn handle_sync_servers(state: &AppState) -> Result<()> {
    println!("{}", "Synchronizing servers from config...".cyan());
    let stats = state.sync_servers().await?;
    println!("{} {}", "✓".green(), stats.message());
    Ok(())
}

pub async fn handle_sync_streams(state: &AppState, server_id: i64) -> Result<()> {
    let server = state.coordinator().registry().get(server_id)?;
    println!("{} {}", "Synchronizing streams of".cyan(), server.name.cyan().bold());

    let stats = state.coordinator().catalog().sync_streams(server_id).await?;
    println!(
        "{} {} streams (+{} -{})",
        "✓".green(),
        stats.total,
        stats.added,
        stats.removed
    );
    Ok(())
}

pub async fn handle_refresh(
    state: &AppState,
    all: bool,
    server: Option<i64>,
    stream: Option<i64>,
) -> Result<()> {
    let coordinator = state.coordinator();

    if let Some(stream_id) = stream {
        let refreshed = coordinator.refresh_stream(stream_id).await?;
        println!(
            "{} {}: {}, {} files",
            "✓".green(),
            refreshed.stream.name,
            human_size(refreshed.measurement.size_bytes),
            refreshed.measurement.file_count
        );
        return Ok(());
    }

    let stats = if let Some(server_id) = server {
        coordinator.refresh_server(server_id).await?
    } else if all {
        coordinator.refresh_all().await?
    } else {
        anyhow::bail!("Specify --all, --server <id> or --stream <id>");
    };
    print_refresh_stats(&stats);
    Ok(())
}

fn print_refresh_stats(stats: &RefreshStats) {
    println!("{}", "Refresh finished".cyan().bold());
    println!("  Updated: {}", stats.updated.to_string().green());
    if stats.failed > 0 {
        println!("  Failed:  {}", stats.failed.to_string().red());
    }
    if stats.skipped > 0 {
        println!("  Skipped: {}", stats.skipped.to_string().yellow());
    }
    if stats.added > 0 || stats.removed > 0 {
        println!("  Catalog: +{} -{}", stats.added, stats.removed);
    }
}

pub async fn handle_servers(state: &AppState, json: bool) -> Result<()> {
    let servers = state.coordinator().registry().overview()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&servers)?);
        return Ok(());
    }

    if servers.is_empty() {
        println!("{}", "No servers configured.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Name", "P4PORT", "User", "Streams", "Size", "Status"]);

    for s in &servers {
        let status = if s.server.active {
            Cell::new("Active").fg(Color::Green)
        } else {
            Cell::new("Inactive").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(s.server.id),
            Cell::new(&s.server.name),
            Cell::new(&s.server.p4port),
            Cell::new(&s.server.p4user),
            Cell::new(s.stream_count),
            Cell::new(human_size(s.total_size_bytes)),
            status,
        ]);
    }

    println!("{table}");
    println!("\n{} servers total", servers.len());
    Ok(())
}

pub async fn handle_status(state: &AppState) -> Result<()> {
    let stats = state.coordinator().stats()?;

    println!("{}", "Streamwatch Status".cyan().bold());
    println!("  Servers: {} total, {} active", stats.servers, stats.active_servers);
    println!("  Streams: {}", stats.streams);
    println!(
        "  Size:    {} in {} files",
        human_size(stats.total_size_bytes),
        stats.total_files
    );
    println!("  History: {} records", stats.history_records);
    println!("  Config:  {}", state.config_path().display());
    println!("  Version: {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

pub async fn handle_auth_check(state: &AppState) -> Result<()> {
    let coordinator = state.coordinator();
    let servers = coordinator.registry().list_active()?;

    if servers.is_empty() {
        println!("{}", "No active servers.".yellow());
        return Ok(());
    }

    for server in servers {
        match coordinator.check_auth(server.id).await {
            Ok(true) => println!("{} {} ({})", "✓".green(), server.name, server.p4port),
            Ok(false) => println!(
                "{} {} ({}): not logged in as {}",
                "✗".red(),
                server.name,
                server.p4port,
                server.p4user
            ),
            Err(e) => println!("{} {} ({}): {}", "✗".red(), server.name, server.p4port, e),
        }
    }
    Ok(())
}

/// Environment variable holding a password shared by every server.
pub const COMMON_PASSWORD_ENV: &str = "P4_COMMON_PASSWORD";

pub async fn handle_login(state: &AppState, server: Option<i64>) -> Result<()> {
    let coordinator = state.coordinator();
    let servers = match server {
        Some(id) => vec![coordinator.registry().get(id)?],
        None => coordinator.registry().list_active()?,
    };
    if servers.is_empty() {
        println!("{}", "No active servers.".yellow());
        return Ok(());
    }

    let entries = state.server_entries().await;
    let common = std::env::var(COMMON_PASSWORD_ENV).ok();
    let mut logged_in = 0;

    for server in &servers {
        let (password, source) = resolve_password(&entries, server, common.as_deref(), || {
            prompt_password(server)
        })?;
        tracing::info!("Logging in {}@{} (password from {})", server.p4user, server.p4port, source);

        match coordinator.login(server.id, &password).await {
            Ok(()) => {
                logged_in += 1;
                println!("{} {} ({})", "✓".green(), server.name, server.p4port);
            },
            Err(e) => println!("{} {} ({}): {}", "✗".red(), server.name, server.p4port, e),
        }
    }

    println!("\n{}/{} servers logged in", logged_in, servers.len());
    if logged_in == 0 {
        anyhow::bail!("Login failed on every server");
    }
    Ok(())
}

/// Password for `server`: its config entry first, then the shared
/// environment password, then `prompt`. Returns the password and its source.
fn resolve_password(
    entries: &[ServerEntry],
    server: &Server,
    common: Option<&str>,
    prompt: impl FnOnce() -> Result<String>,
) -> Result<(String, &'static str)> {
    let configured = entries
        .iter()
        .find(|e| e.p4port == server.p4port)
        .and_then(|e| e.password.as_deref())
        .filter(|p| !p.is_empty());
    if let Some(password) = configured {
        return Ok((password.to_string(), "config"));
    }
    if let Some(password) = common.filter(|p| !p.is_empty()) {
        return Ok((password.to_string(), COMMON_PASSWORD_ENV));
    }

    let password = prompt()?;
    if password.is_empty() {
        anyhow::bail!("No password given for {}@{}", server.p4user, server.p4port);
    }
    Ok((password, "prompt"))
}

fn prompt_password(server: &Server) -> Result<String> {
    print!("Password for {}@{}: ", server.p4user, server.p4port);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}
