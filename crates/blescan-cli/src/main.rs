//! blescan terminal client
//!
//! Drives a running `blescan-server`: the on/off buttons, the scan button and
//! the result list, printed as a table or followed live.
//!
//! # Environment Variables
//!
//! - `BLESCAN_SERVER_URL`: Optional. Server base URL (default: http://127.0.0.1:3000)
//! - `RUST_LOG`: Optional. Logging filter for stderr output (default: warn)

use std::pin::pin;

use anyhow::{Context, Result};
use blescan_core::ViewEvent;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde::Serialize;
use tracing::{info, warn};

mod client;
mod render;

use client::{BlescanClient, ScanResponse};

#[derive(Parser, Debug)]
#[command(name = "blescan")]
#[command(version, about = "Bluetooth LE scanner client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server base URL
    #[arg(
        short,
        long,
        env = "BLESCAN_SERVER_URL",
        default_value = "http://127.0.0.1:3000"
    )]
    server: String,

    /// Print raw JSON responses
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Turn Bluetooth on
    On,
    /// Turn Bluetooth off
    Off,
    /// Press the scan button: start if idle, stop if scanning
    Scan,
    /// Start scanning
    Start,
    /// Stop scanning
    Stop,
    /// Show server and scanner state
    Status,
    /// Print the result list
    List,
    /// Follow the result list as devices appear and update
    Watch,
    /// Show permission states and pending prompts
    Permissions,
    /// Grant a pending permission prompt
    Grant {
        /// Permission name, e.g. location
        permission: String,
    },
    /// Refuse a pending permission prompt
    Deny {
        /// Permission name, e.g. location
        permission: String,
    },
}

/// Initialize logging
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

fn print_scan(response: &ScanResponse) {
    for notice in &response.notices {
        println!("{}", render::notice(notice));
    }
    if let Some(session_id) = response.session_id {
        info!(%session_id, scanning = response.scanning, changed = response.changed, "Scan button handled");
    }
}

async fn watch(client: &BlescanClient) -> Result<()> {
    let mut events = pin!(client.events().await?);
    let mut rows = Vec::new();

    loop {
        let event = tokio::select! {
            event = events.next() => event,
            _ = tokio::signal::ctrl_c() => break,
        };
        let Some(event) = event else {
            warn!("Server closed the event stream");
            break;
        };
        let event = event?;

        if !event.apply(&mut rows) {
            warn!("Missed a change, refetching the list");
            rows = client.results().await?.rows;
            println!("{}", render::table(&rows));
            continue;
        }

        match &event {
            ViewEvent::Reset { rows } => println!("{}", render::table(rows)),
            ViewEvent::Inserted { row } => println!("+ {}", render::row_line(row)),
            ViewEvent::Changed { row } => println!("~ {}", render::row_line(row)),
            ViewEvent::ScanState { .. } => {}
            ViewEvent::Notice { notice } => println!("{}", render::notice(notice)),
        }
    }
    Ok(())
}

async fn answer(client: &BlescanClient, json: bool, permission: &str, granted: bool) -> Result<()> {
    let response = client.answer(permission, granted).await?;
    info!(permission = %response.permission, granted = response.granted, "Prompt answered");
    emit(json, &response, |r| println!("{}", render::notice(&r.notice)))
}

async fn run(cli: Cli) -> Result<()> {
    let client = BlescanClient::new(&cli.server)?;
    let json = cli.json;

    match cli.command {
        Commands::On => emit(json, &client.enable_radio().await?, |r| {
            println!("{}", render::notice(&r.notice));
        })?,
        Commands::Off => emit(json, &client.disable_radio().await?, |r| {
            println!("{}", render::notice(&r.notice));
        })?,
        Commands::Scan => emit(json, &client.toggle_scan().await?, print_scan)?,
        Commands::Start => emit(json, &client.start_scan().await?, print_scan)?,
        Commands::Stop => emit(json, &client.stop_scan().await?, print_scan)?,
        Commands::Status => {
            let health = client.health().await?;
            let status = client.scan_status().await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "health": health,
                        "scan": status,
                    }))?
                );
            } else {
                println!(
                    "Server:   {} {} (up {}s)",
                    health.status, health.version, health.uptime_secs
                );
                println!("Backend:  {}", health.backend);
                println!("Radio:    {}", if status.radio_enabled { "on" } else { "off" });
                match status.session_id {
                    Some(id) if status.scanning => println!("Scanning: yes (session {id})"),
                    _ => println!("Scanning: no"),
                }
                println!("Devices:  {}", status.result_count);
                println!("Mode:     {:?}", status.settings.mode);
            }
        }
        Commands::List => emit(json, &client.results().await?, |r| {
            println!("{}", render::table(&r.rows));
            println!(
                "{} device(s){}",
                r.count,
                if r.scanning { ", scanning" } else { "" }
            );
        })?,
        Commands::Watch => watch(&client).await?,
        Commands::Permissions => emit(json, &client.permissions().await?, |r| {
            println!("{}", render::permissions(r));
        })?,
        Commands::Grant { permission } => answer(&client, json, &permission, true).await?,
        Commands::Deny { permission } => answer(&client, json, &permission, false).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let server = cli.server.clone();
    run(cli)
        .await
        .with_context(|| format!("blescan server at {server}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toggle() {
        let cli = Cli::try_parse_from(["blescan", "scan"]).unwrap();
        assert_eq!(cli.command, Commands::Scan);
        assert!(!cli.json);
    }

    #[test]
    fn test_parse_grant_with_server() {
        let cli = Cli::try_parse_from([
            "blescan",
            "--server",
            "http://pi.local:3000",
            "grant",
            "location",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.server, "http://pi.local:3000");
        assert!(cli.json);
        assert_eq!(
            cli.command,
            Commands::Grant {
                permission: "location".into()
            }
        );
    }

    #[test]
    fn test_grant_requires_name() {
        assert!(Cli::try_parse_from(["blescan", "grant"]).is_err());
    }
}
