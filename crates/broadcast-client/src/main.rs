//! acc-broadcast - ACC broadcasting protocol client
//!
//! Registers with the simulation's broadcasting interface, prints protocol
//! notifications as they arrive and dumps the entry list on Ctrl-C.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod output;

use std::net::SocketAddr;
use std::path::PathBuf;

use acc_broadcast_client::{ClientConfig, ClientError, spawn};
use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "acc-broadcast")]
#[command(about = "Connect to the ACC broadcasting interface and follow the entry list")]
#[command(version)]
struct Cli {
    /// Client config file (.json, .yaml or .yml)
    #[arg(short, long, env = "ACC_BROADCAST_CONFIG")]
    config: Option<PathBuf>,

    /// The simulation's broadcasting.json, used for port and passwords
    #[arg(long, env = "ACC_BROADCAST_JSON_PATH")]
    broadcasting_json: Option<PathBuf>,

    /// Broadcasting endpoint of the simulation
    #[arg(long, env = "ACC_BROADCAST_SERVER")]
    server: Option<SocketAddr>,

    #[arg(long, env = "ACC_BROADCAST_DISPLAY_NAME")]
    display_name: Option<String>,

    #[arg(long, env = "ACC_BROADCAST_CONNECTION_PASSWORD", hide_env_values = true)]
    connection_password: Option<String>,

    #[arg(long, env = "ACC_BROADCAST_COMMAND_PASSWORD", hide_env_values = true)]
    command_password: Option<String>,

    /// Realtime update interval in milliseconds
    #[arg(long, env = "ACC_BROADCAST_INTERVAL_MS")]
    interval_ms: Option<i32>,

    /// Also request track data after registering
    #[arg(long)]
    track_data: bool,

    /// Output in JSON format for machine parsing
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "acc_broadcast={0},acc_broadcast_client={0},acc_broadcast_protocol={0}",
                    log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(&cli).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let exit_code = e
                .downcast_ref::<ClientError>()
                .map(ClientError::exit_code)
                .unwrap_or(1);
            std::process::exit(exit_code);
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli).await?;
    info!(
        server = %config.server_address,
        display_name = %config.display_name,
        "Starting broadcasting client"
    );

    let mut handle = spawn(config).await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                break;
            }
            event = handle.recv() => match event {
                Some(event) => output::print_event(&event, cli.json),
                None => break,
            },
        }
    }

    let session = handle.shutdown().await?;
    output::print_entry_list(session.entry_list(), cli.json);
    Ok(())
}

/// Config file, then broadcasting.json, then flags.
async fn resolve_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path).await?,
        None => ClientConfig::default(),
    };

    if let Some(path) = &cli.broadcasting_json {
        config.apply_broadcasting_json_file(path).await?;
    }

    if let Some(server) = cli.server {
        config.server_address = server;
    }
    if let Some(name) = &cli.display_name {
        config.display_name = name.clone();
    }
    if let Some(password) = &cli.connection_password {
        config.connection_password = password.clone();
    }
    if let Some(password) = &cli.command_password {
        config.command_password = password.clone();
    }
    if let Some(interval) = cli.interval_ms {
        config.update_interval_ms = interval;
    }
    if cli.track_data {
        config.request_track_data = true;
    }

    config.validate()?;
    Ok(config)
}
