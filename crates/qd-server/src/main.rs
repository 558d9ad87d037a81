//! qdsshd: passwordless SSH daemon
//!
//! Accepts every connection on port 2200 and serves shells and one-shot
//! commands on `session` channels.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::OsRng;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qd_core::config;
use qd_server::keys;
use qd_server::server::SshServer;
use qd_server::ChannelDispatcher;

#[derive(Parser)]
#[command(name = "qdsshd")]
#[command(about = "Passwordless SSH daemon serving shells and commands")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the configuration file)
    #[arg(short, long)]
    bind: Option<String>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground {
        "debug"
    } else {
        &args.log_level
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("qdsshd starting...");

    // Load configuration
    let default_path = config::default_config_path();
    let mut config = config::load_server_config(args.config.as_deref(), &default_path)
        .with_context(|| {
            let path = args.config.as_deref().unwrap_or(&default_path);
            format!("Failed to load config from {:?}", path)
        })?;

    // Apply command-line overrides
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }

    let host_key = keys::load_or_generate_host_key(config.host_key_path.as_deref(), &mut OsRng)?;
    tracing::info!("Host key fingerprint: {}", keys::fingerprint(&host_key)?);

    let cancel = CancellationToken::new();

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    let dispatcher = ChannelDispatcher::new(config.session);
    let server = SshServer::new(host_key, dispatcher, cancel);
    server
        .run(&config.bind_address)
        .await
        .context("SSH server failed")?;

    tracing::info!("qdsshd stopped");
    Ok(())
}
