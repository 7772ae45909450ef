//! presence-server: real-time presence and direct-message server.
//!
//! Accepts WebSocket connections, tracks which user each connection belongs
//! to, broadcasts the roster on every membership change, and routes direct
//! messages between connected users.

mod config;
mod gateway;
mod presence;
mod server;
mod transport;

use clap::Parser;
use config::ServerConfig;
use server::PresenceServer;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// How long session loops get to close their sockets on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// presence-server: real-time presence and direct-message server
#[derive(Parser, Debug)]
#[command(name = "presence-server", version, about = "Real-time presence and direct-message server")]
struct Cli {
    /// Listen port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Bind address
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Config file path
    #[arg(long, default_value = "~/.presence/server.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    use tracing_subscriber::EnvFilter;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting presence-server");

    let config_path = PathBuf::from(&cli.config);
    let server_config = match ServerConfig::load(Some(&config_path), cli.port, cli.bind) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let server = Arc::new(PresenceServer::new(server_config));

    tokio::select! {
        result = server.clone().run() => {
            if let Err(e) = result {
                error!(error = %e, "server error");
                std::process::exit(1);
            }
        }
        _ = shutdown_signal() => {
            info!("received shutdown signal");
            server.shutdown();
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        }
    }

    info!("presence-server stopped");
}

/// Resolve on Ctrl+C, or on SIGTERM where the platform has it.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl+C only"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Ctrl+C handler unavailable");
        std::future::pending::<()>().await;
    }
}
