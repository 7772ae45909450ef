//! presence: command-line client for a presence server.
//!
//! Shows who is online, sends direct messages, and listens for incoming
//! messages and roster changes.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// presence: presence and direct-message client
#[derive(Parser)]
#[command(name = "presence", version, about = "Presence client: who is online, direct messages")]
struct Cli {
    /// Server URL (ws:// or wss://)
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Config file path
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the users currently online
    Roster,

    /// Send one direct message
    Send {
        /// Sender user id
        #[arg(long)]
        from: Option<String>,
        /// Recipient user id
        #[arg(long)]
        to: String,
        /// Message text
        text: String,
    },

    /// Stay online and print incoming messages and roster changes
    Listen {
        /// User id to announce
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "presence=debug,presence_cli=debug,presence_client=debug"
    } else {
        "presence=warn,presence_cli=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(cli.verbose)
        .init();

    let config_path = cli.config.clone().map(PathBuf::from).unwrap_or_else(|| {
        let home = dirs::home_dir().unwrap_or_default();
        home.join(".presence").join("config.toml")
    });
    let cfg = match config::Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("presence: {e:#}");
            std::process::exit(1);
        }
    };

    let url = cli.url.clone().unwrap_or_else(|| cfg.default.url.clone());

    let result = match cli.command {
        Command::Roster => commands::roster::run(&url).await,
        Command::Send { from, to, text } => match cfg.resolve_user(from.as_deref()) {
            Ok(from) => commands::send::run(&url, &from, &to, &text).await,
            Err(e) => Err(e),
        },
        Command::Listen { user } => match cfg.resolve_user(user.as_deref()) {
            Ok(user) => commands::listen::run(&url, &user).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("presence: {e:#}");
        std::process::exit(1);
    }
}
