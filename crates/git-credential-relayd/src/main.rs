//! git-credential-relayd - Main entry point.
//!
//! Runs the relay in the foreground. Credential requests arriving on the
//! socket are shown on this terminal and must be approved here.
//!
//! # Usage
//!
//! ```bash
//! # On the machine that holds the credentials
//! git-credential-relayd
//!
//! # Forward the socket when connecting to the remote host
//! ssh -R /tmp/git-credential-relay.sock:$HOME/.cache/git-credential-relay/local.sock remote
//!
//! # On the remote host
//! git config --global credential.helper relay
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};

use git_credential_relay_core::config::REMOTE_SOCKET_PATH;
use git_credential_relay_core::Config;
use git_credential_relayd::{
    GitCredentialDelegate, ManualSocketProvider, Relay, TerminalTrustGate,
};

use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Relay forwarded git credential requests to the local credential helper,
/// with approval on this terminal.
#[derive(Parser)]
#[command(name = "git-credential-relayd")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file [default: ~/.config/git-credential-relay/config.toml]
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to Unix socket [default: ~/.cache/git-credential-relay/local.sock]
    #[arg(short, long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Increase log verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only show errors
    #[arg(short, long)]
    quiet: bool,
}

fn setup_logging(level: &str) {
    // RUST_LOG takes precedence over the CLI flags
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout stays free for the approval prompt
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn print_banner(socket_path: &std::path::Path) {
    println!("Listening for Git credential requests. Forward the socket with:");
    println!(
        "  ssh -R {}:{} ...",
        REMOTE_SOCKET_PATH,
        socket_path.display()
    );
    println!("Use ~C to forward the socket over an existing connection.");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine log level from CLI flags
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    setup_logging(log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting git-credential-relayd"
    );

    // Load configuration
    let config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration from specified path");
            Config::load_from(path).context("Failed to load configuration")?
        }
        None => {
            let config = Config::load().context("Failed to load configuration")?;
            if let Some(path) = Config::default_path() {
                if path.exists() {
                    info!(path = %path.display(), "Loaded configuration");
                } else {
                    debug!("No config file found, using defaults");
                }
            }
            config
        }
    };

    let socket_path = cli.socket.clone().unwrap_or_else(|| config.socket_path());
    let provider = ManualSocketProvider::new(&socket_path).with_backlog(config.socket.backlog);
    let delegate = GitCredentialDelegate::from_config(&config.delegate);

    run_relay(provider, delegate).await
}

/// Bind the socket, print forwarding instructions, and serve forever.
async fn run_relay(
    provider: ManualSocketProvider,
    delegate: GitCredentialDelegate,
) -> Result<()> {
    let relay = Relay::new(TerminalTrustGate::new(), delegate, provider);

    let listener = match relay.listen().await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = ?e, "Relay could not start");
            return Err(e);
        }
    };

    if let Some(path) = relay.socket_path() {
        print_banner(path);
    }

    relay.accept_loop(listener).await;
    Ok(())
}
