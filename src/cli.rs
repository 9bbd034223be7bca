//! Command-line interface for the node connection provider.
//!
//! # Commands
//!
//! - `classify <url>`: Show which transport a URL selects (no network I/O)
//! - `check`: Connect and fetch the latest block number
//! - `block [tag]`: Fetch header info of a block
//! - `call <method> [params]`: Issue an arbitrary JSON-RPC call
//! - `watch`: Keep the connection open and report its state
//!
//! The node URL comes from `--url` or the `NODE_RPC_URL` environment variable.
//!
//! # Example
//!
//! ```bash
//! eth-node-provider classify wss://eth-mainnet.g.alchemy.com/v2/KEY
//! NODE_RPC_URL=http://localhost:8545 eth-node-provider check
//! eth-node-provider --url ws://localhost:8546 call eth_chainId
//! ```

use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Result, WrapErr};
use serde_json::Value;
use tracing::{info, warn};

use crate::block::fetch_block_info;
use crate::config::Config;
use crate::error::ProviderError;
use crate::rpc::selector::redacted_host;
use crate::rpc::{get_latest_block, ConnectionState, RpcHandle, Transport, TransportKind};

/// Resilient Ethereum node connection provider
#[derive(Parser, Debug)]
#[command(name = "eth-node-provider")]
#[command(about = "Connect to Ethereum JSON-RPC nodes over HTTP or WebSocket", long_about = None)]
#[command(version)]
struct Cli {
    /// Node URL (overrides NODE_RPC_URL)
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Show which transport a URL selects
    Classify {
        /// URL to classify
        url: String,
    },

    /// Connect and fetch the latest block number
    Check,

    /// Fetch header info of a block
    Block {
        /// Block tag or hex number (default: latest)
        #[arg(default_value = "latest")]
        tag: String,
    },

    /// Issue an arbitrary JSON-RPC call
    Call {
        /// Method name, e.g. eth_chainId
        method: String,

        /// Parameters as a JSON array (default: [])
        #[arg(default_value = "[]")]
        params: String,
    },

    /// Keep the connection open and report its state
    Watch {
        /// Seconds between block number probes
        #[arg(short, long, default_value = "12")]
        interval: u64,
    },
}

/// Parse CLI arguments and execute the appropriate command.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration loading fails
/// - The connection cannot be established
/// - The command's RPC call fails
///
/// Each [`ProviderError`] is wrapped with the step that failed; the root
/// cause stays reachable through `downcast_ref`.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Classify { url } = &cli.command {
        return run_classify_command(url);
    }

    let config = match cli.url {
        Some(url) => Config::from_url(url).wrap_err("invalid --url")?,
        None => Config::from_env().wrap_err("failed to load configuration")?,
    };
    let handle = RpcHandle::connect(config.rpc_url(), config.provider())
        .await
        .wrap_err_with(|| format!("failed to connect to {}", redacted_host(config.rpc_url())))?;

    match cli.command {
        Commands::Classify { .. } => Ok(()),
        Commands::Check => run_check_command(&handle).await,
        Commands::Block { tag } => run_block_command(&handle, &tag).await,
        Commands::Call { method, params } => run_call_command(&handle, &method, &params).await,
        Commands::Watch { interval } => run_watch_command(&handle, interval).await,
    }
}

fn run_classify_command(url: &str) -> Result<()> {
    let kind = TransportKind::classify(url)?;
    let label = match kind {
        TransportKind::Http => "HTTP (retry + rate-limit backoff)",
        TransportKind::WebSocket => "WebSocket (automatic reconnection)",
    };
    println!("{} {}", "Transport:".bold(), label.green());
    Ok(())
}

async fn run_check_command(handle: &RpcHandle) -> Result<()> {
    let block = get_latest_block(handle)
        .await
        .wrap_err("connection check failed")?;
    println!(
        "{} {} via {}",
        "✓".green().bold(),
        format!("block #{block}").bold(),
        handle.kind().to_string().cyan()
    );
    Ok(())
}

async fn run_block_command(handle: &RpcHandle, tag: &str) -> Result<()> {
    let info = fetch_block_info(handle, tag)
        .await
        .wrap_err_with(|| format!("failed to fetch block {tag}"))?;
    println!("{}", format!("Block #{}", info.number).bold());
    println!("  {} {}", "hash:".dimmed(), info.hash);
    println!("  {} {}", "parent:".dimmed(), info.parent_hash);
    println!("  {} {}", "timestamp:".dimmed(), info.timestamp);
    Ok(())
}

async fn run_call_command(handle: &RpcHandle, method: &str, params: &str) -> Result<()> {
    let params: Value = serde_json::from_str(params).wrap_err("params must be valid JSON")?;

    let result = handle
        .request(method, params)
        .await
        .wrap_err_with(|| format!("{method} failed"))?;
    let rendered = serde_json::to_string_pretty(&result).wrap_err("failed to render result")?;
    println!("{rendered}");
    Ok(())
}

async fn run_watch_command(handle: &RpcHandle, interval: u64) -> Result<()> {
    info!(interval, transport = %handle.kind(), "Watching connection");
    println!(
        "{}",
        format!("Watching {} connection (Ctrl-C to stop)", handle.kind()).bold()
    );

    let mut states = match handle.transport() {
        Transport::WebSocket(ws) => Some(ws.subscribe_state()),
        Transport::Http(_) => None,
    };
    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "Stopped".yellow());
                return Ok(());
            }
            changed = next_state(&mut states) => match changed {
                Some(state) => print_state(state),
                None => return Err(ProviderError::disconnected("WebSocket control task has stopped").into()),
            },
            _ = ticker.tick() => match get_latest_block(handle).await {
                Ok(block) => println!("{} block #{}", "•".cyan(), block),
                Err(e) => {
                    warn!(error = %e, "Block probe failed");
                    println!("{} {}", "✗".red().bold(), e);
                }
            },
        }
    }
}

/// Next state transition; pending forever for transports without states.
async fn next_state(
    states: &mut Option<tokio::sync::watch::Receiver<ConnectionState>>,
) -> Option<ConnectionState> {
    match states {
        Some(rx) => {
            rx.changed().await.ok()?;
            let state = *rx.borrow_and_update();
            Some(state)
        }
        None => std::future::pending().await,
    }
}

fn print_state(state: ConnectionState) {
    let label = match state {
        ConnectionState::Connected => state.to_string().green().bold(),
        ConnectionState::Connecting => state.to_string().yellow().bold(),
        ConnectionState::Closed => state.to_string().red().bold(),
    };
    println!("{} {}", "state:".dimmed(), label);
}
