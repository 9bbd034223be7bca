//! CLI entry point for the node connection provider.
//!
//! ```text
//! main.rs (Runtime + tracing initialization)
//!     ↓
//! CLI Layer (src/cli.rs)
//!     ↓
//! 1. Config Layer (src/config.rs)  → Load environment variables
//! 2. RPC Layer (src/rpc/)          → Select transport, connect
//! 3. CLI Layer (output)            → Display formatted results
//! ```
//!
//! Library errors (`ProviderError`) bubble up to the CLI, which wraps them
//! with `eyre` context before they are reported here.

use eth_node_provider::{cli, observability};
use tracing::error;

/// Entry point.
///
/// Logging is controlled by `RUST_LOG`, `LOG_JSON` and `LOG_FILE`.
#[tokio::main]
async fn main() {
    let log_level = std::env::var("RUST_LOG").ok();
    let log_file = std::env::var("LOG_FILE").ok().map(std::path::PathBuf::from);
    let json_output = std::env::var("LOG_JSON")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    // Dropping the guard flushes the file writer, so it lives until exit.
    let guard = match observability::init_tracing(log_level, log_file, json_output) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = cli::run().await {
        error!(error = %e, "Application error");
        eprintln!("Error: {e:#}");
        drop(guard);
        std::process::exit(1);
    }
}
