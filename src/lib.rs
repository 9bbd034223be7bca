//! # Ethereum Node Connection Provider
//!
//! Resilient JSON-RPC connections to Ethereum nodes using
//! [Alloy](https://github.com/alloy-rs/alloy) primitives.
//!
//! A connection URL selects the transport by its scheme, and each transport
//! comes with its own failure-recovery strategy:
//!
//! - **HTTP** (`http://`, `https://`): every request goes through a retry and
//!   rate-limit interceptor. Transient failures and `429`/`503` answers are
//!   retried a bounded number of times, honoring `Retry-After`.
//! - **WebSocket** (`ws://`, `wss://`): the first connect must succeed. After
//!   that a background task re-establishes dropped sessions, one attempt at a
//!   time, for as long as the [`rpc::ReconnectPolicy`] allows.
//!
//! ## Architecture
//!
//! 1. **Config Layer** ([`config`]) - Environment variable loading
//! 2. **RPC Layer** ([`rpc`]) - Transport selection, retry, reconnection
//! 3. **Block Layer** ([`block`]) - Header info decoding
//! 4. **CLI Layer** ([`cli`]) - Operator commands
//!
//! ## Using as a Library
//!
//! ```rust,no_run
//! use eth_node_provider::{config::Config, rpc::{get_latest_block, RpcHandle}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let handle = RpcHandle::connect(config.rpc_url(), config.provider()).await?;
//!
//!     let block = get_latest_block(&handle).await?;
//!     println!("Latest block: {block}");
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`error::ProviderResult<T>`](error::ProviderResult):
//!
//! ```rust
//! use eth_node_provider::error::{ProviderError, ProviderResult};
//!
//! fn example() -> ProviderResult<()> {
//!     Err(ProviderError::unsupported_transport("ipc:///tmp/geth.ipc"))
//! }
//!
//! assert!(example().is_err_and(|e| e.is_fatal()));
//! ```
//!
//! ## Testing
//!
//! ```bash
//! # All tests
//! cargo test
//!
//! # Integration tests (local mock servers, no node required)
//! cargo test --test '*'
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod block;
pub mod cli;
pub mod config;
pub mod error;
pub mod observability;
pub mod rpc;
