//! RPC connection management for Ethereum nodes.
//!
//! A single entry point, [`RpcHandle::connect`], turns a connection URL into a
//! ready-to-use handle. The URL scheme decides the transport; each transport
//! carries its own failure-recovery strategy.
//!
//! # Architecture
//!
//! ```text
//!          connection URL
//!                │
//!        ┌───────▼────────┐
//!        │ TransportKind  │  (scheme prefix, no I/O)
//!        └───┬────────┬───┘
//!     http*  │        │  ws*
//!    ┌───────▼───┐ ┌──▼──────────┐
//!    │   HTTP    │ │  WebSocket  │
//!    │ + retry / │ │ + reconnect │
//!    │ rate limit│ │   loop      │
//!    └───────────┘ └─────────────┘
//! ```
//!
//! - **HTTP** ([`http`]): bounded retries on transient failures and rate
//!   limits, fail fast on everything else.
//! - **WebSocket** ([`websocket`]): the first connect must succeed; after
//!   that, dropped sessions are re-established in the background.
//!
//! # Usage
//!
//! ```no_run
//! use eth_node_provider::rpc::{create_provider, get_latest_block};
//! use eth_node_provider::error::ProviderResult;
//!
//! # async fn example() -> ProviderResult<()> {
//! let handle = create_provider("wss://eth-mainnet.g.alchemy.com/v2/KEY").await?;
//! let block = get_latest_block(&handle).await?;
//! println!("Latest block: {block}");
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod request;
pub mod retry;
pub mod selector;
pub mod websocket;

use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::U64;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};

pub use http::HttpTransport;
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use retry::{RetryConfig, RetryPolicy, RetryRateLimitInterceptor};
pub use selector::TransportKind;
pub use websocket::{ConnectionState, ReconnectPolicy, WsTransport};

/// Transport currently backing an [`RpcHandle`].
#[derive(Debug)]
pub enum Transport {
    /// Request/response with retry interceptor
    Http(HttpTransport),
    /// Persistent session with reconnection loop
    WebSocket(WsTransport),
}

/// Handle through which RPC calls reach the node.
///
/// Owned by the caller. For WebSocket, dropping the handle also stops the
/// background reconnection loop.
#[derive(Debug)]
pub struct RpcHandle {
    transport: Transport,
    next_id: AtomicU64,
}

impl RpcHandle {
    /// Classify `url`, build the matching transport and return the handle.
    ///
    /// For WebSocket the first connection is opened before returning.
    ///
    /// # Errors
    ///
    /// - [`ProviderError::UnsupportedTransport`] for empty, blank or
    ///   unknown-scheme URLs.
    /// - [`ProviderError::TransportConnect`] when the first WebSocket
    ///   connection fails or the HTTP client cannot be built.
    #[instrument(skip_all, fields(rpc_host = tracing::field::Empty, transport = tracing::field::Empty))]
    pub async fn connect(url: &str, config: &ProviderConfig) -> ProviderResult<Self> {
        let kind = TransportKind::classify(url)?;

        let span = tracing::Span::current();
        span.record("rpc_host", selector::redacted_host(url).as_str());
        span.record("transport", tracing::field::display(kind));
        info!("Initializing RPC provider");

        let transport = match kind {
            TransportKind::Http => Transport::Http(HttpTransport::new(
                url,
                config.retry.clone(),
                config.request_timeout,
            )?),
            TransportKind::WebSocket => Transport::WebSocket(
                WsTransport::connect(url.to_string(), config.reconnect.clone()).await?,
            ),
        };

        info!("RPC provider initialized successfully");
        Ok(Self::from_transport(transport))
    }

    /// Wrap an already-built transport.
    #[must_use]
    pub const fn from_transport(transport: Transport) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
        }
    }

    /// Which transport family backs this handle.
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        match self.transport {
            Transport::Http(_) => TransportKind::Http,
            Transport::WebSocket(_) => TransportKind::WebSocket,
        }
    }

    /// The underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &Transport {
        &self.transport
    }

    /// The connection URL.
    #[must_use]
    pub fn url(&self) -> &str {
        match &self.transport {
            Transport::Http(t) => t.url(),
            Transport::WebSocket(t) => t.url(),
        }
    }

    /// Send a raw JSON-RPC request.
    ///
    /// # Errors
    ///
    /// Transport-level failures; JSON-RPC error objects are returned inside
    /// the response, not as errors.
    pub async fn send(&self, request: JsonRpcRequest) -> ProviderResult<JsonRpcResponse> {
        match &self.transport {
            Transport::Http(t) => t.send(&request).await,
            Transport::WebSocket(t) => t.send(request).await,
        }
    }

    /// Call `method` with `params` and return the `result` value.
    ///
    /// # Errors
    ///
    /// Transport-level failures, or [`ProviderError::Rpc`] when the node
    /// answered with an error object.
    pub async fn request(&self, method: &str, params: Value) -> ProviderResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "Issuing RPC request");
        self.send(JsonRpcRequest::new(id, method, params))
            .await?
            .into_result()
    }
}

/// Connect to `url` with the default [`ProviderConfig`].
///
/// # Errors
///
/// See [`RpcHandle::connect`].
///
/// # Example
///
/// ```no_run
/// use eth_node_provider::rpc::create_provider;
/// use eth_node_provider::error::ProviderResult;
///
/// # async fn example() -> ProviderResult<()> {
/// let handle = create_provider("http://localhost:8545").await?;
/// # Ok(())
/// # }
/// ```
pub async fn create_provider(url: &str) -> ProviderResult<RpcHandle> {
    RpcHandle::connect(url, &ProviderConfig::default()).await
}

/// Get the latest block number from the node.
///
/// # Errors
///
/// Returns an error if the request fails or the result is not a hex quantity.
#[instrument(skip(handle), fields(block = tracing::field::Empty, duration_ms = tracing::field::Empty))]
pub async fn get_latest_block(handle: &RpcHandle) -> ProviderResult<u64> {
    debug!("Fetching latest block number");

    let start = std::time::Instant::now();
    let result = handle.request("eth_blockNumber", Value::Array(vec![])).await?;
    let block = serde_json::from_value::<U64>(result)
        .map_err(|e| ProviderError::decoding("eth_blockNumber result is not a quantity", Some(Box::new(e))))?
        .to::<u64>();

    let duration = start.elapsed();
    tracing::Span::current().record("block", block);
    tracing::Span::current().record(
        "duration_ms",
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
    );
    info!(block, "Latest block fetched");

    Ok(block)
}

/// Check that the node answers by fetching the latest block number.
///
/// # Errors
///
/// Returns the failure of the underlying request.
#[instrument(skip(handle))]
pub async fn check_connection(handle: &RpcHandle) -> ProviderResult<()> {
    debug!("Checking provider connection health");

    match get_latest_block(handle).await {
        Ok(block) => {
            info!(block, "Connection check successful");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Connection check failed");
            Err(e)
        }
    }
}
