//! Error types for the node connection provider.
//!
//! This module provides a unified error type [`ProviderError`] covering every
//! failure the provider can report, from URL classification through transport
//! construction to individual RPC calls.
//!
//! # Design
//!
//! Errors fall into two groups:
//!
//! - **Construction-time** ([`ProviderError::is_fatal`]): the handle could not
//!   be built at all. [`ProviderError::UnsupportedTransport`] and
//!   [`ProviderError::TransportConnect`] belong here and are never retried.
//! - **Per-call**: everything else. These are reported for a single request
//!   and never tear down the handle.
//!
//! # Example
//!
//! ```
//! use eth_node_provider::error::{ProviderError, ProviderResult};
//!
//! fn require_url(url: &str) -> ProviderResult<()> {
//!     if url.trim().is_empty() {
//!         return Err(ProviderError::unsupported_transport(url));
//!     }
//!     Ok(())
//! }
//! # assert!(require_url("").is_err());
//! ```

use std::fmt;

/// Boxed error source carried by several variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias using [`ProviderError`].
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Unified error type for the node connection provider.
#[derive(Debug)]
pub enum ProviderError {
    /// The connection URL does not start with a supported scheme.
    ///
    /// Raised for empty, blank and unrecognized URLs alike.
    UnsupportedTransport {
        /// The offending URL, verbatim
        url: String,
    },

    /// The transport could not be established at construction time.
    ///
    /// For WebSocket this is the very first connect attempt; the provider
    /// never retries it.
    TransportConnect {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// A transient HTTP failure persisted through the whole retry budget.
    TransientRequest {
        /// Total attempts made, including the first
        attempts: u32,
        /// Description of the last failure
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// A non-transient HTTP failure (client error, malformed response).
    Request {
        /// HTTP status, if a response was received
        status: Option<u16>,
        /// Human-readable error message
        message: String,
    },

    /// The WebSocket session is down for this call.
    ///
    /// The session is being re-established in the background; later calls
    /// may succeed.
    Disconnected {
        /// Human-readable error message
        message: String,
    },

    /// A finite reconnect policy ran out of attempts.
    ReconnectExhausted {
        /// Number of reconnect attempts made
        attempts: u32,
    },

    /// The node answered with a JSON-RPC error object.
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// JSON-RPC error message
        message: String,
    },

    /// Configuration or environment variable errors.
    Config {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// A result returned by the node did not have the expected shape.
    Decoding {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// The requested block is not part of the canonical chain yet.
    ///
    /// Pending blocks carry neither a number nor a hash.
    BlockNotIncluded {
        /// Block tag or number that was requested
        block: String,
    },
}

impl ProviderError {
    /// Create an unsupported transport error for `url`.
    ///
    /// # Example
    ///
    /// ```
    /// use eth_node_provider::error::ProviderError;
    ///
    /// let err = ProviderError::unsupported_transport("ftp://node");
    /// assert!(matches!(err, ProviderError::UnsupportedTransport { .. }));
    /// ```
    #[must_use]
    pub fn unsupported_transport(url: impl Into<String>) -> Self {
        Self::UnsupportedTransport { url: url.into() }
    }

    /// Create a transport connect error.
    ///
    /// # Example
    ///
    /// ```
    /// use eth_node_provider::error::ProviderError;
    ///
    /// let err = ProviderError::transport_connect("Connection refused", None);
    /// assert!(err.is_fatal());
    /// ```
    #[must_use]
    pub fn transport_connect(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::TransportConnect {
            message: message.into(),
            source,
        }
    }

    /// Create an exhausted transient request error.
    #[must_use]
    pub fn transient_request(
        attempts: u32,
        message: impl Into<String>,
        source: Option<BoxError>,
    ) -> Self {
        Self::TransientRequest {
            attempts,
            message: message.into(),
            source,
        }
    }

    /// Create a non-transient request error.
    ///
    /// # Example
    ///
    /// ```
    /// use eth_node_provider::error::ProviderError;
    ///
    /// let err = ProviderError::request(Some(400), "bad request");
    /// assert_eq!(err.to_string(), "Request failed (HTTP 400): bad request");
    /// ```
    #[must_use]
    pub fn request(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Request {
            status,
            message: message.into(),
        }
    }

    /// Create a disconnected error.
    #[must_use]
    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::Disconnected {
            message: message.into(),
        }
    }

    /// Create a JSON-RPC error.
    #[must_use]
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use eth_node_provider::error::ProviderError;
    ///
    /// let err = ProviderError::config("NODE_RPC_URL not set", None);
    /// assert!(matches!(err, ProviderError::Config { .. }));
    /// ```
    #[must_use]
    pub fn config(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::Config {
            message: message.into(),
            source,
        }
    }

    /// Create a new decoding error.
    #[must_use]
    pub fn decoding(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::Decoding {
            message: message.into(),
            source,
        }
    }

    /// Create a block-not-included error.
    #[must_use]
    pub fn block_not_included(block: impl Into<String>) -> Self {
        Self::BlockNotIncluded {
            block: block.into(),
        }
    }

    /// Returns `true` for errors raised while building the handle.
    ///
    /// Callers typically abort startup on these rather than retry.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedTransport { .. } | Self::TransportConnect { .. }
        )
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedTransport { url } => {
                write!(f, "Unsupported transport scheme: '{url}'")
            }
            Self::TransportConnect { message, .. } => {
                write!(f, "Transport connect error: {message}")
            }
            Self::TransientRequest {
                attempts, message, ..
            } => write!(f, "Request failed after {attempts} attempts: {message}"),
            Self::Request {
                status: Some(status),
                message,
            } => write!(f, "Request failed (HTTP {status}): {message}"),
            Self::Request {
                status: None,
                message,
            } => write!(f, "Request failed: {message}"),
            Self::Disconnected { message } => write!(f, "WebSocket disconnected: {message}"),
            Self::ReconnectExhausted { attempts } => {
                write!(f, "WebSocket reconnection gave up after {attempts} attempts")
            }
            Self::Rpc { code, message } => write!(f, "RPC error {code}: {message}"),
            Self::Config { message, .. } => write!(f, "Configuration error: {message}"),
            Self::Decoding { message, .. } => write!(f, "Decoding error: {message}"),
            Self::BlockNotIncluded { block } => {
                write!(f, "Block {block} is not included in the chain")
            }
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TransportConnect { source, .. }
            | Self::TransientRequest { source, .. }
            | Self::Config { source, .. }
            | Self::Decoding { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
            Self::UnsupportedTransport { .. }
            | Self::Request { .. }
            | Self::Disconnected { .. }
            | Self::ReconnectExhausted { .. }
            | Self::Rpc { .. }
            | Self::BlockNotIncluded { .. } => None,
        }
    }
}
