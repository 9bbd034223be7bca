//! Transport selection from the connection URL scheme.

use std::fmt;

use crate::error::{ProviderError, ProviderResult};

/// Transport family a connection URL resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Request/response over HTTP(S)
    Http,
    /// Persistent session over WS(S)
    WebSocket,
}

impl TransportKind {
    /// Classify a connection URL by its scheme prefix.
    ///
    /// Matching is a case-sensitive prefix check: anything starting with
    /// `http` is HTTP, anything starting with `ws` is WebSocket. No I/O is
    /// performed.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UnsupportedTransport`] when the URL is empty,
    /// blank, or starts with neither prefix.
    ///
    /// # Example
    ///
    /// ```
    /// use eth_node_provider::rpc::TransportKind;
    ///
    /// assert_eq!(TransportKind::classify("https://node").ok(), Some(TransportKind::Http));
    /// assert_eq!(TransportKind::classify("wss://node").ok(), Some(TransportKind::WebSocket));
    /// assert!(TransportKind::classify("   ").is_err());
    /// ```
    pub fn classify(url: &str) -> ProviderResult<Self> {
        if url.trim().is_empty() {
            return Err(ProviderError::unsupported_transport(url));
        }

        if url.starts_with("http") {
            Ok(Self::Http)
        } else if url.starts_with("ws") {
            Ok(Self::WebSocket)
        } else {
            Err(ProviderError::unsupported_transport(url))
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::WebSocket => write!(f, "websocket"),
        }
    }
}

/// Host portion of a URL, safe to log.
///
/// Paths and query strings frequently embed provider API keys, and the
/// authority may carry `user:password@`, so only the scheme and host are kept.
pub(crate) fn redacted_host(url: &str) -> String {
    let (scheme, rest) = url.find("://").map_or(("", url), |i| url.split_at(i + 3));
    let authority = rest.find(['/', '?', '#']).map_or(rest, |i| &rest[..i]);
    let host = authority.rfind('@').map_or(authority, |i| &authority[i + 1..]);
    format!("{scheme}{host}")
}
