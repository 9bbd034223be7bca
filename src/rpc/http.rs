//! HTTP transport with the retry/rate-limit interceptor.
//!
//! Every request goes through a [`RetryRateLimitInterceptor`]:
//!
//! | Failure | Handling |
//! |---|---|
//! | connect error, timeout, reset | retried |
//! | HTTP 429 / 503 | retried, `Retry-After` honored |
//! | HTTP 502 / 504 | retried |
//! | any other non-2xx status | surfaced immediately |
//! | body that is not a JSON-RPC response | surfaced immediately |
//!
//! ## Example
//!
//! ```no_run
//! use eth_node_provider::rpc::http::HttpTransport;
//! use eth_node_provider::rpc::{JsonRpcRequest, RetryConfig};
//! use eth_node_provider::error::ProviderResult;
//! use std::time::Duration;
//!
//! # async fn example() -> ProviderResult<()> {
//! let transport = HttpTransport::new(
//!     "https://eth-mainnet.g.alchemy.com/v2/API_KEY",
//!     RetryConfig::default(),
//!     Duration::from_secs(30),
//! )?;
//! let response = transport
//!     .send(&JsonRpcRequest::new(1, "eth_blockNumber", serde_json::json!([])))
//!     .await?;
//! println!("{:?}", response.result);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::RETRY_AFTER;
use tracing::{debug, instrument};

use super::request::{JsonRpcRequest, JsonRpcResponse};
use super::retry::{
    is_transient_status, parse_retry_after, AttemptError, RetryConfig, RetryRateLimitInterceptor,
};
use super::selector::redacted_host;
use crate::error::{ProviderError, ProviderResult};

/// Longest error body echoed into a [`ProviderError::Request`].
const MAX_ERROR_BODY: usize = 256;

/// HTTP JSON-RPC transport.
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
    interceptor: RetryRateLimitInterceptor,
}

impl HttpTransport {
    /// Create a transport for `url`.
    ///
    /// No request is sent; the node is first contacted by [`Self::send`].
    ///
    /// # Arguments
    ///
    /// * `url` - The HTTP(S) endpoint of the node
    /// * `retry` - Retry budget and backoff applied to each request
    /// * `request_timeout` - Timeout of a single attempt
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::TransportConnect`] if the HTTP client cannot
    /// be built (e.g. TLS backend initialization failure).
    pub fn new(
        url: impl Into<String>,
        retry: RetryConfig,
        request_timeout: Duration,
    ) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                ProviderError::transport_connect("Failed to build HTTP client", Some(Box::new(e)))
            })?;

        Ok(Self {
            url: url.into(),
            client,
            interceptor: RetryRateLimitInterceptor::new(retry),
        })
    }

    /// Send a request, retrying transient failures.
    ///
    /// # Errors
    ///
    /// - [`ProviderError::TransientRequest`] when the retry budget ran out.
    /// - [`ProviderError::Request`] for non-transient failures.
    #[instrument(skip_all, fields(method = %request.method, id = request.id))]
    pub async fn send(&self, request: &JsonRpcRequest) -> ProviderResult<JsonRpcResponse> {
        self.interceptor
            .execute(|attempt| self.send_once(request, attempt))
            .await
    }

    async fn send_once(
        &self,
        request: &JsonRpcRequest,
        attempt: u32,
    ) -> Result<JsonRpcResponse, AttemptError> {
        debug!(attempt, "Sending HTTP request");

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| parse_retry_after(value, Utc::now()));

            if is_transient_status(status) {
                return Err(AttemptError::transient(
                    format!("HTTP {status}"),
                    retry_after,
                    None,
                ));
            }

            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::request(Some(status), truncate(&body)).into());
        }

        let body = response.bytes().await.map_err(classify_send_error)?;
        serde_json::from_slice::<JsonRpcResponse>(&body).map_err(|e| {
            ProviderError::request(
                Some(status),
                format!("malformed JSON-RPC response: {e}"),
            )
            .into()
        })
    }

    /// The HTTP URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The interceptor applied to every request.
    #[must_use]
    pub const fn interceptor(&self) -> &RetryRateLimitInterceptor {
        &self.interceptor
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("host", &redacted_host(&self.url))
            .field("interceptor", &self.interceptor)
            .finish_non_exhaustive()
    }
}

/// Split `reqwest` failures into retryable network errors and the rest.
fn classify_send_error(err: reqwest::Error) -> AttemptError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        AttemptError::transient(err.to_string(), None, Some(Box::new(err)))
    } else {
        AttemptError::Fatal(ProviderError::request(
            err.status().map(|s| s.as_u16()),
            err.to_string(),
        ))
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}
