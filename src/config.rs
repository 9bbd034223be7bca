//! Configuration management for the node connection provider.
//!
//! This module handles loading and validating configuration from environment
//! variables using the `dotenvy` crate. All operations return
//! [`ProviderResult`] for comprehensive error handling.
//!
//! ## Environment Variables
//!
//! Required:
//! - `NODE_RPC_URL`: Node endpoint, `http(s)://...` or `ws(s)://...`
//!
//! Optional (with defaults):
//! - `HTTP_MAX_RETRIES`: Retries after the first HTTP attempt (default: 3)
//! - `HTTP_INITIAL_BACKOFF_MS`: First exponential backoff delay (default: 500)
//! - `HTTP_MAX_BACKOFF_MS`: Cap on any HTTP retry delay (default: 30000)
//! - `HTTP_TIMEOUT_SECS`: Timeout of a single HTTP attempt (default: 30)
//! - `WS_MAX_RECONNECTS`: Reconnect attempts per outage (default: unbounded)
//! - `WS_RECONNECT_DELAY_MS`: Wait before each reconnect attempt (default: 0)
//! - `RUST_LOG`: Logging level (default: "info")
//!
//! ## Example
//!
//! ```no_run
//! use eth_node_provider::config::Config;
//! use eth_node_provider::error::ProviderResult;
//!
//! # fn main() -> ProviderResult<()> {
//! let config = Config::from_env()?;
//! println!("RPC URL: {}", config.rpc_url());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ProviderError, ProviderResult};
use crate::rpc::{ReconnectPolicy, RetryConfig, TransportKind};

/// Transport tuning consumed by [`crate::rpc::RpcHandle::connect`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// HTTP retry budget and backoff.
    pub retry: RetryConfig,
    /// WebSocket reconnection policy.
    pub reconnect: ReconnectPolicy,
    /// Timeout of a single HTTP attempt.
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            reconnect: ReconnectPolicy::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Main configuration struct.
///
/// Contains all runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Node endpoint
    rpc_url: String,

    /// Transport tuning
    provider: ProviderConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This function:
    /// 1. Loads `.env` file using `dotenvy` (if present)
    /// 2. Reads and validates all environment variables
    /// 3. Applies defaults for optional variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `NODE_RPC_URL` is missing or uses an unsupported scheme
    /// - A numeric variable does not parse
    pub fn from_env() -> ProviderResult<Self> {
        // Load .env file if present (ignore error if file doesn't exist)
        dotenvy::dotenv().ok();

        let rpc_url = env::var("NODE_RPC_URL").map_err(|e| {
            ProviderError::config(
                "NODE_RPC_URL environment variable is required",
                Some(Box::new(e)),
            )
        })?;

        Self::from_url(rpc_url)
    }

    /// Build configuration for an explicit URL, reading the optional
    /// tuning variables from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL scheme is unsupported or a tuning
    /// variable does not parse.
    pub fn from_url(rpc_url: impl Into<String>) -> ProviderResult<Self> {
        let rpc_url = rpc_url.into();

        if let Err(e) = TransportKind::classify(&rpc_url) {
            return Err(ProviderError::config(
                "NODE_RPC_URL must start with http(s):// or ws(s)://",
                Some(Box::new(e)),
            ));
        }

        let defaults = ProviderConfig::default();

        let retry = RetryConfig {
            max_retries: env_or("HTTP_MAX_RETRIES", defaults.retry.max_retries)?,
            initial_backoff: Duration::from_millis(env_or(
                "HTTP_INITIAL_BACKOFF_MS",
                millis(defaults.retry.initial_backoff),
            )?),
            max_backoff: Duration::from_millis(env_or(
                "HTTP_MAX_BACKOFF_MS",
                millis(defaults.retry.max_backoff),
            )?),
            ..defaults.retry
        };

        let request_timeout = Duration::from_secs(env_or(
            "HTTP_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        )?);

        let reconnect = ReconnectPolicy {
            max_attempts: env_opt("WS_MAX_RECONNECTS")?,
            delay: Duration::from_millis(env_or(
                "WS_RECONNECT_DELAY_MS",
                millis(defaults.reconnect.delay),
            )?),
        };

        Ok(Self {
            rpc_url,
            provider: ProviderConfig {
                retry,
                reconnect,
                request_timeout,
            },
        })
    }

    /// Get the node URL.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Get the transport tuning.
    #[must_use]
    pub const fn provider(&self) -> &ProviderConfig {
        &self.provider
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Parse an optional variable, falling back to `default` when unset.
fn env_or<T>(name: &str, default: T) -> ProviderResult<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(env_opt(name)?.unwrap_or(default))
}

/// Parse an optional variable; unset or empty yields `None`.
fn env_opt<T>(name: &str) -> ProviderResult<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map(Some).map_err(|e| {
            ProviderError::config(format!("{name} must be a valid number"), Some(Box::new(e)))
        }),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests in this module mutate process-wide environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 7] = [
        "NODE_RPC_URL",
        "HTTP_MAX_RETRIES",
        "HTTP_INITIAL_BACKOFF_MS",
        "HTTP_MAX_BACKOFF_MS",
        "HTTP_TIMEOUT_SECS",
        "WS_MAX_RECONNECTS",
        "WS_RECONNECT_DELAY_MS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_config_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();

        let config = Config::from_url("wss://node.example/ws");
        assert!(config.is_ok());

        if let Ok(config) = config {
            assert_eq!(config.rpc_url(), "wss://node.example/ws");
            assert_eq!(config.provider(), &ProviderConfig::default());
            assert_eq!(config.provider().reconnect.max_attempts, None);
        }
    }

    #[test]
    fn test_config_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();

        env::set_var("HTTP_MAX_RETRIES", "5");
        env::set_var("HTTP_INITIAL_BACKOFF_MS", "250");
        env::set_var("HTTP_MAX_BACKOFF_MS", "4000");
        env::set_var("HTTP_TIMEOUT_SECS", "10");
        env::set_var("WS_MAX_RECONNECTS", "8");
        env::set_var("WS_RECONNECT_DELAY_MS", "100");

        let config = Config::from_url("https://node.example");
        clear_env();

        assert!(config.is_ok());
        if let Ok(config) = config {
            let provider = config.provider();
            assert_eq!(provider.retry.max_retries, 5);
            assert_eq!(provider.retry.initial_backoff, Duration::from_millis(250));
            assert_eq!(provider.retry.max_backoff, Duration::from_millis(4000));
            assert_eq!(provider.request_timeout, Duration::from_secs(10));
            assert_eq!(
                provider.reconnect,
                ReconnectPolicy::bounded(8, Duration::from_millis(100))
            );
        }
    }

    #[test]
    fn test_config_rejects_unsupported_scheme() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();

        let result = Config::from_url("ipc:///tmp/geth.ipc");
        assert!(matches!(result, Err(ProviderError::Config { .. })));
    }

    #[test]
    fn test_config_rejects_invalid_number() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();

        env::set_var("HTTP_MAX_RETRIES", "many");
        let result = Config::from_url("http://localhost:8545");
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    fn test_config_requires_url() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();

        // A developer .env may define NODE_RPC_URL; only assert when it does not.
        if dotenvy::var("NODE_RPC_URL").is_err() {
            assert!(Config::from_env().is_err());
        }
        clear_env();
    }
}
