//! WebSocket transport with automatic reconnection.
//!
//! The first connection is opened inline by [`WsTransport::connect`]; if it
//! fails the error is fatal and nothing is retried. From then on a background
//! control task owns the socket exclusively and keeps it alive:
//!
//! ```text
//!            initial connect ok
//!   ─────────────────────────────► Connected
//!                                   │    ▲
//!                     session drop  │    │ reconnect ok
//!                                   ▼    │
//!                                 Connecting ──┐
//!                                   ▲          │ reconnect failed
//!                                   └──────────┘
//! ```
//!
//! Each drop triggers exactly one reconnect attempt at a time, driven by a
//! plain loop on the control task. With the default [`ReconnectPolicy`] the
//! loop never gives up and never waits between attempts; a finite policy ends
//! in [`ConnectionState::Closed`].
//!
//! Callers talk to the control task over a channel. Requests issued while the
//! session is down fail immediately with [`ProviderError::Disconnected`], as do
//! requests still waiting for a response when the session drops.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, instrument, warn};

use super::request::{JsonRpcRequest, JsonRpcResponse};
use super::selector::redacted_host;
use crate::error::{ProviderError, ProviderResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Reply = oneshot::Sender<ProviderResult<JsonRpcResponse>>;

/// Observable state of the WebSocket session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// The session dropped and a reconnect attempt is under way.
    Connecting,
    /// The session is open.
    Connected,
    /// A finite reconnect policy gave up; the handle is unusable.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// How the control task reacts to a dropped session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnect attempts allowed per outage; `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Wait before each reconnect attempt.
    pub delay: Duration,
}

impl ReconnectPolicy {
    /// Retry forever with no delay.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_attempts: None,
            delay: Duration::ZERO,
        }
    }

    /// Give up after `max_attempts` consecutive failed reconnects.
    #[must_use]
    pub const fn bounded(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            delay,
        }
    }

    /// Whether another attempt is allowed after `attempts` so far.
    #[must_use]
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

enum Command {
    Request { request: JsonRpcRequest, reply: Reply },
}

/// WebSocket JSON-RPC transport that reconnects on its own.
///
/// Dropping the transport stops the control task and closes the socket.
pub struct WsTransport {
    url: String,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    connect_attempts: Arc<AtomicU64>,
    next_id: AtomicU64,
}

impl WsTransport {
    /// Open the session and start the reconnection loop.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::TransportConnect`] if the first connection
    /// cannot be opened. No second attempt is made.
    #[instrument(skip_all, fields(ws_host = %redacted_host(&url)))]
    pub async fn connect(url: String, policy: ReconnectPolicy) -> ProviderResult<Self> {
        let host = redacted_host(&url);
        info!("Connecting to WebSocket");

        let connect_attempts = Arc::new(AtomicU64::new(1));
        let stream = open_session(&url).await.map_err(|e| {
            error!(error = %e, "Initial WebSocket connection failed");
            ProviderError::transport_connect(
                format!("initial WebSocket connection to {host} failed"),
                Some(Box::new(e)),
            )
        })?;

        info!(
            max_reconnects = ?policy.max_attempts,
            reconnect_delay_ms = u64::try_from(policy.delay.as_millis()).unwrap_or(u64::MAX),
            "WebSocket connected"
        );

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Connected);

        let control = ControlTask {
            url: url.clone(),
            host,
            policy,
            commands: command_rx,
            state: state_tx,
            connect_attempts: Arc::clone(&connect_attempts),
        };
        tokio::spawn(control.run(stream));

        Ok(Self {
            url,
            commands,
            state,
            connect_attempts,
            next_id: AtomicU64::new(1),
        })
    }

    /// Send a request over the current session.
    ///
    /// The request id is replaced by a session-unique id on the wire and
    /// restored on the returned response.
    ///
    /// # Errors
    ///
    /// - [`ProviderError::Disconnected`] if the session is down or drops
    ///   before the response arrives.
    /// - [`ProviderError::ReconnectExhausted`] once a finite policy gave up.
    pub async fn send(&self, mut request: JsonRpcRequest) -> ProviderResult<JsonRpcResponse> {
        let caller_id = request.id;
        request.id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Request { request, reply })
            .map_err(|_| ProviderError::disconnected("WebSocket control task has stopped"))?;

        let mut response = response.await.map_err(|_| {
            ProviderError::disconnected("WebSocket control task dropped the request")
        })??;
        response.id = Value::from(caller_id);
        Ok(response)
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver notified on every state transition.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the session reaches `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Disconnected`] if the control task stopped.
    pub async fn wait_for(&self, target: ConnectionState) -> ProviderResult<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|current| *current == target)
            .await
            .map(|_| ())
            .map_err(|_| ProviderError::disconnected("WebSocket control task has stopped"))
    }

    /// Connection attempts made so far, the initial one included.
    #[must_use]
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// The WebSocket URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsTransport")
            .field("host", &redacted_host(&self.url))
            .field("state", &self.state())
            .field("connect_attempts", &self.connect_attempts())
            .finish_non_exhaustive()
    }
}

async fn open_session(url: &str) -> Result<WsStream, tungstenite::Error> {
    let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
    Ok(stream)
}

enum SessionEnd {
    Dropped(String),
    Shutdown,
}

enum Reconnect {
    Connected(WsStream),
    Exhausted(u32),
    Shutdown,
}

/// Sole owner of the socket session.
struct ControlTask {
    url: String,
    host: String,
    policy: ReconnectPolicy,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
    connect_attempts: Arc<AtomicU64>,
}

impl ControlTask {
    async fn run(mut self, mut stream: WsStream) {
        loop {
            match self.drive(stream).await {
                SessionEnd::Shutdown => {
                    debug!(ws_host = %self.host, "Transport dropped, control task exiting");
                    return;
                }
                SessionEnd::Dropped(reason) => {
                    warn!(ws_host = %self.host, reason = %reason, "WebSocket session dropped, reconnecting");
                }
            }

            self.state.send_replace(ConnectionState::Connecting);

            match self.reconnect().await {
                Reconnect::Connected(next) => {
                    self.state.send_replace(ConnectionState::Connected);
                    info!(
                        ws_host = %self.host,
                        connect_attempts = self.connect_attempts.load(Ordering::SeqCst),
                        "WebSocket reconnected"
                    );
                    stream = next;
                }
                Reconnect::Exhausted(attempts) => {
                    self.state.send_replace(ConnectionState::Closed);
                    error!(ws_host = %self.host, attempts, "Giving up on WebSocket reconnection");
                    self.reject_remaining(attempts).await;
                    return;
                }
                Reconnect::Shutdown => return,
            }
        }
    }

    /// Pump requests and responses until the session ends.
    async fn drive(&mut self, stream: WsStream) -> SessionEnd {
        let (mut sink, mut source) = stream.split();
        let mut pending: HashMap<u64, Reply> = HashMap::new();

        let end = loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    None => {
                        let _ = sink.close().await;
                        break SessionEnd::Shutdown;
                    }
                    Some(Command::Request { request, reply }) => {
                        let text = match serde_json::to_string(&request) {
                            Ok(text) => text,
                            Err(e) => {
                                let _ = reply.send(Err(ProviderError::decoding(
                                    "failed to encode request",
                                    Some(Box::new(e)),
                                )));
                                continue;
                            }
                        };
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            let _ = reply.send(Err(ProviderError::disconnected(e.to_string())));
                            break SessionEnd::Dropped(e.to_string());
                        }
                        pending.insert(request.id, reply);
                    }
                },
                message = source.next() => match message {
                    Some(Ok(Message::Text(text))) => route_response(text.as_bytes(), &mut pending),
                    Some(Ok(Message::Binary(bytes))) => route_response(&bytes, &mut pending),
                    Some(Ok(Message::Close(frame))) => {
                        break SessionEnd::Dropped(frame.map_or_else(
                            || "close frame received".to_string(),
                            |f| format!("close frame received: {} {}", u16::from(f.code), f.reason),
                        ));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break SessionEnd::Dropped(e.to_string()),
                    None => break SessionEnd::Dropped("stream ended".to_string()),
                },
            }
        };

        for (_, reply) in pending.drain() {
            let _ = reply.send(Err(ProviderError::disconnected(
                "session dropped before the response arrived",
            )));
        }
        end
    }

    /// Reconnect according to the policy, one attempt in flight at a time.
    async fn reconnect(&mut self) -> Reconnect {
        let mut attempts = 0u32;
        loop {
            if !self.policy.allows(attempts) {
                return Reconnect::Exhausted(attempts);
            }
            attempts += 1;

            match self.attempt().await {
                None => return Reconnect::Shutdown,
                Some(Ok(stream)) => return Reconnect::Connected(stream),
                Some(Err(e)) => {
                    warn!(ws_host = %self.host, attempt = attempts, error = %e, "Reconnect attempt failed");
                }
            }
        }
    }

    /// One connect attempt; requests arriving meanwhile are rejected.
    ///
    /// Returns `None` if the transport was dropped.
    async fn attempt(&mut self) -> Option<Result<WsStream, tungstenite::Error>> {
        let url = self.url.clone();
        let delay = self.policy.delay;
        let connect_attempts = Arc::clone(&self.connect_attempts);

        let connect = async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            connect_attempts.fetch_add(1, Ordering::SeqCst);
            open_session(&url).await
        };
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => return Some(result),
                command = self.commands.recv() => match command {
                    None => return None,
                    Some(Command::Request { reply, .. }) => {
                        let _ = reply.send(Err(ProviderError::disconnected(
                            "session is reconnecting",
                        )));
                    }
                },
            }
        }
    }

    /// Answer every later request with the exhaustion error.
    async fn reject_remaining(&mut self, attempts: u32) {
        while let Some(Command::Request { reply, .. }) = self.commands.recv().await {
            let _ = reply.send(Err(ProviderError::ReconnectExhausted { attempts }));
        }
    }
}

fn route_response(payload: &[u8], pending: &mut HashMap<u64, Reply>) {
    let response = match serde_json::from_slice::<JsonRpcResponse>(payload) {
        Ok(response) => response,
        Err(e) => {
            debug!(error = %e, "Ignoring non-response WebSocket message");
            return;
        }
    };

    let Some(id) = response.numeric_id() else {
        debug!("Ignoring WebSocket message without numeric id");
        return;
    };

    match pending.remove(&id) {
        Some(reply) => {
            let _ = reply.send(Ok(response));
        }
        None => debug!(id, "No pending request for WebSocket response"),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_unbounded() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy, ReconnectPolicy::unbounded());
        assert!(policy.delay.is_zero());
        assert!(policy.allows(0));
        assert!(policy.allows(u32::MAX - 1));
    }

    #[test]
    fn test_bounded_policy() {
        let policy = ReconnectPolicy::bounded(2, Duration::from_millis(10));
        assert!(policy.allows(0));
        assert!(policy.allows(1));
        assert!(!policy.allows(2));
    }

    #[test]
    fn test_route_response_matches_pending_id() {
        let mut pending = HashMap::new();
        let (reply, mut response) = oneshot::channel();
        pending.insert(9, reply);

        route_response(br#"{"jsonrpc":"2.0","id":9,"result":"0x1"}"#, &mut pending);

        assert!(pending.is_empty());
        match response.try_recv() {
            Ok(Ok(resp)) => assert_eq!(resp.result, Some(Value::from("0x1"))),
            other => panic!("expected routed response, got {other:?}"),
        }
    }

    #[test]
    fn test_route_response_ignores_notifications() {
        let mut pending = HashMap::new();
        let (reply, _response) = oneshot::channel();
        pending.insert(1, reply);

        route_response(
            br#"{"jsonrpc":"2.0","method":"eth_subscription","params":{"subscription":"0xab","result":{}}}"#,
            &mut pending,
        );
        route_response(b"not json", &mut pending);

        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_initial_connect_failure_is_fatal() {
        // Grab a free port, then release it so nothing is listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await;
        let Ok(listener) = listener else { return };
        let Ok(addr) = listener.local_addr() else { return };
        drop(listener);

        let result = WsTransport::connect(format!("ws://{addr}"), ReconnectPolicy::default()).await;
        match result {
            Err(err) => {
                assert!(err.is_fatal());
                assert!(matches!(err, ProviderError::TransportConnect { .. }));
            }
            Ok(_) => panic!("connecting to a closed port should fail"),
        }
    }
}
