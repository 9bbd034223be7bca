//! WebSocket reconnection against an in-process node.
//!
//! The mock node decides per accepted TCP connection how to behave, so each
//! test can script an outage and count how many connections the transport
//! opened.

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eth_node_provider::config::ProviderConfig;
use eth_node_provider::error::ProviderError;
use eth_node_provider::observability::init_test_tracing;
use eth_node_provider::rpc::{
    get_latest_block, ConnectionState, JsonRpcRequest, ReconnectPolicy, RpcHandle, Transport,
    WsTransport,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, Copy)]
enum Behavior {
    /// Answer every request with block 0x2a.
    Serve,
    /// Complete the handshake, then close.
    CloseAfterHandshake,
    /// Drop the TCP connection before the handshake.
    RejectHandshake,
    /// Read one request, never answer it, then close.
    SwallowRequestThenClose,
}

struct MockNode {
    url: String,
    accepted: Arc<AtomicUsize>,
}

impl MockNode {
    fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

/// Start a node; `plan` maps the 0-based connection index to a behavior.
///
/// With `max_accepts`, the listener is closed after that many connections.
async fn spawn_node<F>(plan: F, max_accepts: Option<usize>) -> MockNode
where
    F: Fn(usize) -> Behavior + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock node");
    let url = format!("ws://{}", listener.local_addr().expect("local addr"));
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    tokio::spawn(async move {
        loop {
            let Ok((tcp, _)) = listener.accept().await else {
                return;
            };
            let index = counter.fetch_add(1, Ordering::SeqCst);
            let behavior = plan(index);

            if max_accepts == Some(index + 1) {
                drop(listener);
                serve_connection(tcp, behavior).await;
                return;
            }
            tokio::spawn(serve_connection(tcp, behavior));
        }
    });

    MockNode { url, accepted }
}

async fn serve_connection(tcp: TcpStream, behavior: Behavior) {
    if matches!(behavior, Behavior::RejectHandshake) {
        drop(tcp);
        return;
    }
    let Ok(mut ws) = accept_async(tcp).await else {
        return;
    };

    match behavior {
        Behavior::CloseAfterHandshake => {
            let _ = ws.close(None).await;
        }
        Behavior::SwallowRequestThenClose => {
            let _ = ws.next().await;
            let _ = ws.close(None).await;
        }
        Behavior::Serve => {
            while let Some(Ok(message)) = ws.next().await {
                let Message::Text(text) = message else {
                    continue;
                };
                let Ok(request) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                let reply = json!({"jsonrpc": "2.0", "id": request["id"], "result": "0x2a"});
                if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                    break;
                }
            }
        }
        Behavior::RejectHandshake => {}
    }
}

fn config(reconnect: ReconnectPolicy) -> ProviderConfig {
    ProviderConfig {
        reconnect,
        ..ProviderConfig::default()
    }
}

fn ws(handle: &RpcHandle) -> &WsTransport {
    match handle.transport() {
        Transport::WebSocket(ws) => ws,
        Transport::Http(_) => panic!("expected a WebSocket transport"),
    }
}

/// Poll `check` until it holds or five seconds pass.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

#[tokio::test]
async fn test_reconnects_after_repeated_drops() {
    init_test_tracing();
    const DROPS: usize = 3;
    let node = spawn_node(
        |index| {
            if index < DROPS {
                Behavior::CloseAfterHandshake
            } else {
                Behavior::Serve
            }
        },
        None,
    )
    .await;

    let handle = RpcHandle::connect(&node.url, &config(ReconnectPolicy::unbounded()))
        .await
        .expect("initial connect should succeed");
    let transport = ws(&handle);

    assert!(
        eventually(|| {
            transport.connect_attempts() == (DROPS + 1) as u64
                && transport.state() == ConnectionState::Connected
        })
        .await,
        "transport did not settle: attempts={}, state={}",
        transport.connect_attempts(),
        transport.state()
    );

    let block = get_latest_block(&handle).await.expect("request after reconnect");
    assert_eq!(block, 0x2a);
    assert_eq!(node.accepted(), DROPS + 1);

    // Each drop was answered by exactly one reconnect; nothing trails in later.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(node.accepted(), DROPS + 1);
    assert_eq!(transport.connect_attempts(), (DROPS + 1) as u64);
}

#[tokio::test]
async fn test_no_duplicate_reconnects() {
    init_test_tracing();
    let node = spawn_node(
        |index| {
            if index == 0 {
                Behavior::CloseAfterHandshake
            } else {
                Behavior::Serve
            }
        },
        None,
    )
    .await;

    let transport = WsTransport::connect(node.url.clone(), ReconnectPolicy::unbounded())
        .await
        .expect("initial connect should succeed");

    assert!(eventually(|| node.accepted() == 2).await);
    transport
        .wait_for(ConnectionState::Connected)
        .await
        .expect("control task alive");

    // One drop, one reconnect: nothing else may show up later.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(node.accepted(), 2);
    assert_eq!(transport.connect_attempts(), 2);
}

#[tokio::test]
async fn test_initial_handshake_failure_is_fatal() {
    init_test_tracing();
    let node = spawn_node(|_| Behavior::RejectHandshake, None).await;

    let result = RpcHandle::connect(&node.url, &config(ReconnectPolicy::unbounded())).await;

    match result {
        Err(e) => {
            assert!(e.is_fatal());
            assert!(matches!(e, ProviderError::TransportConnect { .. }));
        }
        Ok(_) => panic!("failed handshake should abort construction"),
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(node.accepted(), 1, "the first connect must not be retried");
}

#[tokio::test]
async fn test_in_flight_request_fails_on_drop() {
    init_test_tracing();
    let node = spawn_node(
        |index| {
            if index == 0 {
                Behavior::SwallowRequestThenClose
            } else {
                Behavior::Serve
            }
        },
        None,
    )
    .await;

    let transport = WsTransport::connect(node.url.clone(), ReconnectPolicy::unbounded())
        .await
        .expect("initial connect should succeed");

    let result = transport
        .send(JsonRpcRequest::new(7, "eth_blockNumber", json!([])))
        .await;
    assert!(matches!(result, Err(ProviderError::Disconnected { .. })));

    assert!(
        eventually(|| {
            transport.connect_attempts() == 2 && transport.state() == ConnectionState::Connected
        })
        .await
    );

    let response = transport
        .send(JsonRpcRequest::new(7, "eth_blockNumber", json!([])))
        .await
        .expect("request on the new session");
    assert_eq!(response.id, json!(7));
    assert_eq!(response.result, Some(json!("0x2a")));
}

#[tokio::test]
async fn test_bounded_policy_gives_up() {
    init_test_tracing();
    // Only the initial connection is accepted; afterwards the port is closed.
    let node = spawn_node(|_| Behavior::CloseAfterHandshake, Some(1)).await;

    let policy = ReconnectPolicy::bounded(2, Duration::from_millis(10));
    let handle = RpcHandle::connect(&node.url, &config(policy))
        .await
        .expect("initial connect should succeed");
    let transport = ws(&handle);

    tokio::time::timeout(
        Duration::from_secs(5),
        transport.wait_for(ConnectionState::Closed),
    )
    .await
    .expect("reconnection should give up")
    .expect("state channel open");

    assert_eq!(transport.connect_attempts(), 3);

    let result = handle.request("eth_blockNumber", json!([])).await;
    assert!(matches!(
        result,
        Err(ProviderError::ReconnectExhausted { attempts: 2 })
    ));
}

#[tokio::test]
async fn test_dropping_handle_stops_reconnection() {
    init_test_tracing();
    let node = spawn_node(|_| Behavior::CloseAfterHandshake, None).await;

    let policy = ReconnectPolicy {
        max_attempts: None,
        delay: Duration::from_millis(20),
    };
    let transport = WsTransport::connect(node.url.clone(), policy)
        .await
        .expect("initial connect should succeed");

    assert!(eventually(|| node.accepted() >= 3).await);
    drop(transport);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let settled = node.accepted();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(node.accepted(), settled);
}
