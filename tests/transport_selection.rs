//! Transport selection by URL scheme.

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use eth_node_provider::error::ProviderError;
use eth_node_provider::rpc::{create_provider, TransportKind};

#[test]
fn test_http_schemes_select_http() {
    for url in [
        "http://localhost:8545",
        "https://eth-mainnet.g.alchemy.com/v2/KEY",
    ] {
        assert!(matches!(TransportKind::classify(url), Ok(TransportKind::Http)), "{url}");
    }
}

#[test]
fn test_ws_schemes_select_websocket() {
    for url in ["ws://localhost:8546", "wss://eth-mainnet.g.alchemy.com/v2/KEY"] {
        assert!(
            matches!(TransportKind::classify(url), Ok(TransportKind::WebSocket)),
            "{url}"
        );
    }
}

#[test]
fn test_unknown_scheme_is_rejected() {
    for url in ["ipc:///tmp/geth.ipc", "ftp://node", "localhost:8545", "HTTP://node"] {
        match TransportKind::classify(url) {
            Err(ProviderError::UnsupportedTransport { url: reported }) => assert_eq!(reported, url),
            other => panic!("{url} should be unsupported, got {other:?}"),
        }
    }
}

#[test]
fn test_blank_url_is_rejected() {
    for url in ["", " ", "\t\n"] {
        let err = TransportKind::classify(url).expect_err("blank URL must be rejected");
        assert!(err.is_fatal());
    }
}

#[tokio::test]
async fn test_create_provider_selects_transport() {
    let handle = create_provider("https://node.invalid/rpc")
        .await
        .expect("HTTP handle is built without network I/O");
    assert_eq!(handle.kind(), TransportKind::Http);

    let result = create_provider("wss").await;
    assert!(matches!(result, Err(ProviderError::TransportConnect { .. })));
}
