//! In-process DevTools endpoint for tests.
//!
//! [`MockEndpoint`] binds a WebSocket server on a random localhost port.
//! The accepted peer is driven from the test: it hands out every command
//! frame it receives and writes whatever replies and events the test asks
//! for.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use super::{Connection, ConnectionOptions};

// ============================================================================
// Constants
// ============================================================================

/// Time a test waits for the next command frame.
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// MockEndpoint
// ============================================================================

/// A WebSocket server that is bound but not yet connected.
pub(crate) struct MockEndpoint {
    listener: TcpListener,
    port: u16,
}

impl MockEndpoint {
    /// Binds to `127.0.0.1:0`.
    pub async fn bind() -> Self {
        init_tracing();
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let listener = TcpListener::bind(addr).await.expect("bind mock endpoint");
        let port = listener.local_addr().expect("local addr").port();
        debug!(port, "Mock endpoint bound");
        Self { listener, port }
    }

    /// Returns the browser WebSocket URL of this endpoint.
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/devtools/browser/mock", self.port)
    }

    /// Accepts one client and starts driving it.
    pub async fn accept(self) -> MockPeer {
        let (stream, _) = timeout(RECV_TIMEOUT, self.listener.accept())
            .await
            .expect("client connected in time")
            .expect("accept");
        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .expect("WebSocket upgrade");

        let (incoming_tx, incoming) = mpsc::unbounded_channel();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Option<String>>();

        tokio::spawn(async move {
            let (mut write, mut read) = ws_stream.split();
            loop {
                tokio::select! {
                    message = read.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            let frame: Value = serde_json::from_str(text.as_str()).expect("client sent JSON");
                            let _ = incoming_tx.send(frame);
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                    command = outgoing_rx.recv() => match command {
                        Some(Some(text)) => {
                            if write.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        Some(None) | None => {
                            let _ = write.close().await;
                            break;
                        }
                    },
                }
            }
        });

        MockPeer { incoming, outgoing }
    }
}

// ============================================================================
// MockPeer
// ============================================================================

/// The remote end of a mock connection.
pub(crate) struct MockPeer {
    incoming: mpsc::UnboundedReceiver<Value>,
    outgoing: mpsc::UnboundedSender<Option<String>>,
}

impl MockPeer {
    /// Waits for the next command frame.
    pub async fn recv(&mut self) -> Value {
        timeout(RECV_TIMEOUT, self.incoming.recv())
            .await
            .expect("command frame in time")
            .expect("client still connected")
    }

    /// Writes a raw JSON frame.
    pub fn send(&self, frame: Value) {
        self.send_text(&frame.to_string());
    }

    /// Writes a raw text frame.
    pub fn send_text(&self, text: &str) {
        let _ = self.outgoing.send(Some(text.to_string()));
    }

    /// Answers a command frame with `result`, echoing its id and session.
    pub fn reply(&self, command: &Value, result: Value) {
        let mut frame = json!({"id": command["id"], "result": result});
        if let Some(session_id) = command.get("sessionId") {
            frame["sessionId"] = session_id.clone();
        }
        self.send(frame);
    }

    /// Emits an event, optionally tagged with a session.
    pub fn event(&self, session_id: Option<&str>, method: &str, params: Value) {
        let mut frame = json!({"method": method, "params": params});
        if let Some(session_id) = session_id {
            frame["sessionId"] = json!(session_id);
        }
        self.send(frame);
    }

    /// Closes the socket.
    pub fn close(&self) {
        let _ = self.outgoing.send(None);
    }
}

/// Routes `RUST_LOG`-filtered logs to the test output.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Connects a [`Connection`] to a fresh mock endpoint.
pub(crate) async fn connect_pair(options: ConnectionOptions) -> (Connection, MockPeer) {
    let endpoint = MockEndpoint::bind().await;
    let url = endpoint.ws_url();
    let accepting = tokio::spawn(endpoint.accept());

    let connection = Connection::builder()
        .url(url)
        .options(options)
        .connect()
        .await
        .expect("connect to mock endpoint");
    let peer = accepting.await.expect("accept task");

    (connection, peer)
}
