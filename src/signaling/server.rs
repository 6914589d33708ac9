//! Signaling WebSocket transport
//!
//! Accepts (optionally TLS) WebSocket connections, mints a monotonically
//! increasing connection id per socket, and feeds text frames to the
//! registered [`SignalingHandler`]. Callbacks for one connection run on that
//! connection's task, so they are serialized per connection; `send` is safe
//! from anywhere and posts onto the connection's outbound channel.
//!
//! On socket error or close the connection is dropped from the registry
//! BEFORE `on_disconnect` fires, and `on_disconnect` fires exactly once.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Connection id minted by the transport.
pub type ConnectionId = u64;

/// Upcalls from the transport. Implemented by the signaling controller.
#[async_trait]
pub trait SignalingHandler: Send + Sync {
    async fn on_connect(&self, conn_id: ConnectionId);
    async fn on_message(&self, conn_id: ConnectionId, text: String);
    async fn on_disconnect(&self, conn_id: ConnectionId);
}

struct Connection {
    outbound: mpsc::UnboundedSender<Message>,
}

/// WebSocket signaling endpoint.
pub struct SignalingServer {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    next_conn_id: AtomicU64,
    handler: OnceLock<Weak<dyn SignalingHandler>>,
}

impl SignalingServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connections: RwLock::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
            handler: OnceLock::new(),
        })
    }

    /// Install the message handler. Must happen before `serve`.
    pub fn set_handler(&self, handler: Weak<dyn SignalingHandler>) {
        if self.handler.set(handler).is_err() {
            warn!("signaling handler already installed");
        }
    }

    fn handler(&self) -> Option<Arc<dyn SignalingHandler>> {
        self.handler.get().and_then(Weak::upgrade)
    }

    /// Send a text frame. Returns false when the connection is gone; never
    /// fatal.
    pub fn send(&self, conn_id: ConnectionId, text: impl Into<String>) -> bool {
        let connections = self.connections.read();
        match connections.get(&conn_id) {
            Some(conn) => conn.outbound.send(Message::Text(text.into())).is_ok(),
            None => false,
        }
    }

    /// Ask a connection to close. The socket task finishes the handshake and
    /// runs the normal disconnect path.
    pub fn close(&self, conn_id: ConnectionId) {
        let connections = self.connections.read();
        if let Some(conn) = connections.get(&conn_id) {
            let _ = conn.outbound.send(Message::Close(None));
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Axum router exposing the signaling endpoint at `/`.
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/", get(ws_upgrade))
            .with_state(self.clone())
    }

    /// Bind and serve until the process exits. TLS failures at startup are
    /// fatal; everything after that is per-connection.
    pub async fn serve(
        self: &Arc<Self>,
        addr: SocketAddr,
        tls: Option<(String, String)>,
    ) -> Result<()> {
        let app = self.router();

        match tls {
            Some((cert_path, key_path)) => {
                let config = RustlsConfig::from_pem_file(&cert_path, &key_path)
                    .await
                    .map_err(|e| Error::Transport(format!("TLS setup failed: {e}")))?;
                info!(%addr, "signaling server listening (wss)");
                axum_server::bind_rustls(addr, config)
                    .serve(app.into_make_service())
                    .await
                    .map_err(|e| Error::Transport(e.to_string()))
            }
            None => {
                info!(%addr, "signaling server listening (ws)");
                axum_server::bind(addr)
                    .serve(app.into_make_service())
                    .await
                    .map_err(|e| Error::Transport(e.to_string()))
            }
        }
    }

    async fn handle_socket(self: Arc<Self>, socket: WebSocket) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

        self.connections
            .write()
            .insert(conn_id, Connection { outbound: outbound_tx });

        let Some(handler) = self.handler() else {
            warn!(conn = conn_id, "no signaling handler installed, dropping connection");
            self.connections.write().remove(&conn_id);
            return;
        };

        info!(conn = conn_id, "signaling client connected");
        handler.on_connect(conn_id).await;

        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                inbound = stream.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => {
                            handler.on_message(conn_id, text).await;
                        }
                        // All signaling is text JSON
                        Some(Ok(Message::Binary(_))) => {
                            debug!(conn = conn_id, "ignoring binary frame");
                        }
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                        Some(Ok(Message::Close(_))) | None => {
                            debug!(conn = conn_id, "client closed connection");
                            break;
                        }
                        Some(Err(e)) => {
                            debug!(conn = conn_id, error = %e, "socket read error");
                            break;
                        }
                    }
                }
                outbound = outbound_rx.recv() => {
                    match outbound {
                        Some(Message::Close(frame)) => {
                            let _ = sink.send(Message::Close(frame)).await;
                            break;
                        }
                        Some(message) => {
                            if sink.send(message).await.is_err() {
                                debug!(conn = conn_id, "socket write failed");
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        // Unregister first so a send() during teardown cleanly reports false
        self.connections.write().remove(&conn_id);
        handler.on_disconnect(conn_id).await;
        info!(conn = conn_id, "signaling client disconnected");
    }
}

async fn ws_upgrade(
    State(server): State<Arc<SignalingServer>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| server.handle_socket(socket))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_to_unknown_connection() {
        let server = SignalingServer::new();
        assert!(!server.send(42, "hello"));
        assert_eq!(server.connection_count(), 0);
    }

    #[test]
    fn test_connection_ids_monotonic() {
        let server = SignalingServer::new();
        let first = server.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let second = server.next_conn_id.fetch_add(1, Ordering::Relaxed);
        assert!(second > first);
    }
}
