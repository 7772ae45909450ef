//! Core server: accepts connections and drives each one through the gateway.
//!
//! Owns the connection gateway and the shutdown notifier. Each accepted
//! WebSocket gets its own task running a session loop that interleaves
//! inbound frames with queued outbound events.

use crate::config::ServerConfig;
use crate::gateway::{CloseReason, ConnectionGateway, Flow};
use crate::transport::websocket::{self, WebSocketConnection};
use presence_core::{decode_client_event, PresenceResult};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// The presence server instance.
pub struct PresenceServer {
    config: ServerConfig,
    gateway: Arc<ConnectionGateway>,
    /// Broadcast sender for server shutdown notification.
    shutdown_tx: broadcast::Sender<()>,
}

impl PresenceServer {
    /// Create a new server instance.
    pub fn new(config: ServerConfig) -> Self {
        let gateway = Arc::new(ConnectionGateway::new(
            config.outbound_queue,
            config.duplicate_identity,
            config.enforce_sender_identity,
        ));
        Self {
            config,
            gateway,
            shutdown_tx: broadcast::channel(1).0,
        }
    }

    /// Bind the configured address and serve until the listener stops.
    pub async fn run(self: Arc<Self>) -> PresenceResult<()> {
        let (addr, ws_rx) = websocket::start_listener(self.config.listen_addr()).await?;
        info!(
            addr = %addr,
            duplicate_identity = ?self.config.duplicate_identity,
            enforce_sender_identity = self.config.enforce_sender_identity,
            "presence server listening"
        );
        self.serve(ws_rx).await;
        Ok(())
    }

    /// Serve connections yielded by a listener.
    pub async fn serve(self: Arc<Self>, mut ws_rx: mpsc::Receiver<WebSocketConnection>) {
        while let Some(conn) = ws_rx.recv().await {
            let server = self.clone();
            tokio::spawn(async move {
                server.handle_websocket(conn).await;
            });
        }
    }

    /// Ask every session loop to close its connection.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    async fn handle_websocket(&self, mut conn: WebSocketConnection) {
        let remote = conn.remote_addr;
        let (mut handle, mut outbound_rx) = self.gateway.accept().await;
        info!(remote = %remote, connection_id = %handle.id(), "connection opened");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let reason = loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!(connection_id = %handle.id(), "shutdown signal received, closing WebSocket");
                    let _ = conn.ws_stream.close(None).await;
                    break CloseReason::Shutdown;
                }

                Some(event) = outbound_rx.recv() => {
                    if let Err(e) = websocket::ws_send_event(&mut conn.ws_stream, &event).await {
                        debug!(connection_id = %handle.id(), error = %e, "WebSocket write failed");
                        break CloseReason::TransportError;
                    }
                }

                ws_result = websocket::ws_recv_frame(&mut conn.ws_stream) => {
                    match ws_result {
                        Ok(Some(data)) => match decode_client_event(&data) {
                            Ok(event) => {
                                if self.gateway.handle(&mut handle, event).await == Flow::Closed {
                                    let _ = conn.ws_stream.close(None).await;
                                    break CloseReason::Logout;
                                }
                            }
                            Err(e) => {
                                warn!(connection_id = %handle.id(), error = %e, "undecodable frame ignored");
                            }
                        },
                        Ok(None) => {
                            debug!(connection_id = %handle.id(), "WebSocket closed by peer");
                            break CloseReason::TransportClosed;
                        }
                        Err(e) => {
                            debug!(connection_id = %handle.id(), error = %e, "WebSocket session ended");
                            break CloseReason::TransportError;
                        }
                    }
                }
            }
        };

        self.gateway.close(&mut handle, reason).await;
        info!(remote = %remote, connection_id = %handle.id(), %reason, "connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use presence_core::{
        decode_server_event, encode_event, AddUserPayload, ClientEvent, GetMessagePayload,
        SendMessagePayload, ServerEvent,
    };
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn start_server() -> (Arc<PresenceServer>, SocketAddr) {
        let server = Arc::new(PresenceServer::new(ServerConfig::default()));
        let (addr, ws_rx) = websocket::start_listener("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        tokio::spawn(server.clone().serve(ws_rx));
        (server, addr)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        ws
    }

    async fn send(ws: &mut Client, event: ClientEvent) {
        let frame = encode_event(&event).unwrap();
        ws.send(Message::Text(frame.into())).await.unwrap();
    }

    async fn announce(ws: &mut Client, user_id: &str) {
        send(
            ws,
            ClientEvent::AddUser(AddUserPayload {
                user_id: user_id.into(),
            }),
        )
        .await;
    }

    async fn message(ws: &mut Client, from: &str, to: &str, text: &str) {
        send(
            ws,
            ClientEvent::SendMessage(SendMessagePayload {
                sender_id: from.into(),
                receiver_id: to.into(),
                text: text.into(),
            }),
        )
        .await;
    }

    async fn recv(ws: &mut Client) -> Option<ServerEvent> {
        let next = tokio::time::timeout(Duration::from_millis(500), ws.next()).await;
        match next {
            Ok(Some(Ok(Message::Text(text)))) => Some(decode_server_event(text.as_bytes()).unwrap()),
            _ => None,
        }
    }

    /// Read events until a roster with `len` entries arrives.
    async fn roster_of_len(ws: &mut Client, len: usize) -> Vec<String> {
        loop {
            match recv(ws).await {
                Some(ServerEvent::GetUsers(entries)) if entries.len() == len => {
                    return entries.into_iter().map(|e| e.user_id).collect();
                }
                Some(_) => continue,
                None => panic!("no roster of length {len} received"),
            }
        }
    }

    #[tokio::test]
    async fn end_to_end_presence_and_routing() {
        let (_server, addr) = start_server().await;
        let mut a = connect(addr).await;
        let mut b = connect(addr).await;

        announce(&mut a, "u1").await;
        assert_eq!(roster_of_len(&mut a, 1).await, vec!["u1"]);
        announce(&mut b, "u2").await;
        assert_eq!(roster_of_len(&mut a, 2).await, vec!["u1", "u2"]);
        assert_eq!(roster_of_len(&mut b, 2).await, vec!["u1", "u2"]);

        message(&mut a, "u1", "u2", "hi").await;
        assert_eq!(
            recv(&mut b).await,
            Some(ServerEvent::GetMessage(GetMessagePayload {
                sender_id: "u1".into(),
                text: "hi".into(),
            }))
        );

        b.close(None).await.unwrap();
        assert_eq!(roster_of_len(&mut a, 1).await, vec!["u1"]);

        message(&mut a, "u1", "u2", "anyone?").await;
        assert_eq!(recv(&mut a).await, None);
    }

    #[tokio::test]
    async fn logout_event_deregisters() {
        let (_server, addr) = start_server().await;
        let mut a = connect(addr).await;
        let mut b = connect(addr).await;

        announce(&mut a, "u1").await;
        announce(&mut b, "u2").await;
        roster_of_len(&mut a, 2).await;

        send(&mut b, ClientEvent::Disconnect).await;
        assert_eq!(roster_of_len(&mut a, 1).await, vec!["u1"]);
    }

    #[tokio::test]
    async fn garbage_frame_does_not_close_connection() {
        let (_server, addr) = start_server().await;
        let mut a = connect(addr).await;

        a.send(Message::Text("definitely not json".to_string().into()))
            .await
            .unwrap();
        announce(&mut a, "u1").await;
        assert_eq!(roster_of_len(&mut a, 1).await, vec!["u1"]);
    }

    #[tokio::test]
    async fn oversized_frame_closes_only_that_connection() {
        let (_server, addr) = start_server().await;
        let mut a = connect(addr).await;
        let mut b = connect(addr).await;

        announce(&mut a, "u1").await;
        announce(&mut b, "u2").await;
        roster_of_len(&mut b, 2).await;

        let oversized = "x".repeat(presence_core::MAX_FRAME_SIZE + 1);
        // The server may drop the socket before the write completes.
        let _ = a.send(Message::Text(oversized.into())).await;

        assert_eq!(roster_of_len(&mut b, 1).await, vec!["u2"]);
        message(&mut b, "u2", "u1", "gone?").await;
        assert_eq!(recv(&mut b).await, None);
    }

    #[tokio::test]
    async fn shutdown_closes_sessions() {
        let (server, addr) = start_server().await;
        let mut a = connect(addr).await;
        announce(&mut a, "u1").await;
        roster_of_len(&mut a, 1).await;

        server.shutdown();
        let closed = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match a.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await;
        assert!(closed.is_ok());
    }
}
