//! The presence client.
//!
//! `PresenceClient` owns one WebSocket connection. Events are read on demand
//! with [`PresenceClient::next_event`]; there is no background task.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use presence_core::{
    decode_server_event, encode_event, AddUserPayload, ClientEvent, PresenceError,
    PresenceResult, RosterEntry, SendMessagePayload, ServerEvent,
};

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A connection to a presence server.
pub struct PresenceClient {
    ws: WsStream,
    user_id: Option<String>,
}

impl PresenceClient {
    /// Connect to a presence server (`ws://` or `wss://`).
    pub async fn connect(url: &str) -> PresenceResult<Self> {
        if url.starts_with("wss://") {
            // Already installed is fine.
            let _ = rustls::crypto::ring::default_provider().install_default();
        }

        let (ws, _response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url))
            .await
            .map_err(|_| PresenceError::Transport(format!("connect to {url} timed out")))?
            .map_err(|e| PresenceError::Transport(format!("WebSocket connect error: {e}")))?;

        info!(url = %url, "connected");
        Ok(Self { ws, user_id: None })
    }

    /// The identity this client announced, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Announce this connection's identity (`addUser`).
    pub async fn announce(&mut self, user_id: &str) -> PresenceResult<()> {
        self.send(&ClientEvent::AddUser(AddUserPayload {
            user_id: user_id.to_string(),
        }))
        .await?;
        self.user_id = Some(user_id.to_string());
        Ok(())
    }

    /// Send a direct message (`sendMessage`). The server never confirms
    /// delivery.
    pub async fn send_message(
        &mut self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
    ) -> PresenceResult<()> {
        self.send(&ClientEvent::SendMessage(SendMessagePayload {
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            text: text.to_string(),
        }))
        .await
    }

    /// Wait for the next server event. Returns `None` once the server closed
    /// the connection. Undecodable frames are skipped.
    pub async fn next_event(&mut self) -> PresenceResult<Option<ServerEvent>> {
        loop {
            let data: Vec<u8> = match self.ws.next().await {
                Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
                Some(Ok(Message::Binary(data))) => data.to_vec(),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(PresenceError::Transport(format!("WS recv failed: {e}")));
                }
            };
            match decode_server_event(&data) {
                Ok(event) => {
                    debug!(event = event.name(), "event received");
                    return Ok(Some(event));
                }
                Err(e) => warn!(error = %e, "skipping undecodable frame"),
            }
        }
    }

    /// Wait for the next roster, skipping other events.
    pub async fn next_roster(&mut self) -> PresenceResult<Option<Vec<RosterEntry>>> {
        while let Some(event) = self.next_event().await? {
            if let ServerEvent::GetUsers(roster) = event {
                return Ok(Some(roster));
            }
        }
        Ok(None)
    }

    /// Log out (`disconnect`) and close the WebSocket.
    pub async fn logout(mut self) -> PresenceResult<()> {
        self.send(&ClientEvent::Disconnect).await?;
        // The server may already have closed its side.
        let _ = self.ws.close(None).await;
        Ok(())
    }

    async fn send(&mut self, event: &ClientEvent) -> PresenceResult<()> {
        let frame = encode_event(event)?;
        self.ws
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| PresenceError::Transport(format!("WS send failed: {e}")))?;
        debug!(event = event.name(), "event sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_core::{decode_client_event, GetMessagePayload};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Single-connection stub server: forwards every decoded client event to
    /// the test and writes `replies` once the first frame arrives.
    async fn stub_server(replies: Vec<ServerEvent>) -> (SocketAddr, mpsc::Receiver<ClientEvent>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let mut replies = Some(replies);
            while let Some(Ok(msg)) = ws.next().await {
                let Message::Text(text) = msg else { continue };
                let event = decode_client_event(text.as_bytes()).unwrap();
                let done = event == ClientEvent::Disconnect;
                tx.send(event).await.unwrap();
                if let Some(replies) = replies.take() {
                    ws.send(Message::Text("not json".to_string().into())).await.unwrap();
                    for reply in replies {
                        let frame = encode_event(&reply).unwrap();
                        ws.send(Message::Text(frame.into())).await.unwrap();
                    }
                }
                if done {
                    let _ = ws.close(None).await;
                    break;
                }
            }
        });

        (addr, rx)
    }

    #[tokio::test]
    async fn announce_and_send_use_wire_events() {
        let (addr, mut seen) = stub_server(vec![]).await;
        let mut client = PresenceClient::connect(&format!("ws://{addr}")).await.unwrap();

        client.announce("alice").await.unwrap();
        assert_eq!(client.user_id(), Some("alice"));
        client.send_message("alice", "bob", "hello").await.unwrap();
        client.logout().await.unwrap();

        assert_eq!(
            seen.recv().await.unwrap(),
            ClientEvent::AddUser(AddUserPayload {
                user_id: "alice".into()
            })
        );
        assert_eq!(
            seen.recv().await.unwrap(),
            ClientEvent::SendMessage(SendMessagePayload {
                sender_id: "alice".into(),
                receiver_id: "bob".into(),
                text: "hello".into(),
            })
        );
        assert_eq!(seen.recv().await.unwrap(), ClientEvent::Disconnect);
    }

    #[tokio::test]
    async fn next_roster_skips_messages_and_garbage() {
        let message = ServerEvent::GetMessage(GetMessagePayload {
            sender_id: "bob".into(),
            text: "yo".into(),
        });
        let roster = vec![RosterEntry {
            user_id: "alice".into(),
            connection_id: "c1".into(),
        }];
        let (addr, _seen) = stub_server(vec![message, ServerEvent::GetUsers(roster.clone())]).await;
        let mut client = PresenceClient::connect(&format!("ws://{addr}")).await.unwrap();

        client.announce("alice").await.unwrap();
        assert_eq!(client.next_roster().await.unwrap(), Some(roster));
    }

    #[tokio::test]
    async fn next_event_none_after_server_close() {
        let (addr, _seen) = stub_server(vec![]).await;
        let mut client = PresenceClient::connect(&format!("ws://{addr}")).await.unwrap();

        client.send(&ClientEvent::Disconnect).await.unwrap();
        assert!(client.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn connect_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = PresenceClient::connect(&format!("ws://{addr}")).await.err().unwrap();
        assert!(matches!(err, PresenceError::Transport(_)));
    }
}
