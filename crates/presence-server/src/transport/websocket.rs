//! WebSocket listener using tokio-tungstenite.
//!
//! Each WebSocket message carries one JSON-encoded event. Text and binary
//! messages are treated alike.

use futures_util::{SinkExt, StreamExt};
use presence_core::{encode_event, PresenceError, PresenceResult, ServerEvent, MAX_FRAME_SIZE};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

/// A handle to an accepted WebSocket connection.
pub struct WebSocketConnection {
    pub ws_stream: WebSocketStream<TcpStream>,
    pub remote_addr: SocketAddr,
}

/// Handshake limits: tungstenite refuses messages and frames above
/// `MAX_FRAME_SIZE` while reading them.
fn ws_config() -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(MAX_FRAME_SIZE);
    config.max_frame_size = Some(MAX_FRAME_SIZE);
    config
}

/// Start the WebSocket listener.
///
/// Returns the bound address (useful when binding port 0) and a receiver
/// that yields connections whose WebSocket handshake completed.
pub async fn start_listener(
    bind_addr: SocketAddr,
) -> PresenceResult<(SocketAddr, mpsc::Receiver<WebSocketConnection>)> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| PresenceError::Transport(format!("bind {bind_addr} failed: {e}")))?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "WebSocket listener started");

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(accept_loop(listener, tx));
    Ok((local_addr, rx))
}

/// Accept TCP streams until the receiving side goes away.
async fn accept_loop(listener: TcpListener, tx: mpsc::Sender<WebSocketConnection>) {
    while !tx.is_closed() {
        let (stream, remote_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(error = %e, "TCP accept failed");
                continue;
            }
        };
        tokio::spawn(handshake(stream, remote_addr, tx.clone()));
    }
    debug!("connection receiver dropped, accept loop stopped");
}

/// Upgrade one TCP stream and hand it to the server.
async fn handshake(stream: TcpStream, remote_addr: SocketAddr, tx: mpsc::Sender<WebSocketConnection>) {
    let ws_stream = match tokio_tungstenite::accept_async_with_config(stream, Some(ws_config())).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            warn!(remote = %remote_addr, error = %e, "WebSocket handshake failed");
            return;
        }
    };
    debug!(remote = %remote_addr, "WebSocket handshake complete");
    if tx.send(WebSocketConnection { ws_stream, remote_addr }).await.is_err() {
        warn!(remote = %remote_addr, "server stopped before connection could be served");
    }
}

/// Encode `event` and send it as a text message.
pub async fn ws_send_event(
    ws: &mut WebSocketStream<TcpStream>,
    event: &ServerEvent,
) -> PresenceResult<()> {
    let frame = encode_event(event)?;
    ws.send(Message::Text(frame.into()))
        .await
        .map_err(|e| PresenceError::Transport(format!("WS send failed: {e}")))
}

/// Receive the next data message from a WebSocket.
///
/// Returns `None` if the connection is closed. Oversized messages are an
/// error, raised by tungstenite while reading.
pub async fn ws_recv_frame(ws: &mut WebSocketStream<TcpStream>) -> PresenceResult<Option<Vec<u8>>> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
            Some(Ok(Message::Binary(data))) => return Ok(Some(data.to_vec())),
            Some(Ok(Message::Close(_))) | None => return Ok(None),
            // Pings are answered by tungstenite itself.
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                return Err(PresenceError::Transport(format!("WS recv failed: {e}")));
            }
        }
    }
}
