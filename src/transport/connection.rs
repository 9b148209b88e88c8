//! WebSocket client socket and event loop.
//!
//! Each socket opened by [`TungsteniteTransport`] spawns a tokio task that
//! connects, then handles:
//!
//! - Incoming frames from the endpoint (text, binary, close)
//! - Outgoing payloads and close requests from the socket handle
//! - Translation of both into [`TransportEvent`] notifications

// ============================================================================
// Imports
// ============================================================================

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{BinaryType, MessageEvent, Payload, TransportError};

use super::{EventHandler, OpenRequest, Socket, Transport, TransportEvent};

// ============================================================================
// SocketCommand
// ============================================================================

/// Internal commands for the event loop.
enum SocketCommand {
    /// Write a payload.
    Send(Payload),
    /// Close the connection.
    Close,
}

// ============================================================================
// TungsteniteTransport
// ============================================================================

/// [`Transport`] backed by `tokio-tungstenite`.
///
/// `wss://` endpoints require the `tls` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

impl TungsteniteTransport {
    /// Creates the transport.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Transport for TungsteniteTransport {
    fn open(&self, request: OpenRequest, handler: EventHandler) -> Result<Box<dyn Socket>> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::protocol(format!("No tokio runtime for socket task: {e}")))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();

        debug!(url = %request.url, binary_type = %request.binary_type, "Spawning socket task");

        runtime.spawn(run_event_loop(
            request.url,
            request.binary_type,
            command_rx,
            handler,
        ));

        Ok(Box::new(TungsteniteSocket { command_tx }))
    }
}

// ============================================================================
// TungsteniteSocket
// ============================================================================

/// Handle to a socket task.
///
/// Dropping the handle closes the connection.
struct TungsteniteSocket {
    command_tx: mpsc::UnboundedSender<SocketCommand>,
}

impl Socket for TungsteniteSocket {
    fn send(&self, payload: Payload) -> Result<()> {
        self.command_tx
            .send(SocketCommand::Send(payload))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&self) {
        let _ = self.command_tx.send(SocketCommand::Close);
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Connects and pumps frames until either side closes.
async fn run_event_loop(
    url: Url,
    binary_type: BinaryType,
    mut command_rx: mpsc::UnboundedReceiver<SocketCommand>,
    handler: EventHandler,
) {
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            warn!(%url, error = %e, "WebSocket connect failed");
            handler(TransportEvent::Error(TransportError::new(e.to_string())));
            handler(TransportEvent::Close);
            return;
        }
    };

    info!(%url, "WebSocket connection established");
    handler(TransportEvent::Open);

    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            // Incoming frames from the endpoint
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(len = text.len(), "Text frame received");
                        let data = Payload::Text(text.as_str().to_owned());
                        handler(TransportEvent::Message(MessageEvent::new(data, binary_type)));
                    }

                    Some(Ok(Message::Binary(bytes))) => {
                        trace!(len = bytes.len(), "Binary frame received");
                        let data = Payload::Binary(bytes.to_vec());
                        handler(TransportEvent::Message(MessageEvent::new(data, binary_type)));
                    }

                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "WebSocket closed by remote");
                        break;
                    }

                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        handler(TransportEvent::Error(TransportError::new(e.to_string())));
                        break;
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }

                    // Ignore Ping, Pong, raw frames
                    _ => {}
                }
            }

            // Commands from the socket handle
            command = command_rx.recv() => {
                match command {
                    Some(SocketCommand::Send(payload)) => {
                        if let Err(e) = ws_write.send(into_message(payload)).await {
                            warn!(error = %e, "Failed to write frame");
                            handler(TransportEvent::Error(TransportError::new(e.to_string())));
                            break;
                        }
                        trace!("Frame sent");
                    }

                    Some(SocketCommand::Close) => {
                        debug!("Close requested");
                        let _ = ws_write.close().await;
                        break;
                    }

                    None => {
                        debug!("Socket handle dropped");
                        let _ = ws_write.close().await;
                        break;
                    }
                }
            }
        }
    }

    handler(TransportEvent::Close);

    debug!(%url, "Event loop terminated");
}

fn into_message(payload: Payload) -> Message {
    match payload {
        Payload::Text(text) => Message::Text(text.into()),
        Payload::Binary(bytes) => Message::Binary(bytes.into()),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::time::timeout;

    /// Spawns a one-connection echo server and returns its URL.
    async fn echo_server() -> Url {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind should succeed");
        let port = listener.local_addr().expect("local addr").port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("upgrade");
            while let Some(Ok(message)) = ws.next().await {
                if message.is_text() || message.is_binary() {
                    let _ = ws.send(message).await;
                }
            }
        });

        Url::parse(&format!("ws://127.0.0.1:{port}")).expect("url")
    }

    fn collecting_handler() -> (EventHandler, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: EventHandler = Arc::new(move |event| {
            let _ = tx.send(event);
        });
        (handler, rx)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event within timeout")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_echo_roundtrip() {
        let url = echo_server().await;
        let (handler, mut events) = collecting_handler();

        let socket = TungsteniteTransport::new()
            .open(
                OpenRequest {
                    url,
                    binary_type: BinaryType::ArrayBuffer,
                },
                handler,
            )
            .expect("open should start");

        assert_eq!(next_event(&mut events).await, TransportEvent::Open);

        socket.send(Payload::from("ping")).expect("send");
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Message(MessageEvent::new("ping", BinaryType::ArrayBuffer))
        );

        socket.close();
        assert_eq!(next_event(&mut events).await, TransportEvent::Close);
    }

    #[tokio::test]
    async fn test_connect_failure_reports_error_then_close() {
        // Bind and drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let (handler, mut events) = collecting_handler();
        let url = Url::parse(&format!("ws://127.0.0.1:{port}")).expect("url");
        let _socket = TungsteniteTransport::new()
            .open(
                OpenRequest {
                    url,
                    binary_type: BinaryType::Blob,
                },
                handler,
            )
            .expect("open should start");

        assert!(matches!(
            next_event(&mut events).await,
            TransportEvent::Error(_)
        ));
        assert_eq!(next_event(&mut events).await, TransportEvent::Close);
    }

    #[test]
    fn test_open_outside_runtime_fails() {
        let (handler, _events) = collecting_handler();
        let result = TungsteniteTransport::new().open(
            OpenRequest {
                url: Url::parse("ws://127.0.0.1:1").expect("url"),
                binary_type: BinaryType::Blob,
            },
            handler,
        );
        assert!(matches!(result, Err(Error::Protocol { .. })));
    }
}
