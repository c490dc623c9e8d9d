//! WebSocket transport built on tokio-tungstenite
//!
//! Each successful connect spawns a pump task that owns the socket. The pump
//! forwards queued outbound frames to the socket and inbound text frames to
//! the link's event channel, and reports exactly one terminal event when the
//! socket goes away.

use super::{CloseInfo, Connector, OutboundFrame, TransportError, TransportEvent, TransportLink};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production connector: one WebSocket per link
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, address: &str) -> Result<TransportLink, TransportError> {
        debug!(target: "websocket_transport", "Opening WebSocket to {}", address);

        let (socket, response) = connect_async(address)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        debug!(
            target: "websocket_transport",
            "WebSocket handshake complete: HTTP {}",
            response.status()
        );

        let (link, outbound_rx, inbound_tx) = TransportLink::pair();
        tokio::spawn(pump(socket, outbound_rx, inbound_tx));
        Ok(link)
    }
}

/// Move frames between the socket and the link channels until either side ends
async fn pump(
    socket: Socket,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundFrame>,
    inbound_tx: mpsc::UnboundedSender<TransportEvent>,
) {
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => match frame {
                Some(OutboundFrame::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        warn!(target: "websocket_transport", "WebSocket write failed: {}", e);
                        let _ = inbound_tx.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
                // Close requested, or the client dropped the link
                Some(OutboundFrame::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    let _ = write.close().await;
                    debug!(target: "websocket_transport", "WebSocket closed locally");
                    break;
                }
            },

            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if inbound_tx.send(TransportEvent::Text(text.to_string())).is_err() {
                        // Nobody is listening any more
                        let _ = write.close().await;
                        break;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let info = frame.map(|f| CloseInfo {
                        code: u16::from(f.code),
                        reason: f.reason.to_string(),
                    });
                    debug!(target: "websocket_transport", "Peer closed WebSocket: {:?}", info);
                    // Flushes the close reply tungstenite queued for us
                    let _ = write.close().await;
                    let _ = inbound_tx.send(TransportEvent::Closed(info));
                    break;
                }
                Some(Ok(_)) => {
                    // Binary frames are not part of the protocol; ping/pong is answered by tungstenite
                }
                Some(Err(e)) => {
                    warn!(target: "websocket_transport", "WebSocket read failed: {}", e);
                    let _ = inbound_tx.send(TransportEvent::Error(e.to_string()));
                    break;
                }
                None => {
                    let _ = inbound_tx.send(TransportEvent::Closed(None));
                    break;
                }
            },
        }
    }
}
