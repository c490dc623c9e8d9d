//! Transport layer for game room messaging
//!
//! A [`Connector`] opens one bidirectional text-frame link to an address.
//! The link is a pair of channels so the client never touches the socket
//! directly; the production WebSocket implementation runs a pump task per
//! link, and tests swap in a scripted connector.

use thiserror::Error;
use tokio::sync::mpsc;

pub mod websocket;

pub use websocket::WebSocketConnector;

/// Frame queued for transmission
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    /// Close the link cleanly
    Close,
}

/// Close code and reason reported by the peer
#[derive(Debug, Clone, PartialEq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

/// Something that happened on the inbound side of a link
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Whole text frame
    Text(String),
    /// Peer closed the link
    Closed(Option<CloseInfo>),
    /// Read failed; the link is unusable afterwards
    Error(String),
}

impl TransportEvent {
    /// True when no more events will follow on this link
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportEvent::Closed(_) | TransportEvent::Error(_))
    }
}

/// An open link. Dropping `outbound` closes it.
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportLink {
    /// Build a link plus the far ends of its channels
    pub fn pair() -> (
        Self,
        mpsc::UnboundedReceiver<OutboundFrame>,
        mpsc::UnboundedSender<TransportEvent>,
    ) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        (
            Self {
                outbound: outbound_tx,
                inbound: inbound_rx,
            },
            outbound_rx,
            inbound_tx,
        )
    }
}

/// Transport errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("Failed to open transport: {0}")]
    Connect(String),
    #[error("Transport closed")]
    Closed,
}

/// Opens transport links
///
/// Implemented by the WebSocket transport and by test doubles, so the client
/// can be driven without a network.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a link to `address`; resolves once the transport reports open
    async fn connect(&self, address: &str) -> Result<TransportLink, TransportError>;
}
