//! Mystery Link - real-time messaging client for murder-mystery game rooms
//!
//! A reconnecting pub/sub client over WebSocket. Messages are JSON envelopes
//! `{ "type": ..., "data": ... }`; subscribers register per message type and
//! run in registration order. An unexpected close is retried with exponential
//! backoff until a fixed attempt cap, after which the client reports a
//! permanent failure.
//!
//! # Overview
//!
//! - `client` - the messaging client, its subscriber registry and the pure
//!   reconnection logic
//! - `transport` - the `Connector` seam and the WebSocket implementation
//! - `protocol` - envelope, message type validation and game room payloads
//! - `config` - TOML configuration
//! - `observability` - structured logging
//! - `testing` - scripted mock transport
//!
//! # Quick Start
//!
//! ```rust
//! use mystery_link::protocol::{message_types, ChatMessage, Envelope};
//!
//! let chat = ChatMessage {
//!     sender: "Admin".to_string(),
//!     content: "The butler was in the library".to_string(),
//!     game_id: Some("1".to_string()),
//! };
//!
//! let envelope = Envelope::new(message_types::CHAT, &chat).unwrap();
//! let wire = envelope.to_json().unwrap();
//! assert!(wire.contains(r#""type":"chat""#));
//!
//! let decoded: ChatMessage = Envelope::parse(&wire).unwrap().decode_data().unwrap();
//! assert_eq!(decoded, chat);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod testing;
pub mod transport;

pub use client::{
    handler, ConnectionState, Handler, HandlerResult, MessagingClient, ReconnectPolicy,
};
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, ClientResult, HandlerError};
pub use protocol::*;
pub use transport::{Connector, TransportError, WebSocketConnector};
