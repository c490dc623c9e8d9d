//! Wire protocol for game room messaging
//!
//! Every frame on the wire is a single JSON envelope `{ "type", "data" }`.
//! This module holds the envelope, the message-type tag rules, the typed
//! payloads the game room exchanges, and endpoint address helpers.

pub mod endpoint;
pub mod message_types;
pub mod messages;

pub use endpoint::{game_room_url, validate_ws_url, EndpointError};
pub use message_types::{validate_message_type, ValidationError};
pub use messages::*;
