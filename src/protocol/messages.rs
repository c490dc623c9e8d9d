//! Envelope and payload types for game room messaging
//!
//! The envelope is the only fixed part of the wire format. Payloads are
//! whatever JSON the sender puts in `data`; the structs below describe the
//! ones the game room page produces and consumes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single frame on the wire: `{ "type": ..., "data": ... }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Wrap a typed payload in an envelope
    pub fn new<T: Serialize + ?Sized>(
        message_type: &str,
        data: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            message_type: message_type.to_string(),
            data: serde_json::to_value(data)?,
        })
    }

    /// Envelope carrying raw JSON
    pub fn raw(message_type: &str, data: Value) -> Self {
        Self {
            message_type: message_type.to_string(),
            data,
        }
    }

    /// Parse a text frame. Fails on non-JSON, on anything but a JSON object,
    /// and on a missing `type`.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom("envelope must be a JSON object"));
        }
        Self::deserialize(value)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode `data` into a typed payload
    pub fn decode_data<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

/// Chat line in a game room
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
}

/// One row of the room's player list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerSummary {
    pub id: Value,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub status: String,
}

/// Full replacement of the room's player list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerUpdate {
    pub players: Vec<PlayerSummary>,
}

/// Game status change, e.g. "waiting" to "playing"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameStatusUpdate {
    pub status: String,
}
