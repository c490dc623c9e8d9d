//! Message-type tags and their validation
//!
//! Subscribers are keyed by a free-form string tag. The protocol is not a
//! closed set, so tags are checked at runtime instead of being an enum.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Chat line posted in a game room
pub const CHAT: &str = "chat";
/// Player list changed (join, leave, role pick)
pub const PLAYER_UPDATE: &str = "playerUpdate";
/// Game moved between waiting / in progress / finished
pub const GAME_STATUS_UPDATE: &str = "gameStatusUpdate";

/// The message types the game room page listens for
pub const GAME_ROOM_TYPES: [&str; 3] = [CHAT, PLAYER_UPDATE, GAME_STATUS_UPDATE];

pub const MAX_MESSAGE_TYPE_LEN: usize = 64;

static MESSAGE_TYPE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.:-]*$").expect("static pattern is valid"));

pub fn validate_message_type(message_type: &str) -> Result<(), ValidationError> {
    if message_type.is_empty() {
        return Err(ValidationError::EmptyMessageType);
    }

    if message_type.len() > MAX_MESSAGE_TYPE_LEN {
        return Err(ValidationError::MessageTypeTooLong(message_type.len()));
    }

    if !MESSAGE_TYPE_PATTERN.is_match(message_type) {
        return Err(ValidationError::InvalidMessageType(
            message_type.to_string(),
        ));
    }

    Ok(())
}

/// Validation errors for message-type tags
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Message type cannot be empty")]
    EmptyMessageType,
    #[error("Message type is {0} bytes, limit is 64")]
    MessageTypeTooLong(usize),
    #[error("Message type '{0}' must match [A-Za-z][A-Za-z0-9_.:-]*")]
    InvalidMessageType(String),
}
