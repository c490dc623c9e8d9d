//! Error types for the messaging client
//!
//! `ClientError` covers everything the public client API can report.
//! `HandlerError` is what a subscriber returns when it could not process a
//! message; those never escape the client, they are logged and isolated.

use crate::client::ConnectionState;
use crate::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Main error type for messaging client operations
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Connection did not open within {0:?}")]
    ConnectTimeout(Duration),

    #[error("Client already has a live connection")]
    AlreadyConnected,

    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid message type: {0}")]
    InvalidMessageType(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl ClientError {
    /// Create connection failed error
    pub fn connection_failed<S: Into<String>>(message: S) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Create invalid message type error
    pub fn invalid_message_type<S: Into<String>>(message: S) -> Self {
        Self::InvalidMessageType(message.into())
    }

    /// Create invalid address error
    pub fn invalid_address<S: Into<String>>(message: S) -> Self {
        Self::InvalidAddress(message.into())
    }

    /// True for failures that happened before the transport ever opened
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            ClientError::ConnectionFailed { .. }
                | ClientError::ConnectTimeout(_)
                | ClientError::Transport(TransportError::Connect(_))
        )
    }
}

/// Failure reported by a single message handler
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Handler failed: {0}")]
    Failed(String),

    #[error("Failed to decode message data: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self::Failed(message.into())
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
