//! Reconnecting pub/sub messaging client
//!
//! Pure decision logic (`connection`, `reconnect_monitor`, `message_handler`,
//! `registry`) is kept apart from the task that performs I/O
//! (`messaging_client`).

pub mod connection;
pub mod message_handler;
pub mod messaging_client;
pub mod reconnect_monitor;
pub mod registry;

pub use connection::{ConnectionState, ReconnectPolicy};
pub use message_handler::{DispatchReport, EventRoute, MessageHandler};
pub use messaging_client::MessagingClient;
pub use reconnect_monitor::{ReconnectMonitor, ReconnectionDecision};
pub use registry::{handler, Handler, HandlerResult, SubscriberRegistry};
