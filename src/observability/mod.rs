//! Observability for the messaging client
//!
//! Structured logging only; every module logs through `tracing` and the
//! binary installs the subscriber at startup.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};

// Span macros for structured logging
pub use logging::{connection_span, lifecycle_span};
