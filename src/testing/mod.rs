//! Testing utilities and mock implementations
//!
//! Lets the messaging client be driven without a network or a game server.

pub mod mocks;

pub use mocks::*;
