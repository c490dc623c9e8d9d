//! Pure connection state and backoff policy
//!
//! Nothing in here touches the network; the client reads these types to
//! decide what to do next.

use std::time::Duration;

/// Connection state of a messaging client
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// No transport handle yet
    Idle,
    /// Initial open in progress
    Connecting,
    /// Transport open; sends are transmitted
    Open,
    /// Waiting for or running reconnect attempt N
    Reconnecting(u32),
    /// Transport closed, with reason
    Closed(String),
    /// Reconnect attempts exhausted; terminal until the next explicit connect
    Failed(String),
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ConnectionState::Failed(_))
    }
}

/// Reconnection backoff policy
///
/// Attempt `n` (1-based) waits `base_delay * 2^(n-1)`; after `max_attempts`
/// consecutive failures the client stops retrying.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
    /// Upper bound on a single open handshake
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_attempts: 5,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based; 0 is treated as 1)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // 2^31 already saturates any practical base delay
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Sum of all backoff delays if every attempt fails
    pub fn total_backoff(&self) -> Duration {
        (1..=self.max_attempts)
            .map(|attempt| self.delay_for_attempt(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}
