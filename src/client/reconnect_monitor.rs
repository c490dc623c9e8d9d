//! Pure reconnection decision logic for the messaging client
//!
//! This module contains pure functions for reconnection decision making and
//! connection state bookkeeping. The supervisor task in the client asks
//! these functions what to do and carries the answer out.

use super::connection::{ConnectionState, ReconnectPolicy};
use std::time::Duration;
use tracing::{error, info, warn};

/// Pure reconnection decision logic
pub struct ReconnectMonitor;

impl ReconnectMonitor {
    /// Determine if reconnection should be attempted (pure function)
    pub fn should_attempt_reconnection(
        current_attempts: u32,
        policy: &ReconnectPolicy,
        shutdown_requested: bool,
    ) -> ReconnectionDecision {
        if shutdown_requested {
            return ReconnectionDecision::AbortShutdownRequested;
        }

        if current_attempts >= policy.max_attempts {
            return ReconnectionDecision::AbortMaxAttemptsExceeded;
        }

        let attempt = current_attempts + 1;
        ReconnectionDecision::Proceed {
            attempt,
            delay: policy.delay_for_attempt(attempt),
        }
    }

    /// Check if connection state allows sending (pure function)
    pub fn can_send(state: &ConnectionState) -> bool {
        state.is_open()
    }

    /// Reason recorded once retries are exhausted
    pub fn exhausted_reason(policy: &ReconnectPolicy) -> String {
        format!(
            "Max reconnection attempts ({}) exceeded",
            policy.max_attempts
        )
    }

    /// Log connection state transition (pure logging function)
    pub fn log_state_transition(from: &ConnectionState, to: &ConnectionState) {
        match (from, to) {
            (ConnectionState::Connecting, ConnectionState::Open) => {
                info!("Connection established");
            }
            (ConnectionState::Open, ConnectionState::Closed(reason)) => {
                warn!("Connection lost: {}", reason);
            }
            (_, ConnectionState::Reconnecting(attempt)) => {
                info!("Scheduling reconnection attempt {}", attempt);
            }
            (ConnectionState::Reconnecting(_), ConnectionState::Open) => {
                info!("Reconnection successful");
            }
            (_, ConnectionState::Failed(reason)) => {
                error!("Connection permanently failed: {}", reason);
            }
            _ => {
                info!("Connection state: {:?} -> {:?}", from, to);
            }
        }
    }

    /// Validate reconnection policy (pure function)
    pub fn validate_policy(policy: &ReconnectPolicy) -> Result<(), String> {
        if policy.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }

        if policy.base_delay.is_zero() {
            return Err("base_delay must be greater than 0".to_string());
        }

        if policy.connect_timeout.is_zero() {
            return Err("connect_timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Decision result for reconnection attempts
#[derive(Debug, PartialEq)]
pub enum ReconnectionDecision {
    /// Wait `delay`, then make attempt number `attempt`
    Proceed { attempt: u32, delay: Duration },
    /// Abort reconnection - shutdown requested
    AbortShutdownRequested,
    /// Abort reconnection - max attempts exceeded
    AbortMaxAttemptsExceeded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_attempt_reconnection() {
        let policy = ReconnectPolicy::default();

        // First attempt waits the base delay
        let decision = ReconnectMonitor::should_attempt_reconnection(0, &policy, false);
        assert_eq!(
            decision,
            ReconnectionDecision::Proceed {
                attempt: 1,
                delay: Duration::from_millis(1000),
            }
        );

        // Should abort if shutdown requested
        let decision = ReconnectMonitor::should_attempt_reconnection(0, &policy, true);
        assert_eq!(decision, ReconnectionDecision::AbortShutdownRequested);

        // Fifth attempt
        let decision = ReconnectMonitor::should_attempt_reconnection(4, &policy, false);
        assert_eq!(
            decision,
            ReconnectionDecision::Proceed {
                attempt: 5,
                delay: Duration::from_millis(16000),
            }
        );

        // No sixth attempt
        let decision = ReconnectMonitor::should_attempt_reconnection(5, &policy, false);
        assert_eq!(decision, ReconnectionDecision::AbortMaxAttemptsExceeded);
    }

    #[test]
    fn test_shutdown_wins_over_exhaustion() {
        let policy = ReconnectPolicy::default();
        let decision = ReconnectMonitor::should_attempt_reconnection(5, &policy, true);
        assert_eq!(decision, ReconnectionDecision::AbortShutdownRequested);
    }

    #[test]
    fn test_can_send() {
        assert!(ReconnectMonitor::can_send(&ConnectionState::Open));
        assert!(!ReconnectMonitor::can_send(&ConnectionState::Idle));
        assert!(!ReconnectMonitor::can_send(&ConnectionState::Connecting));
        assert!(!ReconnectMonitor::can_send(&ConnectionState::Reconnecting(1)));
        assert!(!ReconnectMonitor::can_send(&ConnectionState::Closed(
            "test".to_string()
        )));
        assert!(!ReconnectMonitor::can_send(&ConnectionState::Failed(
            "test".to_string()
        )));
    }

    #[test]
    fn test_exhausted_reason() {
        let policy = ReconnectPolicy {
            max_attempts: 3,
            ..Default::default()
        };
        assert_eq!(
            ReconnectMonitor::exhausted_reason(&policy),
            "Max reconnection attempts (3) exceeded"
        );
    }

    #[test]
    fn test_validate_policy() {
        assert!(ReconnectMonitor::validate_policy(&ReconnectPolicy::default()).is_ok());

        let invalid = ReconnectPolicy {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(ReconnectMonitor::validate_policy(&invalid).is_err());

        let invalid = ReconnectPolicy {
            base_delay: Duration::ZERO,
            ..Default::default()
        };
        assert!(ReconnectMonitor::validate_policy(&invalid).is_err());

        let invalid = ReconnectPolicy {
            connect_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(ReconnectMonitor::validate_policy(&invalid).is_err());
    }
}
