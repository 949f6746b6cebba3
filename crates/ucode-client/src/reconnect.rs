//! Bounded flat-interval reconnect policy.
//!
//! Every abnormal close waits the same fixed delay before the next attempt.
//! The delay does not grow between attempts.

use std::time::Duration;

/// Default reconnect budget.
pub const DEFAULT_MAX_RECONNECTS: u32 = 3;
/// Default delay before each reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);
/// Close codes that end a session without reconnecting by default.
pub const DEFAULT_TERMINAL_CLOSE_CODES: [u16; 4] = [1000, 1008, 4001, 4002];

/// What to do after the transport closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Graceful or policy close: go idle, never reconnect.
    Terminal,
    /// Schedule reconnect attempt number `attempt` after `delay`.
    Retry {
        /// 1-based attempt number.
        attempt: u32,
        /// Wait before reconnecting.
        delay: Duration,
    },
    /// Budget spent: surface the failure.
    Exhausted,
}

/// Reconnect parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts allowed after consecutive abnormal closes.
    pub max_attempts: u32,
    /// Flat delay before each attempt.
    pub delay: Duration,
    /// Close codes treated as terminal.
    pub terminal_close_codes: Vec<u16>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECTS,
            delay: DEFAULT_RECONNECT_DELAY,
            terminal_close_codes: DEFAULT_TERMINAL_CLOSE_CODES.to_vec(),
        }
    }
}

impl ReconnectPolicy {
    /// Decide how to react to a close.
    ///
    /// `code` is `None` when the transport ended without a close frame or
    /// never opened. `attempts` counts reconnects already made since the last
    /// successful open.
    #[must_use]
    pub fn on_close(&self, code: Option<u16>, attempts: u32) -> CloseDisposition {
        if code.is_some_and(|c| self.is_terminal(c)) {
            return CloseDisposition::Terminal;
        }
        if attempts < self.max_attempts {
            CloseDisposition::Retry {
                attempt: attempts + 1,
                delay: self.delay,
            }
        } else {
            CloseDisposition::Exhausted
        }
    }

    /// Whether `code` ends the session without reconnecting.
    #[must_use]
    pub fn is_terminal(&self, code: u16) -> bool {
        self.terminal_close_codes.contains(&code)
    }
}
