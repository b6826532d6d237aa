//! Bounded retry policy for the generation HTTP calls.

use std::time::Duration;

/// Doubling backoff, capped. A server-provided `retry-after` hint takes
/// precedence over the computed delay.
#[derive(Debug, Clone)]
pub struct GenRetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for GenRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl GenRetryConfig {
    /// Disable retries entirely (a hang here stalls a chat reply, nothing
    /// else, so some callers prefer failing fast into the fallback text).
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retrying `attempt` (1-based). The delay doubles per
    /// attempt up to the cap.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        if let Some(hinted) = hint {
            return hinted;
        }
        let doublings = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << doublings)
            .min(self.max_delay)
    }
}
