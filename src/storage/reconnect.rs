//! Linear reconnect backoff for the cache link.

use std::time::Duration;

/// Default backoff step.
pub const DEFAULT_STEP: Duration = Duration::from_millis(100);

/// Default backoff cap.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(3_000);

/// Reconnect backoff policy.
///
/// Maps an attempt count to a delay: `min(attempts * step, max_delay)`.
/// The attempt counter itself belongs to the reconnect loop; the policy is
/// stateless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    step: Duration,
    max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl ReconnectPolicy {
    /// Creates a policy with the given step and cap.
    #[must_use]
    pub const fn new(step: Duration, max_delay: Duration) -> Self {
        Self { step, max_delay }
    }

    /// Sets the step.
    #[must_use]
    pub const fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    /// Sets the cap.
    #[must_use]
    pub const fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Returns the step.
    #[must_use]
    pub const fn step(&self) -> Duration {
        self.step
    }

    /// Returns the cap.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay before reconnect attempt number `attempts`.
    #[must_use]
    pub fn delay(&self, attempts: u32) -> Duration {
        self.step.saturating_mul(attempts).min(self.max_delay)
    }
}
