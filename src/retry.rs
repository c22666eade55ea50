//! Backoff policy for the transport's unavailable-status retries.

use std::time::Duration;

/// Governs how the transport backs off when the platform answers with its
/// temporarily-unavailable status.
///
/// The delay before retry *n* (0-indexed) is
/// `initial_delay + n * delay_increment`, so the schedule is linear and
/// non-decreasing. The policy is immutable and injected through
/// [`ClientConfig`](crate::ClientConfig); each call owns its own retry
/// counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Added to the delay for each further retry.
    pub delay_increment: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            delay_increment: Duration::ZERO,
        }
    }

    /// Returns the delay to sleep before the next retry, given how many
    /// retries have already been used.
    pub fn delay_for(&self, used_retries: u32) -> Duration {
        self.initial_delay + self.delay_increment * used_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            delay_increment: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_schedule() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            delay_increment: Duration::from_millis(50),
        };

        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(150));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    }

    #[test]
    fn schedule_is_non_decreasing() {
        let policy = RetryPolicy::default();
        let mut previous = Duration::ZERO;
        for used in 0..policy.max_retries {
            let delay = policy.delay_for(used);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn none_never_waits() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.delay_for(0), Duration::ZERO);
    }
}
