//! Retry ceiling and backoff for throttled requests.
//!
//! Only throttling responses are retried (see [`crate::rate_limit`]). When
//! the server suggests a delay it is used; otherwise the [`Backoff`] decides.

use rand::Rng;
use std::time::Duration;

/// How many times a throttled request is attempted, and how long to wait in between.
///
/// # Examples
///
/// ```
/// use stratus::{Backoff, RetryPolicy};
/// use std::time::Duration;
///
/// // Up to 4 attempts, 250ms apart
/// let policy = RetryPolicy::new(4, Backoff::Fixed(Duration::from_millis(250)));
/// assert!(policy.should_retry(3));
/// assert!(!policy.should_retry(4));
///
/// // Never retry
/// assert!(!RetryPolicy::none().should_retry(1));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Ceiling on total attempts, the first one included. Values below 1 act as 1.
    pub max_attempts: usize,
    /// Delay used when the server gives no hint.
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Creates a policy with the given ceiling and backoff.
    pub fn new(max_attempts: usize, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// A policy that makes a single attempt.
    pub fn none() -> Self {
        Self::new(1, Backoff::default())
    }

    /// Returns `true` if another attempt may follow attempt number `attempt` (1-indexed).
    pub fn should_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Backoff::default())
    }
}

/// Delay between throttled attempts when the server does not suggest one.
#[derive(Debug, Clone)]
pub enum Backoff {
    /// The same delay before every retry.
    Fixed(Duration),

    /// `initial_delay * 2^(retry - 1)`, capped at `max_delay`.
    ///
    /// With `jitter` the delay is scaled by a random factor in `[0.5, 1.0]`
    /// so that throttled clients do not return in lockstep.
    Exponential {
        /// Delay before the first retry.
        initial_delay: Duration,
        /// Upper bound for any single delay.
        max_delay: Duration,
        /// Whether to randomise delays.
        jitter: bool,
    },

    /// Delay computed by a function of the retry number (1-indexed).
    Custom(fn(retry: usize) -> Duration),
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Returns the delay before retry number `retry` (1 = first retry).
    pub fn delay_for_retry(&self, retry: usize) -> Duration {
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential {
                initial_delay,
                max_delay,
                jitter,
            } => {
                let exponent = u32::try_from(retry.saturating_sub(1)).unwrap_or(u32::MAX);
                let multiplier = 2u32.saturating_pow(exponent);
                let delay = initial_delay.saturating_mul(multiplier).min(*max_delay);

                if *jitter {
                    let factor = rand::thread_rng().gen_range(0.5..=1.0);
                    delay.mul_f64(factor)
                } else {
                    delay
                }
            }
            Backoff::Custom(delay_fn) => delay_fn(retry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_delays() {
        let backoff = Backoff::Exponential {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            jitter: false,
        };

        assert_eq!(backoff.delay_for_retry(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_retry(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for_retry(3), Duration::from_millis(400));
        assert_eq!(backoff.delay_for_retry(4), Duration::from_millis(800));
        assert_eq!(backoff.delay_for_retry(5), Duration::from_secs(1));
        assert_eq!(backoff.delay_for_retry(64), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let backoff = Backoff::Exponential {
            initial_delay: Duration::from_millis(400),
            max_delay: Duration::from_secs(10),
            jitter: true,
        };

        for _ in 0..100 {
            let delay = backoff.delay_for_retry(1);
            assert!(delay >= Duration::from_millis(200) && delay <= Duration::from_millis(400));
        }
    }

    #[test]
    fn test_fixed_and_custom() {
        assert_eq!(
            Backoff::Fixed(Duration::from_secs(1)).delay_for_retry(7),
            Duration::from_secs(1)
        );

        let custom = Backoff::Custom(|retry| Duration::from_millis(10 * retry as u64));
        assert_eq!(custom.delay_for_retry(3), Duration::from_millis(30));
    }

    #[test]
    fn test_ceiling() {
        let policy = RetryPolicy::new(3, Backoff::Fixed(Duration::ZERO));
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));

        let zero = RetryPolicy::new(0, Backoff::Fixed(Duration::ZERO));
        assert!(!zero.should_retry(1));
    }
}
