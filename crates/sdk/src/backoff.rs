//! Backoff computation for reconnects and transaction retries.

use std::time::Duration;

use rand::Rng;

use crate::config::ReconnectPolicy;

/// Apply jitter to a duration.
///
/// Jitter adds randomness in the range `[dur * (1 - factor),
/// dur * (1 + factor)]` to prevent thundering herd when multiple clients
/// retry simultaneously.
pub(crate) fn apply_jitter(dur: Duration, factor: f64) -> Duration {
    if factor <= 0.0 {
        return dur;
    }

    let factor = factor.clamp(0.0, 1.0);
    let mut rng = rand::rng();

    let base_nanos = dur.as_nanos() as f64;
    let min_nanos = base_nanos * (1.0 - factor);
    let max_nanos = base_nanos * (1.0 + factor);

    let jittered_nanos = rng.random_range(min_nanos..=max_nanos);
    Duration::from_nanos(jittered_nanos as u64)
}

/// The delay before reconnect attempt `attempt` (0-based), following the
/// policy's exponential schedule with jitter.
pub(crate) fn reconnect_delay(policy: &ReconnectPolicy, attempt: u32) -> Duration {
    let factor = policy.multiplier.max(1.0).powi(attempt.min(16) as i32);
    let nanos = (policy.initial_backoff.as_nanos() as f64 * factor)
        .min(policy.max_backoff.as_nanos() as f64);
    apply_jitter(Duration::from_nanos(nanos as u64).min(policy.max_backoff), policy.jitter)
        .min(policy.max_backoff)
}

/// The delay before re-running a conflicted transaction.
///
/// Quadratic in the attempt number with full-range randomness, so two
/// transactions that keep colliding separate quickly; capped well below
/// the reconnect schedule since conflicts resolve in milliseconds.
pub(crate) fn conflict_delay(attempt: u32) -> Duration {
    let cap = u64::from(attempt.min(16) + 1).pow(2).min(256);
    Duration::from_millis(rand::rng().random_range(0..=cap))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn zero_jitter_is_identity() {
        let dur = Duration::from_millis(100);
        assert_eq!(apply_jitter(dur, 0.0), dur);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let dur = Duration::from_millis(1000);
        for _ in 0..100 {
            let jittered = apply_jitter(dur, 0.25).as_millis();
            assert!((750..=1250).contains(&jittered), "jittered {jittered}ms out of bounds");
        }
    }

    #[test]
    fn reconnect_schedule_doubles_to_the_cap() {
        let policy = ReconnectPolicy {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.0,
        };
        assert_eq!(reconnect_delay(&policy, 0), Duration::from_secs(1));
        assert_eq!(reconnect_delay(&policy, 1), Duration::from_secs(2));
        assert_eq!(reconnect_delay(&policy, 2), Duration::from_secs(4));
        assert_eq!(reconnect_delay(&policy, 3), Duration::from_secs(8));
        // Capped from the fourth attempt onwards.
        assert_eq!(reconnect_delay(&policy, 4), Duration::from_secs(10));
        assert_eq!(reconnect_delay(&policy, 10), Duration::from_secs(10));
    }

    #[test]
    fn conflict_delay_is_bounded() {
        for attempt in 0..32 {
            let delay = conflict_delay(attempt);
            assert!(delay <= Duration::from_millis(256));
        }
    }
}
