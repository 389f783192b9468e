//! Polling assertions for eventually-consistent test state.

use std::time::Duration;

/// Polls `condition` every few milliseconds until it returns true or
/// `timeout` elapses. Returns whether the condition became true.
pub async fn assert_eventually<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
