//! Polling helper for capabilities that wait on remote readiness.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

/// Outcome of a [`wait_for`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The condition became true.
    Ready,
    /// The deadline passed first.
    TimedOut,
    /// The cancellation signal fired first.
    Canceled,
}

/// Poll `condition` every `poll_interval` until it returns true, the
/// `max_duration` deadline passes, or `cancel` flips to true.
pub async fn wait_for<C, Fut>(
    mut condition: C,
    poll_interval: Duration,
    max_duration: Duration,
    mut cancel: watch::Receiver<bool>,
) -> WaitOutcome
where
    C: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = time::Instant::now() + max_duration;

    loop {
        if condition().await {
            return WaitOutcome::Ready;
        }
        if time::Instant::now() >= deadline {
            return WaitOutcome::TimedOut;
        }
        tokio::select! {
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    return WaitOutcome::Canceled;
                }
            }
            _ = time::sleep(poll_interval) => {}
        }
    }
}
