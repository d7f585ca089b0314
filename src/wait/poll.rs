// ABOUTME: The polling loop every wait strategy runs on.
// ABOUTME: Deadline check, cancellable probe, cancellable sleep, repeat.

use super::{Readiness, WaitError};
use crate::types::ContainerId;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Run `probe` until it reports ready, fails terminally, the deadline passes,
/// or `cancel` fires.
///
/// A probe still running when the deadline passes is abandoned, so the wait
/// never outlasts `timeout` by more than scheduling delay. `NotReady` is
/// absorbed; any `Err` from the probe ends the wait immediately.
pub async fn poll_until_ready<F, Fut>(
    id: &ContainerId,
    timeout: Duration,
    poll_interval: Duration,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<(), WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Readiness, WaitError>>,
{
    let start = Instant::now();
    let deadline = start + timeout;
    let mut attempts: u32 = 0;

    let timed_out = |attempts: u32| {
        let elapsed = start.elapsed();
        tracing::debug!(container = %id.short(), attempts, ?elapsed, "wait timed out");
        WaitError::Timeout {
            id: id.clone(),
            elapsed,
        }
    };

    loop {
        if start.elapsed() > timeout {
            return Err(timed_out(attempts));
        }

        attempts += 1;
        // A probe that answers at the deadline still counts.
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WaitError::Cancelled { id: id.clone() }),
            outcome = probe() => outcome?,
            _ = tokio::time::sleep_until(deadline) => return Err(timed_out(attempts)),
        };

        match outcome {
            Readiness::Ready => {
                tracing::debug!(
                    container = %id.short(),
                    attempts,
                    elapsed = ?start.elapsed(),
                    "container ready"
                );
                return Ok(());
            }
            Readiness::NotReady(reason) => {
                tracing::trace!(container = %id.short(), attempts, %reason, "not ready yet");
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WaitError::Cancelled { id: id.clone() }),
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn id() -> ContainerId {
        ContainerId::new("0123456789abcdef")
    }

    #[tokio::test(start_paused = true)]
    async fn ready_on_first_probe_returns_immediately() {
        let cancel = CancellationToken::new();
        let result = poll_until_ready(
            &id(),
            Duration::from_secs(1),
            Duration::from_millis(100),
            &cancel,
            || async { Ok(Readiness::Ready) },
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn never_ready_times_out_after_deadline() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let start = Instant::now();

        let result = poll_until_ready(
            &id(),
            Duration::from_millis(1000),
            Duration::from_millis(100),
            &cancel,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(Readiness::NotReady("nope".to_string())) }
            },
        )
        .await;

        match result {
            Err(WaitError::Timeout { elapsed, .. }) => {
                assert!(elapsed > Duration::from_millis(1000));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(start.elapsed() < Duration::from_millis(1200));
        assert_eq!(calls.load(Ordering::SeqCst), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_check_is_abandoned_at_deadline() {
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let result = poll_until_ready(
            &id(),
            Duration::from_secs(1),
            Duration::from_millis(100),
            &cancel,
            || std::future::pending::<Result<Readiness, WaitError>>(),
        )
        .await;

        match result {
            Err(WaitError::Timeout { elapsed, .. }) => {
                assert!(elapsed >= Duration::from_secs(1));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(start.elapsed() < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_error_stops_polling() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = poll_until_ready(
            &id(),
            Duration::from_secs(10),
            Duration::from_millis(100),
            &cancel,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(WaitError::HealthCheckFailed { id: id() }) }
            },
        )
        .await;

        assert!(matches!(result, Err(WaitError::HealthCheckFailed { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_sleep() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = poll_until_ready(
            &id(),
            Duration::from_secs(10),
            Duration::from_secs(1),
            &cancel,
            || async { Ok(Readiness::NotReady("waiting".to_string())) },
        )
        .await;

        assert!(matches!(result, Err(WaitError::Cancelled { .. })));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
