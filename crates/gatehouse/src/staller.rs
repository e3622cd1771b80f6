//! Latency normalization for timing-sensitive work.
//!
//! Wraps a unit of work so its observable wall-clock cost is a constant
//! `unit_time` regardless of outcome, defeating timing side channels that
//! would distinguish a fast failure from a slow success.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

/// Result of a stalled unit of work
#[derive(Debug)]
pub struct StallOutcome<T> {
    /// False when the cutoff fired before the work finished
    pub completed: bool,

    /// The work's result, absent on cutoff
    pub result: Option<T>,
}

/// Constant-latency wrapper around arbitrary work
pub struct Staller {
    unit_time: Duration,
    stall_if_successful: bool,
    cut_if_delayed: bool,
}

impl Staller {
    pub fn new(unit_time: Duration, stall_if_successful: bool, cut_if_delayed: bool) -> Self {
        Self {
            unit_time,
            stall_if_successful,
            cut_if_delayed,
        }
    }

    /// Run `work`, normalizing its observable latency to `unit_time`.
    ///
    /// In cutoff mode the work runs as a spawned task; when it overruns the
    /// budget the task is aborted and an incomplete outcome is returned
    /// immediately. The abort is advisory: the task stops at its next await
    /// point, and purely blocking sections keep running in the background
    /// until they finish. That stray work is an accepted trade-off.
    ///
    /// Without cutoff the work always runs to completion. Afterwards, a
    /// failed result (or any result, when `stall_if_successful` is set)
    /// sleeps away whatever remains of the budget.
    pub async fn stall<T, F>(&self, work: F, succeeded: impl Fn(&T) -> bool) -> StallOutcome<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let started = Instant::now();

        let outcome = if self.cut_if_delayed {
            let mut handle = tokio::spawn(work);
            match timeout(self.unit_time, &mut handle).await {
                Ok(Ok(result)) => StallOutcome {
                    completed: true,
                    result: Some(result),
                },
                Ok(Err(join_error)) => {
                    tracing::error!(error = %join_error, "Stalled work aborted abnormally");
                    StallOutcome {
                        completed: false,
                        result: None,
                    }
                }
                Err(_) => {
                    handle.abort();
                    tracing::debug!(
                        budget_ms = self.unit_time.as_millis() as u64,
                        "Work overran the stall budget"
                    );
                    StallOutcome {
                        completed: false,
                        result: None,
                    }
                }
            }
        } else {
            StallOutcome {
                completed: true,
                result: Some(work.await),
            }
        };

        let needs_stall = match &outcome.result {
            Some(result) => !succeeded(result) || self.stall_if_successful,
            None => true,
        };

        if needs_stall {
            let elapsed = started.elapsed();
            if elapsed < self.unit_time {
                sleep(self.unit_time - elapsed).await;
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn cutoff_returns_incomplete_at_the_budget() {
        let staller = Staller::new(UNIT, false, true);
        let started = Instant::now();

        let outcome = staller
            .stall(
                async {
                    sleep(Duration::from_millis(500)).await;
                    true
                },
                |ok| *ok,
            )
            .await;

        assert!(!outcome.completed);
        assert!(outcome.result.is_none());
        let elapsed = started.elapsed();
        assert!(elapsed >= UNIT && elapsed < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_without_cutoff_sleeps_out_the_budget() {
        let staller = Staller::new(UNIT, false, false);
        let started = Instant::now();

        let outcome = staller
            .stall(
                async {
                    sleep(Duration::from_millis(20)).await;
                    false
                },
                |ok| *ok,
            )
            .await;

        assert!(outcome.completed);
        assert_eq!(outcome.result, Some(false));
        assert!(started.elapsed() >= UNIT);
    }

    #[tokio::test(start_paused = true)]
    async fn fast_success_returns_early_by_default() {
        let staller = Staller::new(UNIT, false, true);
        let started = Instant::now();

        let outcome = staller.stall(async { true }, |ok| *ok).await;

        assert!(outcome.completed);
        assert_eq!(outcome.result, Some(true));
        assert!(started.elapsed() < UNIT);
    }

    #[tokio::test(start_paused = true)]
    async fn success_is_stalled_when_configured() {
        let staller = Staller::new(UNIT, true, true);
        let started = Instant::now();

        let outcome = staller.stall(async { true }, |ok| *ok).await;

        assert!(outcome.completed);
        assert!(started.elapsed() >= UNIT);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_success_within_budget_completes() {
        let staller = Staller::new(UNIT, false, true);

        let outcome = staller
            .stall(
                async {
                    sleep(Duration::from_millis(50)).await;
                    true
                },
                |ok| *ok,
            )
            .await;

        assert!(outcome.completed);
        assert_eq!(outcome.result, Some(true));
    }
}
