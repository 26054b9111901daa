#[cfg(feature = "defmt")]
use defmt::info;
use embassy_time::{Duration, Instant, Timer};
#[cfg(not(feature = "defmt"))]
use log::info;

/// Progress of a pending [`Waiter::wait_for`] call.
#[derive(Clone, Copy, Debug)]
pub struct WaitProgress<'a> {
    /// Description of the awaited condition.
    pub name: &'a str,
    pub elapsed: Duration,
    pub timeout: Duration,
}

/// Waits for a condition by polling it.
///
/// The condition is polled every `poll` interval. If it stays unresolved, a progress report is
/// emitted every `report` interval. Once resolved, the waiter sleeps for `settle` more, so that
/// lines trailing the awaited one are processed before the caller continues.
///
/// Each poll is an `.await` point, so the task feeding `AtRxBroker` keeps running on the same
/// executor. Waiting cannot be cancelled, it ends on success or at the timeout.
#[derive(Clone, Copy, Debug)]
pub struct Waiter {
    poll: Duration,
    report: Duration,
    settle: Duration,
}

impl Default for Waiter {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(10),
            report: Duration::from_secs(1),
            settle: Duration::from_millis(100),
        }
    }
}

impl Waiter {
    pub fn new(poll: Duration, report: Duration, settle: Duration) -> Self {
        Self {
            poll,
            report,
            settle,
        }
    }

    /// Waits until `condition` holds or `timeout` elapses, logging progress.
    ///
    /// Returns the value of `condition` evaluated at the end, so a condition that became true
    /// just at the deadline is still a success.
    pub async fn wait_for(
        &self,
        condition: impl FnMut() -> bool,
        name: &str,
        timeout: Duration,
    ) -> bool {
        self.wait_for_with_progress(condition, name, timeout, |progress| {
            info!(
                "WAIT_FOR({}, {}/{})",
                progress.name,
                progress.elapsed.as_millis(),
                progress.timeout.as_millis()
            );
        })
        .await
    }

    /// Same as [`Waiter::wait_for`], but progress reports are handed to `on_progress`.
    pub async fn wait_for_with_progress(
        &self,
        mut condition: impl FnMut() -> bool,
        name: &str,
        timeout: Duration,
        mut on_progress: impl FnMut(&WaitProgress),
    ) -> bool {
        let start = Instant::now();
        let mut last_report = start;
        while !condition() && start.elapsed() < timeout {
            Timer::after(self.poll).await;
            if last_report.elapsed() > self.report {
                on_progress(&WaitProgress {
                    name,
                    elapsed: start.elapsed(),
                    timeout,
                });
                last_report = Instant::now();
            }
        }

        let done = condition();
        if done {
            Timer::after(self.settle).await;
        }
        done
    }
}

#[cfg(feature = "std")]
#[cfg(test)]
mod test_wait {
    use super::*;
    use core::cell::Cell;
    use embassy_futures::block_on;

    #[test]
    fn test_timeout_reports_progress() {
        let waiter = Waiter::default();
        let mut reports = 0;
        let start = Instant::now();
        let done = block_on(waiter.wait_for_with_progress(
            || false,
            "never",
            Duration::from_millis(1200),
            |progress| {
                assert_eq!(progress.name, "never");
                assert_eq!(progress.timeout, Duration::from_millis(1200));
                reports += 1;
            },
        ));
        assert!(!done);
        assert!(start.elapsed() >= Duration::from_millis(1200));
        assert!(reports >= 1);
    }

    #[test]
    fn test_short_timeout_does_not_report() {
        let waiter = Waiter::default();
        let mut reports = 0;
        let done = block_on(waiter.wait_for_with_progress(
            || false,
            "never",
            Duration::from_millis(50),
            |_| reports += 1,
        ));
        assert!(!done);
        assert_eq!(reports, 0);
    }

    #[test]
    fn test_resolves_after_polls() {
        let waiter = Waiter::new(
            Duration::from_millis(1),
            Duration::from_secs(1),
            Duration::from_millis(20),
        );
        let polls = Cell::new(0);
        let start = Instant::now();
        let done = block_on(waiter.wait_for(
            || {
                polls.set(polls.get() + 1);
                polls.get() >= 5
            },
            "five polls",
            Duration::from_secs(1),
        ));
        assert!(done);
        assert!(polls.get() >= 5);
        // Settle delay is applied after success
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_true_at_deadline() {
        let waiter = Waiter::new(
            Duration::from_millis(5),
            Duration::from_secs(1),
            Duration::from_millis(0),
        );
        let start = Instant::now();
        let deadline = Duration::from_millis(30);
        // Only the final evaluation after the deadline sees the condition as true
        let done = block_on(waiter.wait_for(
            || start.elapsed() >= deadline,
            "deadline",
            deadline,
        ));
        assert!(done);
    }
}
