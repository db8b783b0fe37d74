use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::debug;

/// Runs jobs one after another, with a pause between them.
pub struct Scheduler {
    interval: Duration,
    count: Option<u64>,
}

impl Scheduler {
    /// `count == None` runs until shutdown.
    pub fn new(interval: Duration, count: Option<u64>) -> Self {
        Self { interval, count }
    }

    /// Await `job` repeatedly and hand each output to `sink`.
    ///
    /// Shutdown is only looked at between jobs, so a job that has started
    /// always runs to completion. Returns the number of jobs run.
    pub async fn run<J, F, T, S>(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        mut job: J,
        mut sink: S,
    ) -> u64
    where
        J: FnMut() -> F,
        F: Future<Output = T>,
        S: FnMut(T),
    {
        let mut runs = 0;
        loop {
            if *shutdown.borrow() {
                debug!(runs, "shutdown requested");
                break;
            }

            sink(job().await);
            runs += 1;

            if self.count.is_some_and(|count| runs >= count) {
                break;
            }
            if self.interval.is_zero() {
                continue;
            }
            tokio::select! {
                _ = sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    // A dropped sender can never ask for shutdown; keep the
                    // remaining interval.
                    if changed.is_err() {
                        sleep(self.interval).await;
                    }
                }
            }
        }
        runs
    }
}
