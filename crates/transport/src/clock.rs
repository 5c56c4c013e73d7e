//! Periodic timer used by the metronome.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Repeating timer backed by a spawned Tokio task.
///
/// All firings run in order on that one task, so a callback always returns
/// before the next one starts. Late firings are delayed rather than bunched
/// up, which means the period drifts under load instead of catching up.
///
/// The timer stops when cancelled or dropped. Must be started from within a
/// Tokio runtime.
pub struct PeriodicTimer {
    period: Duration,
    task: JoinHandle<()>,
}

impl PeriodicTimer {
    /// Start firing one `period` from now.
    ///
    /// `on_tick` receives a zero-based firing count.
    pub fn start<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(u64) + Send + 'static,
    {
        // tokio rejects a zero period
        let period = period.max(Duration::from_millis(1));
        let first = Instant::now() + period;

        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut count: u64 = 0;
            loop {
                interval.tick().await;
                on_tick(count);
                count += 1;
            }
        });

        Self { period, task }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn cancel(self) {
        // Drop aborts the task
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for PeriodicTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTimer")
            .field("period", &self.period)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}
