//! Pre-roll clicks played before recording starts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::click::{ClickEmitter, ClickKind, ClickVoice};
use crate::time::{BEATS_PER_BAR, beat_duration};

/// A count-in of `bars` bars at `bpm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountIn {
    bars: u32,
    bpm: u32,
}

impl CountIn {
    pub fn new(bars: u32, bpm: u32) -> Self {
        Self { bars, bpm }
    }

    pub fn bars(&self) -> u32 {
        self.bars
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn beats(&self) -> u32 {
        self.bars * BEATS_PER_BAR
    }

    /// Time from the first click until completion: one full wait per beat.
    pub fn total_duration(&self) -> Duration {
        beat_duration(self.bpm) * self.beats()
    }

    /// Click every beat and wait one beat after each, including the last.
    pub async fn run(self, emitter: &dyn ClickEmitter, voice: ClickVoice) {
        let beat = beat_duration(self.bpm);
        for i in 0..self.beats() {
            let kind = ClickKind::for_beat(u64::from(i));
            log::trace!("count-in beat {}/{} ({kind:?})", i + 1, self.beats());
            emitter.emit(voice.click(kind));
            time::sleep(beat).await;
        }
    }

    /// Run on a spawned task that can be aborted through the returned handle.
    ///
    /// The task publishes the instant it completed, so a late observer can
    /// still tell when the count-in ended.
    pub fn spawn(self, emitter: Arc<dyn ClickEmitter>, voice: ClickVoice) -> CountInTask {
        let (done_tx, done_rx) = watch::channel(None);

        let task = tokio::spawn(async move {
            self.run(emitter.as_ref(), voice).await;
            let _ = done_tx.send(Some(Instant::now()));
        });

        log::debug!(
            "count-in: {} bar(s), {} beats at {} bpm",
            self.bars,
            self.beats(),
            self.bpm
        );

        CountInTask {
            count_in: self,
            task,
            done: done_rx,
        }
    }
}

/// Handle to a running count-in. Dropping it aborts the count-in.
#[derive(Debug)]
pub struct CountInTask {
    count_in: CountIn,
    task: JoinHandle<()>,
    done: watch::Receiver<Option<Instant>>,
}

impl CountInTask {
    pub fn count_in(&self) -> CountIn {
        self.count_in
    }

    /// When the last beat's wait elapsed, if it has.
    pub fn completed_at(&self) -> Option<Instant> {
        *self.done.borrow()
    }

    /// Non-blocking completion check.
    pub fn is_complete(&self) -> bool {
        self.completed_at().is_some()
    }

    /// Wait for the last beat's wait to elapse.
    ///
    /// Returns `false` if the count-in was aborted instead of completing.
    pub async fn finished(&mut self) -> bool {
        self.done.wait_for(Option::is_some).await.is_ok()
    }

    pub fn cancel(self) {
        // Drop aborts the task
    }
}

impl Drop for CountInTask {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::click::ClickLog;

    fn spawn(bars: u32, bpm: u32) -> (CountInTask, ClickLog) {
        let log = ClickLog::new();
        let task = CountIn::new(bars, bpm).spawn(Arc::new(log.clone()), ClickVoice::default());
        (task, log)
    }

    #[test]
    fn test_beats_and_duration() {
        let one = CountIn::new(1, 120);
        assert_eq!(one.beats(), 4);
        assert_eq!(one.total_duration(), Duration::from_secs(2));

        let two = CountIn::new(2, 60);
        assert_eq!(two.beats(), 8);
        assert_eq!(two.total_duration(), Duration::from_secs(8));

        assert_eq!(CountIn::new(0, 120).beats(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_bar_emits_four_clicks_then_completes() {
        let (mut task, log) = spawn(1, 120);
        let started = time::Instant::now();

        assert!(task.finished().await);

        assert_eq!(
            log.kinds(),
            vec![
                ClickKind::Accent,
                ClickKind::Plain,
                ClickKind::Plain,
                ClickKind::Plain
            ]
        );
        assert!(started.elapsed() >= Duration::from_millis(2_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_complete_until_last_wait_elapses() {
        let (mut task, log) = spawn(1, 120);

        // Last click lands at 1.5s, completion at 2.0s
        time::sleep(Duration::from_millis(1_600)).await;
        assert_eq!(log.len(), 4);
        assert!(!task.is_complete());

        time::sleep(Duration::from_millis(500)).await;
        assert!(task.is_complete());
        assert!(task.finished().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_instant_is_kept_for_late_readers() {
        let (task, _log) = spawn(1, 120);
        let started = time::Instant::now();

        time::sleep(Duration::from_secs(5)).await;
        let completed = task.completed_at().expect("complete");
        assert_eq!(completed - started, Duration::from_secs(2));
        assert_eq!(completed.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_bars_accent_each_downbeat() {
        let (mut task, log) = spawn(2, 240);
        assert!(task.finished().await);

        let kinds = log.kinds();
        assert_eq!(kinds.len(), 8);
        assert!(kinds[0].is_accent());
        assert!(kinds[4].is_accent());
        assert_eq!(kinds.iter().filter(|k| k.is_accent()).count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_remaining_clicks() {
        let (task, log) = spawn(2, 120);
        time::sleep(Duration::from_millis(600)).await;
        assert_eq!(log.len(), 2);

        task.cancel();
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(log.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_bars_completes_immediately() {
        let (mut task, log) = spawn(0, 120);
        assert!(task.finished().await);
        assert!(log.is_empty());
    }
}
