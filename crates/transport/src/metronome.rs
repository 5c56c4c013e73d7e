//! Free-running click track.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::click::{ClickEmitter, ClickKind, ClickVoice};
use crate::clock::PeriodicTimer;
use crate::time::beat_interval;

/// Metronome controller.
///
/// `enabled` is the user's toggle. The click stream itself only runs between
/// [`Metronome::start`] and [`Metronome::stop`], and never while the host
/// view is hidden. Every start resets the beat counter, so the first click
/// after a (re)start is always accented.
pub struct Metronome {
    emitter: Arc<dyn ClickEmitter>,
    voice: ClickVoice,
    enabled: bool,
    visible: bool,
    bpm: Option<u32>,
    beats: Arc<AtomicU64>,
    timer: Option<PeriodicTimer>,
}

impl Metronome {
    pub fn new(emitter: Arc<dyn ClickEmitter>) -> Self {
        Self {
            emitter,
            voice: ClickVoice::default(),
            enabled: false,
            visible: true,
            bpm: None,
            beats: Arc::new(AtomicU64::new(0)),
            timer: None,
        }
    }

    pub fn with_voice(mut self, voice: ClickVoice) -> Self {
        self.voice = voice;
        self
    }

    pub fn voice(&self) -> ClickVoice {
        self.voice
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record the user toggle. Does not start or stop the click stream.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Tempo of the running click stream.
    pub fn bpm(&self) -> Option<u32> {
        self.timer.as_ref().and(self.bpm)
    }

    /// Clicks emitted since the last start.
    pub fn beats_emitted(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }

    /// (Re)start the click stream at `bpm`. Any running stream is cancelled
    /// first. Ignored while hidden.
    pub fn start(&mut self, bpm: u32) {
        self.stop();
        self.bpm = Some(bpm);

        if !self.visible {
            log::debug!("metronome start deferred: view hidden");
            return;
        }

        let interval = beat_interval(bpm);
        let emitter = Arc::clone(&self.emitter);
        let voice = self.voice;
        // Fresh counter so a late firing of the old timer cannot touch it
        let beats = Arc::new(AtomicU64::new(0));
        self.beats = Arc::clone(&beats);

        self.timer = Some(PeriodicTimer::start(interval, move |beat| {
            let kind = ClickKind::for_beat(beat);
            log::trace!("metronome beat {beat} ({kind:?})");
            emitter.emit(voice.click(kind));
            beats.store(beat + 1, Ordering::Relaxed);
        }));

        log::debug!("metronome started at {bpm} bpm ({interval:?})");
    }

    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
            log::debug!("metronome stopped");
        }
    }

    /// Start at `bpm` if enabled, otherwise stop.
    pub fn sync(&mut self, bpm: u32) {
        if self.enabled {
            self.start(bpm);
        } else {
            self.stop();
        }
    }

    /// Restart at a new tempo, but only if currently clicking.
    pub fn retempo(&mut self, bpm: u32) {
        if self.is_running() {
            self.start(bpm);
        } else {
            self.bpm = Some(bpm);
        }
    }

    /// Pause while the host view is hidden; resume on show if enabled.
    pub fn set_visible(&mut self, visible: bool, bpm: u32) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;

        if !visible {
            self.stop();
        } else if self.enabled {
            self.start(bpm);
        }
    }
}

impl std::fmt::Debug for Metronome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metronome")
            .field("enabled", &self.enabled)
            .field("visible", &self.visible)
            .field("running", &self.is_running())
            .field("bpm", &self.bpm)
            .field("beats", &self.beats_emitted())
            .finish()
    }
}
