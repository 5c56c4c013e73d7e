use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::time::BEATS_PER_BAR;

/// Metronome click type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    /// First beat of a bar
    Accent,
    Plain,
}

impl ClickKind {
    /// Click type for a zero-based beat counter.
    pub fn for_beat(beat: u64) -> Self {
        if beat % u64::from(BEATS_PER_BAR) == 0 {
            ClickKind::Accent
        } else {
            ClickKind::Plain
        }
    }

    pub fn is_accent(&self) -> bool {
        matches!(self, ClickKind::Accent)
    }
}

/// A single fire-and-forget tone request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Click {
    pub kind: ClickKind,
    pub frequency_hz: f32,
    pub duration_ms: u32,
    pub gain: f32,
}

/// Pitch and level of the two click types.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickVoice {
    pub accent_hz: f32,
    pub plain_hz: f32,
    pub accent_gain: f32,
    pub plain_gain: f32,
    pub duration_ms: u32,
}

impl ClickVoice {
    pub fn click(&self, kind: ClickKind) -> Click {
        let (frequency_hz, gain) = match kind {
            ClickKind::Accent => (self.accent_hz, self.accent_gain),
            ClickKind::Plain => (self.plain_hz, self.plain_gain),
        };
        Click {
            kind,
            frequency_hz,
            duration_ms: self.duration_ms,
            gain,
        }
    }
}

impl Default for ClickVoice {
    fn default() -> Self {
        Self {
            accent_hz: 1600.0,
            plain_hz: 1200.0,
            accent_gain: 0.2,
            plain_gain: 0.13,
            duration_ms: 28,
        }
    }
}

/// Sink for metronome and count-in clicks.
///
/// Implementations must not block: clicks are emitted from timer tasks.
pub trait ClickEmitter: Send + Sync {
    fn emit(&self, click: Click);
}

/// Emitter that keeps every click it receives. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct ClickLog {
    clicks: Arc<Mutex<Vec<Click>>>,
}

impl ClickLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clicks(&self) -> Vec<Click> {
        self.clicks.lock().clone()
    }

    pub fn kinds(&self) -> Vec<ClickKind> {
        self.clicks.lock().iter().map(|c| c.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.clicks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clicks.lock().is_empty()
    }

    pub fn clear(&self) {
        self.clicks.lock().clear();
    }
}

impl ClickEmitter for ClickLog {
    fn emit(&self, click: Click) {
        self.clicks.lock().push(click);
    }
}
