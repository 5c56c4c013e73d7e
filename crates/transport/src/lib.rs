//! Timing primitives for the transport: the periodic clock, metronome,
//! count-in sequencer and the click model they share.

pub mod click;
pub mod clock;
pub mod count_in;
pub mod metronome;
pub mod time;

pub use click::{Click, ClickEmitter, ClickKind, ClickLog, ClickVoice};
pub use clock::PeriodicTimer;
pub use count_in::{CountIn, CountInTask};
pub use metronome::Metronome;
pub use time::{
    BEATS_PER_BAR, DEFAULT_BPM, MAX_BPM, MAX_COUNT_IN_BARS, MIN_BPM, beat_duration,
    beat_interval, clamp_bpm, clamp_count_in_bars, format_elapsed, format_millis,
};
