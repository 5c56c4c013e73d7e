use std::time::Duration;

/// Slowest tempo a project may use.
pub const MIN_BPM: u32 = 40;
/// Fastest tempo a project may use.
pub const MAX_BPM: u32 = 240;
pub const DEFAULT_BPM: u32 = 120;

/// Clicks are grouped in bars of four; beat 0 of each bar is accented.
pub const BEATS_PER_BAR: u32 = 4;

/// Longest count-in a project may request.
pub const MAX_COUNT_IN_BARS: u32 = 2;

pub fn clamp_bpm(bpm: u32) -> u32 {
    bpm.clamp(MIN_BPM, MAX_BPM)
}

pub fn clamp_count_in_bars(bars: u32) -> u32 {
    bars.min(MAX_COUNT_IN_BARS)
}

/// Metronome firing period: `60000 / bpm` whole milliseconds, rounded down.
pub fn beat_interval(bpm: u32) -> Duration {
    Duration::from_millis(60_000 / u64::from(bpm.max(1)))
}

/// Exact length of one beat, used for the count-in waits.
pub fn beat_duration(bpm: u32) -> Duration {
    Duration::from_secs_f64(60.0 / f64::from(bpm.max(1)))
}

/// Render an elapsed time as `mm:ss`, dropping any partial second.
///
/// Minutes are not wrapped into hours, so an hour-long take shows as `60:00`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// [`format_elapsed`] for a stored millisecond count.
pub fn format_millis(ms: u64) -> String {
    format_elapsed(Duration::from_millis(ms))
}
