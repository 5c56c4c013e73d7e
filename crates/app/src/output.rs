use std::time::Instant;

use flowlab_core::{Click, ClickEmitter, ClipRef, ClipReleaser};

/// Prints each click with its offset from creation. Stands in for a tone
/// generator when running without an audio device.
pub struct PrintClicks {
    started: Instant,
}

impl PrintClicks {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl ClickEmitter for PrintClicks {
    fn emit(&self, click: Click) {
        let label = if click.kind.is_accent() { "TOCK" } else { "tick" };
        println!(
            "{:>8.3}s  {label}  {:.0} Hz  {} ms  gain {:.2}",
            self.started.elapsed().as_secs_f64(),
            click.frequency_hz,
            click.duration_ms,
            click.gain
        );
    }
}

/// Clips live outside the store; deleting a take only logs the release.
pub struct LogReleaser;

impl ClipReleaser for LogReleaser {
    fn release(&self, clip: &ClipRef) {
        log::info!("released clip {clip}");
    }
}
