//! In-memory collaborators.
//!
//! Used by the headless rehearsal command and by tests. Nothing here touches
//! audio hardware: captures produce `memory://` clip references and players
//! only record what was asked of them.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use flowlab_project::ClipRef;
use parking_lot::Mutex;

use crate::devices::{
    CaptureDevice, CaptureError, CapturedClip, ClipReleaser, PlaybackDevice, PlaybackError,
};

#[derive(Debug)]
pub struct MemoryCaptureHandle {
    id: u64,
    started: bool,
}

#[derive(Debug)]
pub struct MemoryCapture {
    available: bool,
    fail_finalize: bool,
    finalize_delay: Duration,
    mime_type: String,
    acquisitions: usize,
    discarded: usize,
    next_id: u64,
}

impl MemoryCapture {
    pub fn new() -> Self {
        Self {
            available: true,
            fail_finalize: false,
            finalize_delay: Duration::ZERO,
            mime_type: "audio/webm".to_string(),
            acquisitions: 0,
            discarded: 0,
            next_id: 1,
        }
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn set_fail_finalize(&mut self, fail: bool) {
        self.fail_finalize = fail;
    }

    /// Simulated latency between the stop request and the stored clip.
    pub fn set_finalize_delay(&mut self, delay: Duration) {
        self.finalize_delay = delay;
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions
    }

    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

impl Default for MemoryCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDevice for MemoryCapture {
    type Handle = MemoryCaptureHandle;

    async fn acquire(&mut self) -> Result<MemoryCaptureHandle, CaptureError> {
        if !self.available {
            return Err(CaptureError::Unavailable("no input device".to_string()));
        }
        self.acquisitions += 1;
        let id = self.next_id;
        self.next_id += 1;
        Ok(MemoryCaptureHandle { id, started: false })
    }

    fn start(&mut self, handle: &mut MemoryCaptureHandle) {
        handle.started = true;
    }

    async fn stop(&mut self, handle: MemoryCaptureHandle) -> Result<CapturedClip, CaptureError> {
        if !self.finalize_delay.is_zero() {
            tokio::time::sleep(self.finalize_delay).await;
        }
        if !handle.started {
            return Err(CaptureError::Failed("capture was never started".to_string()));
        }
        if self.fail_finalize {
            return Err(CaptureError::Failed("encoder error".to_string()));
        }
        Ok(CapturedClip {
            clip_ref: ClipRef::new(format!("memory://clip-{}", handle.id)),
            mime_type: self.mime_type.clone(),
        })
    }

    fn discard(&mut self, _handle: MemoryCaptureHandle) {
        self.discarded += 1;
    }
}

/// Something the playback collaborator was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Resume,
    Create(ClipRef),
    Volume(ClipRef, f32),
    Play(ClipRef),
    Stop(ClipRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryPlayable(usize);

#[derive(Debug)]
struct Player {
    clip: ClipRef,
    volume: f32,
    playing: bool,
}

#[derive(Debug, Default)]
pub struct MemoryPlayback {
    output_down: bool,
    failing: HashSet<ClipRef>,
    players: Vec<Player>,
    events: Vec<PlaybackEvent>,
}

impl MemoryPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_output_available(&mut self, available: bool) {
        self.output_down = !available;
    }

    /// Make `play` fail for this clip.
    pub fn fail_clip(&mut self, clip: ClipRef) {
        self.failing.insert(clip);
    }

    pub fn events(&self) -> &[PlaybackEvent] {
        &self.events
    }

    pub fn players_created(&self) -> usize {
        self.players.len()
    }

    /// Clips currently playing, in creation order.
    pub fn playing(&self) -> Vec<ClipRef> {
        self.players
            .iter()
            .filter(|p| p.playing)
            .map(|p| p.clip.clone())
            .collect()
    }

    pub fn is_playing(&self, clip: &ClipRef) -> bool {
        self.players.iter().any(|p| p.playing && &p.clip == clip)
    }

    /// Last volume set on the clip's player.
    pub fn volume(&self, clip: &ClipRef) -> Option<f32> {
        self.players
            .iter()
            .rev()
            .find(|p| &p.clip == clip)
            .map(|p| p.volume)
    }

    fn player(&mut self, handle: &MemoryPlayable) -> Option<&mut Player> {
        self.players.get_mut(handle.0)
    }
}

impl PlaybackDevice for MemoryPlayback {
    type Handle = MemoryPlayable;

    async fn resume_output(&mut self) -> Result<(), PlaybackError> {
        if self.output_down {
            return Err(PlaybackError::Unavailable("output device busy".to_string()));
        }
        self.events.push(PlaybackEvent::Resume);
        Ok(())
    }

    fn create_playable(&mut self, clip: &ClipRef) -> Result<MemoryPlayable, PlaybackError> {
        self.players.push(Player {
            clip: clip.clone(),
            volume: 1.0,
            playing: false,
        });
        self.events.push(PlaybackEvent::Create(clip.clone()));
        Ok(MemoryPlayable(self.players.len() - 1))
    }

    fn set_volume(&mut self, handle: &MemoryPlayable, volume: f32) {
        if let Some(player) = self.player(handle) {
            player.volume = volume;
            let clip = player.clip.clone();
            self.events.push(PlaybackEvent::Volume(clip, volume));
        }
    }

    fn play(&mut self, handle: &MemoryPlayable) -> Result<(), PlaybackError> {
        let failing = self
            .players
            .get(handle.0)
            .is_some_and(|p| self.failing.contains(&p.clip));

        let Some(player) = self.player(handle) else {
            return Err(PlaybackError::Unavailable("unknown player".to_string()));
        };
        let clip = player.clip.clone();
        if failing {
            return Err(PlaybackError::Clip {
                clip,
                reason: "decode failed".to_string(),
            });
        }
        player.playing = true;
        self.events.push(PlaybackEvent::Play(clip));
        Ok(())
    }

    fn stop(&mut self, handle: &MemoryPlayable) {
        if let Some(player) = self.player(handle) {
            player.playing = false;
            let clip = player.clip.clone();
            self.events.push(PlaybackEvent::Stop(clip));
        }
    }
}

/// Records released clips. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct MemoryReleaser {
    released: Arc<Mutex<Vec<ClipRef>>>,
}

impl MemoryReleaser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn released(&self) -> Vec<ClipRef> {
        self.released.lock().clone()
    }
}

impl ClipReleaser for MemoryReleaser {
    fn release(&self, clip: &ClipRef) {
        log::debug!("released {clip}");
        self.released.lock().push(clip.clone());
    }
}
