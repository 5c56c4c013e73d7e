//! The transport state machine.
//!
//! One [`Transport`] owns the working project, the collaborators, the
//! metronome and the current lifecycle phase. Requests that do not fit the
//! current state are rejected with [`TransportError::InvalidTransition`]
//! and leave everything as it was.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use flowlab_project::{Project, Take, TakeId, Track, TrackId, clamp_gain};
use flowlab_transport::{ClickEmitter, ClickVoice, CountIn, CountInTask, Metronome};
use tokio::time::Instant;

use crate::devices::{CaptureDevice, ClipReleaser, PlaybackDevice, PlaybackError};
use crate::error::TransportError;
use crate::mix;
use crate::takes::{self, PendingCapture};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportState {
    Idle,
    CountIn,
    Recording,
    Playing,
}

impl TransportState {
    pub fn is_idle(&self) -> bool {
        matches!(self, TransportState::Idle)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportState::Idle => "idle",
            TransportState::CountIn => "counting in",
            TransportState::Recording => "recording",
            TransportState::Playing => "playing",
        })
    }
}

/// A request that can be refused because of the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    Record,
    Play,
    Preview,
    Stop,
    DeleteTrack,
    ReplaceProject,
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Request::Record => "record",
            Request::Play => "play",
            Request::Preview => "preview a take",
            Request::Stop => "stop",
            Request::DeleteTrack => "delete the armed track",
            Request::ReplaceProject => "switch projects",
        })
    }
}

enum Phase<H> {
    Idle,
    CountIn {
        pending: PendingCapture<H>,
        task: CountInTask,
    },
    Recording {
        pending: PendingCapture<H>,
    },
    Playing {
        started_at: Instant,
        active: Vec<TakeId>,
    },
}

impl<H> Phase<H> {
    fn state(&self) -> TransportState {
        match self {
            Phase::Idle => TransportState::Idle,
            Phase::CountIn { .. } => TransportState::CountIn,
            Phase::Recording { .. } => TransportState::Recording,
            Phase::Playing { .. } => TransportState::Playing,
        }
    }

    /// Track a capture is pending on, if any.
    fn armed_track(&self) -> Option<TrackId> {
        match self {
            Phase::CountIn { pending, .. } | Phase::Recording { pending } => {
                Some(pending.track_id())
            }
            _ => None,
        }
    }
}

pub struct Transport<C: CaptureDevice, P: PlaybackDevice> {
    project: Project,
    capture: C,
    playback: P,
    clicks: Arc<dyn ClickEmitter>,
    releaser: Arc<dyn ClipReleaser>,
    voice: ClickVoice,
    metronome: Metronome,
    phase: Phase<C::Handle>,
    /// Players are created once per take and reused across sessions.
    playables: HashMap<TakeId, P::Handle>,
    output_ready: bool,
}

impl<C: CaptureDevice, P: PlaybackDevice> Transport<C, P> {
    pub fn new(
        mut project: Project,
        capture: C,
        playback: P,
        clicks: Arc<dyn ClickEmitter>,
        releaser: Arc<dyn ClipReleaser>,
    ) -> Self {
        project.normalize();
        let mut metronome = Metronome::new(Arc::clone(&clicks));
        metronome.set_enabled(project.metronome_on);

        Self {
            project,
            capture,
            playback,
            clicks,
            releaser,
            voice: ClickVoice::default(),
            metronome,
            phase: Phase::Idle,
            playables: HashMap::new(),
            output_ready: false,
        }
    }

    /// Use a different click sound for the metronome and count-in.
    pub fn with_click_voice(mut self, voice: ClickVoice) -> Self {
        self.metronome.stop();
        let mut metronome = Metronome::new(Arc::clone(&self.clicks)).with_voice(voice);
        metronome.set_enabled(self.project.metronome_on);
        self.metronome = metronome;
        self.voice = voice;
        self
    }

    /// A count-in whose last beat has elapsed reads as `Recording` even
    /// before the transport has been polled.
    pub fn state(&self) -> TransportState {
        if self.count_in_completed_at().is_some() {
            return TransportState::Recording;
        }
        self.phase.state()
    }

    fn count_in_completed_at(&self) -> Option<Instant> {
        match &self.phase {
            Phase::CountIn { task, .. } => task.completed_at(),
            _ => None,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Direct access for document edits that do not involve the transport
    /// (renames, mute/solo, gain). Gain changes apply from the next playback.
    pub fn project_mut(&mut self) -> &mut Project {
        &mut self.project
    }

    pub fn into_project(self) -> Project {
        self.project
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut C {
        &mut self.capture
    }

    pub fn playback(&self) -> &P {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut P {
        &mut self.playback
    }

    pub fn metronome(&self) -> &Metronome {
        &self.metronome
    }

    /// Track being counted into or recorded onto.
    pub fn armed_track(&self) -> Option<TrackId> {
        self.phase.armed_track()
    }

    /// Time since recording or playback began. Zero otherwise.
    pub fn elapsed(&self) -> Duration {
        match &self.phase {
            Phase::Recording { pending } => pending.elapsed(),
            Phase::Playing { started_at, .. } => started_at.elapsed(),
            Phase::CountIn { task, .. } => task
                .completed_at()
                .map(|at| at.elapsed())
                .unwrap_or_default(),
            Phase::Idle => Duration::ZERO,
        }
    }

    /// One-line description of what the transport is doing.
    pub fn status(&self) -> String {
        match &self.phase {
            Phase::Idle => "Idle".to_string(),
            Phase::CountIn { task, pending } => {
                if task.is_complete() {
                    self.recording_status(pending.track_id())
                } else {
                    format!("Count-in: {} bar(s)", task.count_in().bars())
                }
            }
            Phase::Recording { pending } => self.recording_status(pending.track_id()),
            Phase::Playing { .. } => "Playing".to_string(),
        }
    }

    fn recording_status(&self, track_id: TrackId) -> String {
        let name = self
            .project
            .track(track_id)
            .map(|t| t.name.as_str())
            .unwrap_or("?");
        format!("Recording -> {name}")
    }

    fn reject(&self, request: Request) -> TransportError {
        let state = self.state();
        log::debug!("rejected {request} while {state}");
        TransportError::InvalidTransition { state, request }
    }

    fn set_phase(&mut self, phase: Phase<C::Handle>) {
        let from = self.phase.state();
        let to = phase.state();
        self.phase = phase;
        if from != to {
            log::info!("transport: {from} -> {to}");
        }
    }

    async fn ensure_output(&mut self) -> Result<(), TransportError> {
        if self.output_ready {
            return Ok(());
        }
        self.playback
            .resume_output()
            .await
            .map_err(TransportError::OutputUnavailable)?;
        self.output_ready = true;
        Ok(())
    }

    /// Clicks are pointless before the output runs, and the count-in owns
    /// the click stream while it lasts.
    fn metronome_allowed(&self) -> bool {
        self.output_ready && !matches!(self.phase, Phase::CountIn { .. })
    }

    fn sync_metronome(&mut self) {
        if self.metronome_allowed() {
            self.metronome.sync(self.project.bpm);
        } else {
            self.metronome.stop();
        }
    }

    /// Arm `track_id` and start the count-in, or record straight away when
    /// the count-in is zero bars.
    ///
    /// The capture device is acquired here, once, before any click sounds.
    pub async fn request_record(&mut self, track_id: TrackId) -> Result<(), TransportError> {
        self.poll();
        if !self.state().is_idle() {
            return Err(self.reject(Request::Record));
        }
        if self.project.track(track_id).is_none() {
            return Err(TransportError::TrackNotFound(track_id));
        }

        let bars = self.project.count_in_bars;
        if bars > 0 || self.metronome.is_enabled() {
            self.ensure_output().await?;
        }

        let pending = takes::begin_capture(&self.project, &mut self.capture, track_id).await?;

        if bars == 0 {
            self.enter_recording(pending, Instant::now());
            log::info!("transport: idle -> recording");
            return Ok(());
        }

        self.metronome.stop();
        let task = CountIn::new(bars, self.project.bpm).spawn(Arc::clone(&self.clicks), self.voice);
        self.set_phase(Phase::CountIn { pending, task });
        Ok(())
    }

    fn enter_recording(&mut self, mut pending: PendingCapture<C::Handle>, started_at: Instant) {
        takes::start_capture_at(&mut self.capture, &mut pending, started_at);
        self.phase = Phase::Recording { pending };
        self.sync_metronome();
    }

    /// Advance out of the count-in once its last beat has elapsed.
    ///
    /// Every request does this first, so a late poll never loses audio
    /// time: the take is timed from the moment the count-in ended. Poll
    /// promptly anyway, since capture and the metronome only start here.
    pub fn poll(&mut self) -> TransportState {
        if self.count_in_completed_at().is_some() {
            self.finish_count_in();
        }
        self.state()
    }

    /// Wait for a running count-in to finish and start recording.
    /// Returns immediately in any other state.
    pub async fn await_count_in(&mut self) -> TransportState {
        if let Phase::CountIn { task, .. } = &mut self.phase {
            task.finished().await;
        }
        self.poll()
    }

    fn finish_count_in(&mut self) {
        if let Phase::CountIn { pending, task } = std::mem::replace(&mut self.phase, Phase::Idle) {
            let started_at = task.completed_at().unwrap_or_else(Instant::now);
            drop(task);
            self.enter_recording(pending, started_at);
            log::info!("transport: counting in -> recording");
        }
    }

    /// Stop whatever is running and return to `Idle`.
    ///
    /// When recording, this waits for the capture to be finalized and
    /// returns the id of the new take. A count-in that has already ended
    /// counts as recording. One still running is cancelled and its capture
    /// discarded.
    ///
    /// Run the returned future to completion. The transport is `Idle` as
    /// soon as finalizing begins; dropping the future part way drops the
    /// pending take with it.
    pub async fn request_stop(&mut self) -> Result<Option<TakeId>, TransportError> {
        self.poll();
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => Err(self.reject(Request::Stop)),
            Phase::CountIn { pending, task } => {
                task.cancel();
                takes::discard_capture(&mut self.capture, pending);
                log::info!("transport: counting in -> idle (count-in cancelled)");
                self.sync_metronome();
                Ok(None)
            }
            Phase::Recording { pending } => {
                let result = takes::finalize_capture(
                    &mut self.project,
                    &mut self.capture,
                    self.releaser.as_ref(),
                    pending,
                )
                .await;
                log::info!("transport: recording -> idle");
                self.sync_metronome();
                result.map(Some)
            }
            Phase::Playing { active, .. } => {
                for id in &active {
                    if let Some(handle) = self.playables.get(id) {
                        self.playback.stop(handle);
                    }
                }
                log::info!("transport: playing -> idle ({} take(s) stopped)", active.len());
                self.sync_metronome();
                Ok(None)
            }
        }
    }

    /// Start every take on every track together, at volumes resolved from
    /// the current mute/solo/gain settings. Returns how many takes started.
    ///
    /// A take that fails to start is logged and skipped.
    pub async fn request_play(&mut self) -> Result<usize, TransportError> {
        self.poll();
        if !self.state().is_idle() {
            return Err(self.reject(Request::Play));
        }
        if !self.project.has_takes() {
            return Err(TransportError::NothingToPlay);
        }
        self.ensure_output().await?;

        let plan = mix::resolve(&self.project.tracks);
        let mut active = Vec::with_capacity(self.project.take_count());

        for (track, level) in self.project.tracks.iter().zip(&plan.tracks) {
            for take in &track.takes {
                match start_take(&mut self.playback, &mut self.playables, take, level.volume) {
                    Ok(()) => active.push(take.id),
                    Err(err) => log::warn!("skipping {} on '{}': {err}", take.name, track.name),
                }
            }
        }

        let started = active.len();
        self.set_phase(Phase::Playing {
            started_at: Instant::now(),
            active,
        });
        self.sync_metronome();
        Ok(started)
    }

    /// Audition a single take at its track's gain, ignoring mute and solo.
    pub async fn request_preview(
        &mut self,
        track_id: TrackId,
        take_id: TakeId,
    ) -> Result<(), TransportError> {
        self.poll();
        if !self.state().is_idle() {
            return Err(self.reject(Request::Preview));
        }
        let track = self
            .project
            .track(track_id)
            .ok_or(TransportError::TrackNotFound(track_id))?;
        let take = track
            .take(take_id)
            .ok_or(TransportError::TakeNotFound(take_id))?;
        let take = take.clone();
        let volume = clamp_gain(track.gain);

        self.ensure_output().await?;
        start_take(&mut self.playback, &mut self.playables, &take, volume)
            .map_err(TransportError::PlaybackFailed)?;

        log::debug!("previewing {} at {volume:.2}", take.name);
        self.set_phase(Phase::Playing {
            started_at: Instant::now(),
            active: vec![take_id],
        });
        self.sync_metronome();
        Ok(())
    }

    /// Toggle the metronome and record the choice in the project.
    ///
    /// Turning it on needs the output; if that fails nothing changes.
    pub async fn set_metronome(&mut self, on: bool) -> Result<(), TransportError> {
        self.poll();
        if on {
            self.ensure_output().await?;
        }
        self.project.metronome_on = on;
        self.metronome.set_enabled(on);
        self.sync_metronome();
        Ok(())
    }

    /// Clamp and store the tempo. A clicking metronome restarts on the new
    /// tempo with its beat counter reset. A running count-in keeps its tempo.
    pub fn set_bpm(&mut self, bpm: u32) -> u32 {
        self.poll();
        let bpm = self.project.set_bpm(bpm);
        self.metronome.retempo(bpm);
        bpm
    }

    pub fn set_count_in_bars(&mut self, bars: u32) -> u32 {
        self.project.set_count_in_bars(bars)
    }

    /// Pause the metronome while the host view is hidden.
    pub fn set_visible(&mut self, visible: bool) {
        self.poll();
        self.metronome.set_visible(visible, self.project.bpm);
        if !self.metronome_allowed() {
            self.metronome.stop();
        }
    }

    fn stop_players(&mut self, ids: &[TakeId]) {
        if let Phase::Playing { active, .. } = &mut self.phase {
            active.retain(|id| !ids.contains(id));
        }
        for id in ids {
            if let Some(handle) = self.playables.remove(id) {
                self.playback.stop(&handle);
            }
        }
    }

    /// Delete a take and release its clip. `Ok(None)` if the take was not
    /// on the track.
    pub fn delete_take(
        &mut self,
        track_id: TrackId,
        take_id: TakeId,
    ) -> Result<Option<Take>, TransportError> {
        let removed = takes::delete_take(
            &mut self.project,
            self.releaser.as_ref(),
            track_id,
            take_id,
        )?;
        if removed.is_some() {
            self.stop_players(&[take_id]);
        }
        Ok(removed)
    }

    /// Delete a track with all its takes. Refused for the track currently
    /// being counted into or recorded onto.
    pub fn delete_track(&mut self, track_id: TrackId) -> Result<Track, TransportError> {
        self.poll();
        if self.phase.armed_track() == Some(track_id) {
            return Err(self.reject(Request::DeleteTrack));
        }
        let track = takes::delete_track(&mut self.project, self.releaser.as_ref(), track_id)?;
        let ids: Vec<TakeId> = track.takes.iter().map(|t| t.id).collect();
        self.stop_players(&ids);
        Ok(track)
    }

    /// Swap in another project. Only while idle. Returns the previous one.
    pub fn replace_project(&mut self, mut project: Project) -> Result<Project, TransportError> {
        self.poll();
        if !self.state().is_idle() {
            return Err(self.reject(Request::ReplaceProject));
        }
        project.normalize();
        self.playables.clear();
        let previous = std::mem::replace(&mut self.project, project);

        self.metronome.set_enabled(self.project.metronome_on);
        self.sync_metronome();
        log::info!("switched to project '{}'", self.project.name);
        Ok(previous)
    }
}

impl<C: CaptureDevice, P: PlaybackDevice> fmt::Debug for Transport<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("project", &self.project.name)
            .field("state", &self.state())
            .field("metronome", &self.metronome)
            .field("playables", &self.playables.len())
            .field("output_ready", &self.output_ready)
            .finish()
    }
}

fn start_take<P: PlaybackDevice>(
    playback: &mut P,
    playables: &mut HashMap<TakeId, P::Handle>,
    take: &Take,
    volume: f32,
) -> Result<(), PlaybackError> {
    let handle = match playables.entry(take.id) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => entry.insert(playback.create_playable(&take.clip_ref)?),
    };
    playback.set_volume(handle, volume);
    playback.play(handle)
}
