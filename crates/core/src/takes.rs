//! Take lifecycle: capture into a take, delete takes and tracks.

use std::time::Duration;

use chrono::Utc;
use flowlab_project::{Project, Take, TakeId, Track, TrackId};
use tokio::time::Instant;

use crate::devices::{CaptureDevice, CapturedClip, ClipReleaser};
use crate::error::TransportError;

/// An acquired capture stream bound to the track it will record onto.
#[derive(Debug)]
pub struct PendingCapture<H> {
    track_id: TrackId,
    handle: H,
    started_at: Option<Instant>,
}

impl<H> PendingCapture<H> {
    pub fn track_id(&self) -> TrackId {
        self.track_id
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Time since accumulation began; zero before [`start_capture`].
    pub fn elapsed(&self) -> Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }
}

/// Validate the target track and acquire the capture device.
///
/// Nothing in the project changes on failure.
pub async fn begin_capture<C: CaptureDevice>(
    project: &Project,
    capture: &mut C,
    track_id: TrackId,
) -> Result<PendingCapture<C::Handle>, TransportError> {
    if project.track(track_id).is_none() {
        return Err(TransportError::TrackNotFound(track_id));
    }

    let handle = capture
        .acquire()
        .await
        .map_err(TransportError::DeviceUnavailable)?;

    log::debug!("capture acquired for track {track_id}");
    Ok(PendingCapture {
        track_id,
        handle,
        started_at: None,
    })
}

/// Begin accumulating audio and start the duration clock.
pub fn start_capture<C: CaptureDevice>(capture: &mut C, pending: &mut PendingCapture<C::Handle>) {
    start_capture_at(capture, pending, Instant::now());
}

/// [`start_capture`] with the duration clock backdated to `started_at`,
/// for a start that is observed after it was due.
pub fn start_capture_at<C: CaptureDevice>(
    capture: &mut C,
    pending: &mut PendingCapture<C::Handle>,
    started_at: Instant,
) {
    capture.start(&mut pending.handle);
    pending.started_at = Some(started_at);
}

/// Release an acquired stream without producing a take.
pub fn discard_capture<C: CaptureDevice>(capture: &mut C, pending: PendingCapture<C::Handle>) {
    log::debug!("capture for track {} discarded", pending.track_id);
    capture.discard(pending.handle);
}

/// Stop the capture, wait for the stored clip, and prepend it as a new take.
///
/// The duration is measured when this is called, before waiting on the
/// device. If the target track disappeared while finalizing, the clip is
/// released and `TrackNotFound` returned.
pub async fn finalize_capture<C: CaptureDevice>(
    project: &mut Project,
    capture: &mut C,
    releaser: &dyn ClipReleaser,
    pending: PendingCapture<C::Handle>,
) -> Result<TakeId, TransportError> {
    let duration = pending.elapsed();
    let track_id = pending.track_id;

    let clip = capture
        .stop(pending.handle)
        .await
        .map_err(TransportError::CaptureFailed)?;

    match append_take(project, track_id, clip.clone(), duration) {
        Ok(id) => Ok(id),
        Err(err) => {
            releaser.release(&clip.clip_ref);
            Err(err)
        }
    }
}

/// Build a take from a stored clip and make it the track's newest.
pub fn append_take(
    project: &mut Project,
    track_id: TrackId,
    clip: CapturedClip,
    duration: Duration,
) -> Result<TakeId, TransportError> {
    let track = project
        .track_mut(track_id)
        .ok_or(TransportError::TrackNotFound(track_id))?;

    let take = Take {
        id: TakeId::new(),
        name: track.next_take_name(),
        clip_ref: clip.clip_ref,
        mime_type: clip.mime_type,
        created_at: Utc::now(),
        duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
    };
    let id = take.id;

    log::info!(
        "{} added to '{}' ({} ms)",
        take.name,
        track.name,
        take.duration_ms
    );
    track.prepend_take(take);
    Ok(id)
}

/// Remove a take and release its clip. `Ok(None)` if the take is not on the track.
pub fn delete_take(
    project: &mut Project,
    releaser: &dyn ClipReleaser,
    track_id: TrackId,
    take_id: TakeId,
) -> Result<Option<Take>, TransportError> {
    let track = project
        .track_mut(track_id)
        .ok_or(TransportError::TrackNotFound(track_id))?;

    let Some(take) = track.remove_take(take_id) else {
        return Ok(None);
    };
    releaser.release(&take.clip_ref);
    log::info!("deleted {} from '{}'", take.name, track.name);
    Ok(Some(take))
}

/// Release every clip on the track, then remove it. The project never ends
/// up with zero tracks.
pub fn delete_track(
    project: &mut Project,
    releaser: &dyn ClipReleaser,
    track_id: TrackId,
) -> Result<Track, TransportError> {
    let index = project
        .track_index(track_id)
        .ok_or(TransportError::TrackNotFound(track_id))?;

    for take in &project.tracks[index].takes {
        releaser.release(&take.clip_ref);
    }
    let track = project.tracks.remove(index);
    project.ensure_track();

    log::info!(
        "deleted track '{}' with {} take(s)",
        track.name,
        track.takes.len()
    );
    Ok(track)
}
