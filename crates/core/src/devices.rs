//! Seams to the audio collaborators the transport drives but does not own.

use std::future::Future;

use flowlab_project::ClipRef;

pub use flowlab_transport::{Click, ClickEmitter};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("capture device unavailable: {0}")]
    Unavailable(String),

    #[error("capture failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),

    #[error("cannot play '{clip}': {reason}")]
    Clip { clip: ClipRef, reason: String },
}

/// Audio stored by the capture collaborator once a recording is finalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedClip {
    pub clip_ref: ClipRef,
    pub mime_type: String,
}

/// Input side: a microphone or other capture stream.
pub trait CaptureDevice {
    type Handle;

    /// Open the input. May prompt the user or wait on hardware.
    fn acquire(&mut self) -> impl Future<Output = Result<Self::Handle, CaptureError>>;

    /// Begin accumulating audio.
    fn start(&mut self, handle: &mut Self::Handle);

    /// Finish the capture and store it. Completes once the stored clip exists,
    /// which may be well after the call.
    fn stop(
        &mut self,
        handle: Self::Handle,
    ) -> impl Future<Output = Result<CapturedClip, CaptureError>>;

    /// Drop an acquired handle without producing a clip.
    fn discard(&mut self, handle: Self::Handle) {
        drop(handle);
    }
}

/// Output side: the shared audio output path and per-clip players.
pub trait PlaybackDevice {
    type Handle;

    /// Make sure the output path is running. Clicks emitted before this
    /// completes may be dropped.
    fn resume_output(&mut self) -> impl Future<Output = Result<(), PlaybackError>>;

    fn create_playable(&mut self, clip: &ClipRef) -> Result<Self::Handle, PlaybackError>;

    fn set_volume(&mut self, handle: &Self::Handle, volume: f32);

    /// Request playback from the start. Returns without waiting for audio.
    fn play(&mut self, handle: &Self::Handle) -> Result<(), PlaybackError>;

    /// Halt and rewind to the start.
    fn stop(&mut self, handle: &Self::Handle);
}

/// Frees stored audio when the take referencing it is deleted.
pub trait ClipReleaser: Send + Sync {
    fn release(&self, clip: &ClipRef);
}
