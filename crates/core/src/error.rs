use flowlab_project::{TakeId, TrackId};

use crate::devices::{CaptureError, PlaybackError};
use crate::transport::{Request, TransportState};

/// Every variant is recoverable: the transport is back in (or still in)
/// `Idle`, or unchanged for a rejected request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(CaptureError),

    #[error("Audio output unavailable: {0}")]
    OutputUnavailable(PlaybackError),

    #[error("Capture could not be finalized: {0}")]
    CaptureFailed(CaptureError),

    #[error("Playback failed: {0}")]
    PlaybackFailed(PlaybackError),

    #[error("Track {0} not found")]
    TrackNotFound(TrackId),

    #[error("Take {0} not found")]
    TakeNotFound(TakeId),

    #[error("Cannot {request} while {state}")]
    InvalidTransition {
        state: TransportState,
        request: Request,
    },

    #[error("Nothing to play: no track has a take")]
    NothingToPlay,
}

impl TransportError {
    /// Rejections caused by calling at the wrong time rather than by a
    /// device or document problem.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TransportError::InvalidTransition { .. } | TransportError::NothingToPlay
        )
    }
}
