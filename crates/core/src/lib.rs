pub mod devices;
pub mod error;
pub mod memory;
pub mod mix;
pub mod takes;
pub mod transport;

pub use devices::{
    CaptureDevice, CaptureError, CapturedClip, Click, ClickEmitter, ClipReleaser,
    PlaybackDevice, PlaybackError,
};
pub use error::TransportError;
pub use memory::{MemoryCapture, MemoryPlayback, MemoryReleaser, PlaybackEvent};
pub use mix::{MixPlan, TrackMix};
pub use transport::{Request, Transport, TransportState};

pub use flowlab_project::{ClipRef, Project, ProjectError, Take, TakeId, Track, TrackId};
pub use flowlab_transport::{ClickKind, ClickLog, ClickVoice, format_elapsed};
