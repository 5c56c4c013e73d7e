//! Mute/solo policy applied when playback starts.
//!
//! If any track is soloed, only soloed tracks are heard; otherwise every
//! unmuted track is. Mute and solo may both be set (or both clear) on a
//! track; the solo rule simply takes precedence.

use flowlab_project::{Track, TrackId, clamp_gain};

/// Resolved playback level for one track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackMix {
    pub track_id: TrackId,
    pub audible: bool,
    pub volume: f32,
}

/// Per-track levels for a single playback session.
#[derive(Debug, Clone, PartialEq)]
pub struct MixPlan {
    pub any_solo: bool,
    pub tracks: Vec<TrackMix>,
}

impl MixPlan {
    pub fn volume(&self, track_id: TrackId) -> Option<f32> {
        self.tracks
            .iter()
            .find(|m| m.track_id == track_id)
            .map(|m| m.volume)
    }
}

pub fn any_solo(tracks: &[Track]) -> bool {
    tracks.iter().any(|t| t.solo)
}

pub fn is_audible(track: &Track, any_solo: bool) -> bool {
    if any_solo { track.solo } else { !track.muted }
}

pub fn effective_volume(track: &Track, any_solo: bool) -> f32 {
    if is_audible(track, any_solo) {
        clamp_gain(track.gain)
    } else {
        0.0
    }
}

pub fn resolve(tracks: &[Track]) -> MixPlan {
    let any_solo = any_solo(tracks);
    MixPlan {
        any_solo,
        tracks: tracks
            .iter()
            .map(|track| TrackMix {
                track_id: track.id,
                audible: is_audible(track, any_solo),
                volume: effective_volume(track, any_solo),
            })
            .collect(),
    }
}
