mod ids;
mod load;
mod save;

use chrono::{DateTime, Local, Utc};
use flowlab_transport::{DEFAULT_BPM, clamp_bpm, clamp_count_in_bars};
use serde::{Deserialize, Serialize};

pub use ids::{ClipRef, ProjectId, TakeId, TrackId};
pub use load::{load_projects, load_projects_lenient, open_or_create};
pub use save::{save_project, save_projects};

pub const DEFAULT_GAIN: f32 = 0.9;
pub const DEFAULT_COUNT_IN_BARS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_bpm")]
    pub bpm: u32,
    #[serde(default = "default_count_in_bars")]
    pub count_in_bars: u32,
    #[serde(default)]
    pub metronome_on: bool,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub solo: bool,
    #[serde(default = "default_gain")]
    pub gain: f32,
    #[serde(default)]
    pub fx: Fx,
    /// Newest first.
    #[serde(default)]
    pub takes: Vec<Take>,
}

/// Per-track effect sends. Stored with the project; not applied during playback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fx {
    pub reverb: f32,
    pub delay: f32,
}

impl Default for Fx {
    fn default() -> Self {
        Self {
            reverb: 0.15,
            delay: 0.12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Take {
    pub id: TakeId,
    pub name: String,
    pub clip_ref: ClipRef,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    /// Wall-clock length of the capture, not the decoded audio length.
    pub duration_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] rmp_serde::encode::Error),

    #[error("Deserialization error: {0}")]
    Deserialize(#[from] rmp_serde::decode::Error),
}

fn default_bpm() -> u32 {
    DEFAULT_BPM
}

fn default_count_in_bars() -> u32 {
    DEFAULT_COUNT_IN_BARS
}

fn default_gain() -> f32 {
    DEFAULT_GAIN
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            created_at: Utc::now(),
            bpm: DEFAULT_BPM,
            count_in_bars: DEFAULT_COUNT_IN_BARS,
            metronome_on: false,
            tracks: vec![Track::new("Vox 1")],
        }
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    pub fn track_index(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// Append an empty track named after its position.
    pub fn add_track(&mut self) -> TrackId {
        let track = Track::new(format!("Track {}", self.tracks.len() + 1));
        let id = track.id;
        self.tracks.push(track);
        id
    }

    /// Returns false for an unknown track or a blank name.
    pub fn rename_track(&mut self, id: TrackId, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        match self.track_mut(id) {
            Some(track) => {
                track.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Flip mute. Muting clears solo. Returns the new mute state.
    pub fn toggle_mute(&mut self, id: TrackId) -> Option<bool> {
        let track = self.track_mut(id)?;
        track.muted = !track.muted;
        if track.muted {
            track.solo = false;
        }
        Some(track.muted)
    }

    /// Flip solo. Soloing clears mute. Returns the new solo state.
    pub fn toggle_solo(&mut self, id: TrackId) -> Option<bool> {
        let track = self.track_mut(id)?;
        track.solo = !track.solo;
        if track.solo {
            track.muted = false;
        }
        Some(track.solo)
    }

    /// Set a track's gain, clamped to 0.0..=1.0. Returns the stored value.
    pub fn set_gain(&mut self, id: TrackId, gain: f32) -> Option<f32> {
        let track = self.track_mut(id)?;
        track.gain = clamp_gain(gain);
        Some(track.gain)
    }

    pub fn set_bpm(&mut self, bpm: u32) -> u32 {
        self.bpm = clamp_bpm(bpm);
        self.bpm
    }

    pub fn set_count_in_bars(&mut self, bars: u32) -> u32 {
        self.count_in_bars = clamp_count_in_bars(bars);
        self.count_in_bars
    }

    pub fn has_takes(&self) -> bool {
        self.tracks.iter().any(|t| !t.takes.is_empty())
    }

    pub fn take_count(&self) -> usize {
        self.tracks.iter().map(|t| t.takes.len()).sum()
    }

    /// Reinstate the default track if the project has none.
    pub fn ensure_track(&mut self) {
        if self.tracks.is_empty() {
            self.tracks.push(Track::new("Vox 1"));
        }
    }

    /// Bring a loaded document back inside the ranges the engine expects.
    pub fn normalize(&mut self) {
        self.bpm = clamp_bpm(self.bpm);
        self.count_in_bars = clamp_count_in_bars(self.count_in_bars);
        for track in &mut self.tracks {
            track.gain = clamp_gain(track.gain);
        }
        self.ensure_track();
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new(format!("Project {}", Local::now().format("%Y-%m-%d %H:%M:%S")))
    }
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            muted: false,
            solo: false,
            gain: DEFAULT_GAIN,
            fx: Fx::default(),
            takes: Vec::new(),
        }
    }

    pub fn take(&self, id: TakeId) -> Option<&Take> {
        self.takes.iter().find(|t| t.id == id)
    }

    /// Default name for the next take on this track.
    pub fn next_take_name(&self) -> String {
        format!("Take {}", self.takes.len() + 1)
    }

    /// Insert as the newest take.
    pub fn prepend_take(&mut self, take: Take) {
        self.takes.insert(0, take);
    }

    pub fn remove_take(&mut self, id: TakeId) -> Option<Take> {
        let index = self.takes.iter().position(|t| t.id == id)?;
        Some(self.takes.remove(index))
    }
}

/// Clamp to 0.0..=1.0, mapping NaN to silence.
pub fn clamp_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        0.0
    } else {
        gain.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn take(name: &str) -> Take {
        Take {
            id: TakeId::new(),
            name: name.to_string(),
            clip_ref: ClipRef::new(format!("clips/{name}.webm")),
            mime_type: "audio/webm".to_string(),
            created_at: Utc::now(),
            duration_ms: 1500,
        }
    }

    #[test]
    fn test_new_project_defaults() {
        let project = Project::new("Demo");

        assert_eq!(project.bpm, 120);
        assert_eq!(project.count_in_bars, 1);
        assert!(!project.metronome_on);
        assert_eq!(project.tracks.len(), 1);
        assert_eq!(project.tracks[0].name, "Vox 1");
        assert_eq!(project.tracks[0].gain, 0.9);
        assert_eq!(project.tracks[0].fx, Fx::default());
        assert!(!project.has_takes());
    }

    #[test]
    fn test_default_project_name_is_timestamped() {
        let project = Project::default();
        assert!(project.name.starts_with("Project "));
    }

    #[test]
    fn test_add_track_names_by_position() {
        let mut project = Project::new("Demo");
        let id = project.add_track();

        assert_eq!(project.tracks.len(), 2);
        assert_eq!(project.tracks[1].id, id);
        assert_eq!(project.tracks[1].name, "Track 2");
    }

    #[test]
    fn test_rename_track_trims_and_rejects_blank() {
        let mut project = Project::new("Demo");
        let id = project.tracks[0].id;

        assert!(project.rename_track(id, "  Guitar "));
        assert_eq!(project.tracks[0].name, "Guitar");

        assert!(!project.rename_track(id, "   "));
        assert_eq!(project.tracks[0].name, "Guitar");

        assert!(!project.rename_track(TrackId::new(), "Bass"));
    }

    #[test]
    fn test_mute_clears_solo_and_solo_clears_mute() {
        let mut project = Project::new("Demo");
        let id = project.tracks[0].id;

        assert_eq!(project.toggle_solo(id), Some(true));
        assert_eq!(project.toggle_mute(id), Some(true));
        assert!(!project.tracks[0].solo);

        assert_eq!(project.toggle_solo(id), Some(true));
        assert!(!project.tracks[0].muted);

        assert_eq!(project.toggle_solo(id), Some(false));
        assert!(!project.tracks[0].muted);

        assert_eq!(project.toggle_mute(TrackId::new()), None);
    }

    #[test]
    fn test_set_gain_clamps() {
        let mut project = Project::new("Demo");
        let id = project.tracks[0].id;

        assert_eq!(project.set_gain(id, 1.7), Some(1.0));
        assert_eq!(project.set_gain(id, -0.2), Some(0.0));
        assert_eq!(project.set_gain(id, f32::NAN), Some(0.0));
        assert_eq!(project.set_gain(id, 0.42), Some(0.42));
    }

    #[test]
    fn test_transport_settings_clamp() {
        let mut project = Project::new("Demo");
        assert_eq!(project.set_bpm(20), 40);
        assert_eq!(project.set_bpm(500), 240);
        assert_eq!(project.set_count_in_bars(3), 2);
        assert_eq!(project.set_count_in_bars(0), 0);
    }

    #[test]
    fn test_takes_are_newest_first() {
        let mut track = Track::new("Vox");
        assert_eq!(track.next_take_name(), "Take 1");

        track.prepend_take(take("Take 1"));
        assert_eq!(track.next_take_name(), "Take 2");
        track.prepend_take(take("Take 2"));

        assert_eq!(track.takes[0].name, "Take 2");
        assert_eq!(track.takes[1].name, "Take 1");
    }

    #[test]
    fn test_remove_take() {
        let mut track = Track::new("Vox");
        let first = take("a");
        let first_id = first.id;
        track.prepend_take(first);
        track.prepend_take(take("b"));

        let removed = track.remove_take(first_id).expect("removed");
        assert_eq!(removed.name, "a");
        assert_eq!(track.takes.len(), 1);
        assert!(track.remove_take(first_id).is_none());
    }

    #[test]
    fn test_normalize_restores_invariants() {
        let mut project = Project::new("Broken");
        project.bpm = 9000;
        project.count_in_bars = 9;
        project.tracks[0].gain = 3.0;

        project.normalize();
        assert_eq!(project.bpm, 240);
        assert_eq!(project.count_in_bars, 2);
        assert_eq!(project.tracks[0].gain, 1.0);

        project.tracks.clear();
        project.normalize();
        assert_eq!(project.tracks.len(), 1);
        assert_eq!(project.tracks[0].name, "Vox 1");
    }

    #[test]
    fn test_serialized_field_names() {
        let mut project = Project::new("Demo");
        project.tracks[0].prepend_take(take("Take 1"));

        let json = serde_json::to_value(&project).expect("serialize");
        assert!(json.get("countInBars").is_some());
        assert!(json.get("metronomeOn").is_some());
        assert!(json.get("createdAt").is_some());
        let take = &json["tracks"][0]["takes"][0];
        assert_eq!(take["clipRef"], "clips/Take 1.webm");
        assert_eq!(take["durationMs"], 1500);
        assert_eq!(take["mimeType"], "audio/webm");
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let json = format!(
            r#"{{"id":"{}","name":"Old","createdAt":"2024-01-01T00:00:00Z",
                "tracks":[{{"id":"{}","name":"Vox"}}]}}"#,
            ProjectId::new(),
            TrackId::new()
        );
        let project: Project = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(project.bpm, 120);
        assert_eq!(project.count_in_bars, 1);
        assert!(!project.metronome_on);
        assert_eq!(project.tracks[0].gain, 0.9);
        assert!(project.tracks[0].takes.is_empty());
    }

    #[test]
    fn test_project_msgpack_roundtrip() {
        let mut project = Project::new("Packed");
        project.tracks[0].prepend_take(take("Take 1"));

        let bytes = rmp_serde::encode::to_vec_named(&project).expect("serialize");
        let decoded: Project = rmp_serde::decode::from_slice(&bytes).expect("deserialize");

        assert_eq!(decoded, project);
    }
}
