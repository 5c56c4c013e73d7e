use flowlab_project::DEFAULT_COUNT_IN_BARS;
use flowlab_transport::{ClickVoice, DEFAULT_BPM, clamp_bpm, clamp_count_in_bars};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project store file. Defaults to the platform data directory.
    pub store_path: Option<PathBuf>,
    pub default_bpm: u32,
    pub default_count_in_bars: u32,
    pub click: ClickVoice,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: None,
            default_bpm: DEFAULT_BPM,
            default_count_in_bars: DEFAULT_COUNT_IN_BARS,
            click: ClickVoice::default(),
        }
    }
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("flowlab").join("config.toml"))
    }

    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Missing or malformed files fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        let config: Self = match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("ignoring {}: {err}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        };
        config.clamped()
    }

    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            self.save_to(&path);
        }
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        if let Ok(contents) = toml::to_string_pretty(self) {
            let _ = fs::write(path, contents);
        }
    }

    pub fn store_path(&self) -> Option<PathBuf> {
        self.store_path
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join("flowlab").join("projects.json")))
    }

    fn clamped(mut self) -> Self {
        self.default_bpm = clamp_bpm(self.default_bpm);
        self.default_count_in_bars = clamp_count_in_bars(self.default_count_in_bars);
        self
    }
}
