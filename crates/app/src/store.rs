use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use flowlab_project::{
    Project, TakeId, TrackId, load_projects, load_projects_lenient, open_or_create, save_project,
};

use crate::config::Config;

/// The project store file, addressed with 1-based indices on the command line.
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let path = config
            .store_path()
            .context("No data directory; set store_path in the config file")?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every stored project; an unreadable store lists as empty.
    pub fn list(&self) -> Vec<Project> {
        load_projects_lenient(&self.path)
    }

    /// The selected project, or the most recent one (created if the store is empty).
    pub fn open(&self, index: Option<usize>) -> Result<Project> {
        let Some(index) = index else {
            return open_or_create(&self.path)
                .with_context(|| format!("Failed to open {}", self.path.display()));
        };

        let mut projects = load_projects(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if index == 0 || index > projects.len() {
            bail!("No project {index} ({} stored)", projects.len());
        }
        Ok(projects.swap_remove(index - 1))
    }

    pub fn save(&self, project: &Project) -> Result<()> {
        save_project(&self.path, project)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    pub fn create(&self, name: &str, config: &Config) -> Result<Project> {
        let mut project = Project::new(name.trim());
        project.set_bpm(config.default_bpm);
        project.set_count_in_bars(config.default_count_in_bars);
        self.save(&project)?;
        Ok(project)
    }
}

pub fn track_id(project: &Project, index: usize) -> Result<TrackId> {
    match index.checked_sub(1).and_then(|i| project.tracks.get(i)) {
        Some(track) => Ok(track.id),
        None => bail!("No track {index} ({} tracks)", project.tracks.len()),
    }
}

/// Takes are listed newest first, so take 1 is the latest recording.
pub fn take_id(project: &Project, track: TrackId, index: usize) -> Result<TakeId> {
    let takes = &project.track(track).context("Track disappeared")?.takes;
    match index.checked_sub(1).and_then(|i| takes.get(i)) {
        Some(take) => Ok(take.id),
        None => bail!("No take {index} ({} takes)", takes.len()),
    }
}
