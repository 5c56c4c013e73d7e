use crate::{Project, ProjectError};
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::Path;

fn load_store_data(path: &Path) -> Result<Vec<Project>, ProjectError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    // Try JSON first, fall back to MessagePack
    serde_json::from_reader(reader).or_else(|_| {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        rmp_serde::decode::from_read(reader).map_err(ProjectError::from)
    })
}

/// Read every project in the store. A store that does not exist yet is empty.
pub fn load_projects(path: &Path) -> Result<Vec<Project>, ProjectError> {
    match load_store_data(path) {
        Ok(mut projects) => {
            for project in &mut projects {
                project.normalize();
            }
            log::debug!("loaded {} project(s) from {}", projects.len(), path.display());
            Ok(projects)
        }
        Err(ProjectError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Like [`load_projects`], but an unreadable store is treated as empty.
pub fn load_projects_lenient(path: &Path) -> Vec<Project> {
    load_projects(path).unwrap_or_else(|e| {
        log::warn!("ignoring unreadable project store {}: {e}", path.display());
        Vec::new()
    })
}

/// The first project in the store, seeding the store with a fresh default
/// project if it has none. An unreadable store is an error, never reseeded.
pub fn open_or_create(path: &Path) -> Result<Project, ProjectError> {
    let mut projects = load_projects(path)?;
    if projects.is_empty() {
        let project = Project::default();
        log::info!("creating project '{}' in {}", project.name, path.display());
        crate::save_projects(path, std::slice::from_ref(&project))?;
        return Ok(project);
    }
    Ok(projects.swap_remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Track, save_projects};
    use tempfile::tempdir;

    #[test]
    fn test_missing_store_is_empty() {
        let dir = tempdir().expect("tempdir");
        let projects = load_projects(&dir.path().join("projects.json")).expect("load");
        assert!(projects.is_empty());
    }

    #[test]
    fn test_invalid_store_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("projects.json");
        std::fs::write(&path, b"not valid json or msgpack").expect("write");

        let result = load_projects(&path);
        assert!(matches!(result.unwrap_err(), ProjectError::Deserialize(_)));
        assert!(load_projects_lenient(&path).is_empty());
    }

    #[test]
    fn test_load_messagepack_store() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("projects.bin");
        let project = Project::new("Packed");

        let bytes = rmp_serde::encode::to_vec_named(&vec![project.clone()]).expect("encode");
        std::fs::write(&path, bytes).expect("write");

        let loaded = load_projects(&path).expect("load");
        assert_eq!(loaded, vec![project]);
    }

    #[test]
    fn test_load_normalizes_projects() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("projects.json");

        let mut project = Project::new("Trackless");
        project.tracks.clear();
        project.bpm = 10;
        save_projects(&path, &[project]).expect("save");

        let loaded = load_projects(&path).expect("load");
        assert_eq!(loaded[0].bpm, 40);
        assert_eq!(loaded[0].tracks.len(), 1);
    }

    #[test]
    fn test_open_or_create_seeds_empty_store() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("projects.json");

        let project = open_or_create(&path).expect("open");
        assert!(path.exists());

        let stored = load_projects(&path).expect("load");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, project.id);
    }

    #[test]
    fn test_open_or_create_returns_first_project() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("projects.json");

        let mut first = Project::new("First");
        first.tracks.push(Track::new("Keys"));
        save_projects(&path, &[first.clone(), Project::new("Second")]).expect("save");

        let opened = open_or_create(&path).expect("open");
        assert_eq!(opened, first);
    }

    #[test]
    fn test_open_or_create_keeps_unreadable_store() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("projects.json");
        std::fs::write(&path, b"{ truncated").expect("write");

        assert!(open_or_create(&path).is_err());
        assert_eq!(std::fs::read(&path).expect("read"), b"{ truncated");
    }
}
