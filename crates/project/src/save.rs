use crate::{Project, ProjectError, load_projects};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

/// Replace the whole store with `projects`.
pub fn save_projects(path: &Path, projects: &[Project]) -> Result<(), ProjectError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, projects)?;

    log::debug!("saved {} project(s) to {}", projects.len(), path.display());
    Ok(())
}

/// Store one project: replace the stored copy with the same id, or insert
/// it ahead of the others if it is new.
///
/// A store that exists but cannot be read is left alone and the error
/// returned.
pub fn save_project(path: &Path, project: &Project) -> Result<(), ProjectError> {
    let mut projects = load_projects(path)?;

    match projects.iter_mut().find(|p| p.id == project.id) {
        Some(existing) => *existing = project.clone(),
        None => projects.insert(0, project.clone()),
    }

    save_projects(path, &projects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_projects_creates_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("projects.json");

        save_projects(&path, &[Project::new("Demo")]).expect("save");

        assert!(path.exists());
    }

    #[test]
    fn test_save_projects_content_is_valid_json() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("projects.json");

        let mut project = Project::new("My Song");
        project.set_bpm(140);
        save_projects(&path, &[project]).expect("save");

        let file = std::fs::File::open(&path).expect("open");
        let reader = std::io::BufReader::new(file);
        let loaded: Vec<Project> = serde_json::from_reader(reader).expect("decode");

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "My Song");
        assert_eq!(loaded[0].bpm, 140);
    }

    #[test]
    fn test_save_project_replaces_existing_in_place() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("projects.json");

        let first = Project::new("First");
        let mut second = Project::new("Second");
        save_projects(&path, &[first.clone(), second.clone()]).expect("save");

        second.name = "Second (edited)".to_string();
        save_project(&path, &second).expect("save");

        let loaded = load_projects(&path).expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, first.id);
        assert_eq!(loaded[1].name, "Second (edited)");
    }

    #[test]
    fn test_save_project_inserts_new_at_front() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("projects.json");

        save_project(&path, &Project::new("Old")).expect("save");
        let new = Project::new("New");
        save_project(&path, &new).expect("save");

        let loaded = load_projects(&path).expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, new.id);
    }

    #[test]
    fn test_save_empty_store() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("projects.json");

        save_projects(&path, &[]).expect("save");

        assert!(load_projects(&path).expect("load").is_empty());
    }

    #[test]
    fn test_save_project_keeps_unreadable_store() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("projects.json");
        std::fs::write(&path, b"not valid json or msgpack").expect("write");

        let err = save_project(&path, &Project::new("Fresh")).expect_err("corrupt store");

        assert!(matches!(err, ProjectError::Deserialize(_)));
        assert_eq!(
            std::fs::read(&path).expect("read"),
            b"not valid json or msgpack"
        );
    }
}
