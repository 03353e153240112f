use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::quiz::session::SessionState;

/// Where a user's progress is kept between runs.
pub trait StateStore {
    fn load(&self) -> Result<Option<SessionState>>;
    fn save(&self, state: &SessionState) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Keeps the state as a JSON file.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<SessionState>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).context(format!("failed to read {}", self.path.display()))
            }
        };
        let state = serde_json::from_str(&raw)
            .context(format!("failed to parse saved state in {}", self.path.display()))?;
        Ok(Some(state))
    }

    fn save(&self, state: &SessionState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        fs::write(&self.path, json).context(format!("failed to write {}", self.path.display()))
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).context(format!("failed to remove {}", self.path.display())),
        }
    }
}

/// Keeps the state for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<SessionState>>,
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<SessionState>> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &SessionState) -> Result<()> {
        *self.state.lock() = Some(state.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.state.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SessionState {
        SessionState {
            current: "traffic-scale".into(),
            answers: vec!["yes-use-framework".into(), "yes-brand-new-project".into()],
        }
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state.json"));

        assert_eq!(store.load().unwrap(), None);
        store.save(&state()).unwrap();
        assert_eq!(store.load().unwrap(), Some(state()));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_reports_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{").unwrap();
        assert!(FileStateStore::new(path).load().is_err());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStateStore::default();
        store.save(&state()).unwrap();
        assert_eq!(store.load().unwrap(), Some(state()));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
