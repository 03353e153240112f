//! How many people reached each outcome.
//!
//! Counts are keyed by the session's path key (the answered option ids
//! joined with `>>>`), so two routes to the same recommendation are counted
//! separately.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use fd_lock::RwLock;
use log::debug;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TallyError {
    #[error("failed to access tally file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("tally file {path} is not valid JSON")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Counter store for finished paths.
pub trait Tally: Send + Sync {
    /// Add one to the count for `key` (starting at 1) and return the new
    /// count. Concurrent calls for the same key must not lose updates.
    fn record(&self, key: &str) -> Result<u64, TallyError>;

    /// Current count for `key`, or `None` if nobody has finished that path.
    fn count(&self, key: &str) -> Result<Option<u64>, TallyError>;

    /// Every recorded path with its count, ordered by path key.
    fn entries(&self) -> Result<Vec<(String, u64)>, TallyError>;
}

/// Process-local tally.
#[derive(Debug, Default)]
pub struct MemoryTally {
    counts: DashMap<String, u64>,
}

impl MemoryTally {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tally for MemoryTally {
    fn record(&self, key: &str) -> Result<u64, TallyError> {
        // The entry guard holds the shard lock for the whole increment.
        let mut count = self.counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    fn count(&self, key: &str) -> Result<Option<u64>, TallyError> {
        Ok(self.counts.get(key).map(|count| *count))
    }

    fn entries(&self) -> Result<Vec<(String, u64)>, TallyError> {
        let mut entries: Vec<(String, u64)> = self
            .counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        entries.sort();
        Ok(entries)
    }
}

/// Tally kept in a JSON object file (`{"<path key>": <count>}`).
///
/// Each access takes an exclusive OS lock on a `<file>.lock` sidecar, so
/// handles in other threads or other processes see every increment. Writes
/// go to a fresh temp file in the same directory and are renamed into place.
#[derive(Debug)]
pub struct FileTally {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileTally {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        Self {
            path,
            lock_path: lock_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_lock(&self) -> Result<RwLock<File>, TallyError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|source| self.io_error(source))?;
        Ok(RwLock::new(file))
    }

    /// Run `f` on the current counts while holding the file lock.
    fn locked<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, u64>) -> Result<T, TallyError>,
    ) -> Result<T, TallyError> {
        let mut lock = self.open_lock()?;
        let _guard = lock.write().map_err(|source| self.io_error(source))?;
        let mut counts = self.load()?;
        f(&mut counts)
    }

    fn load(&self) -> Result<BTreeMap<String, u64>, TallyError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => return Err(self.io_error(source)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|source| TallyError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn persist(&self, counts: &BTreeMap<String, u64>) -> Result<(), TallyError> {
        let json = serde_json::to_vec_pretty(counts).map_err(|source| TallyError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(|source| self.io_error(source))?;
        tmp.write_all(&json).map_err(|source| self.io_error(source))?;
        tmp.persist(&self.path)
            .map_err(|err| self.io_error(err.error))?;
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> TallyError {
        TallyError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Tally for FileTally {
    fn record(&self, key: &str) -> Result<u64, TallyError> {
        let count = self.locked(|counts| {
            let count = counts.entry(key.to_string()).or_insert(0);
            *count += 1;
            let count = *count;
            self.persist(counts)?;
            Ok(count)
        })?;
        debug!("Recorded {key:?} in {} (count={count})", self.path.display());
        Ok(count)
    }

    fn count(&self, key: &str) -> Result<Option<u64>, TallyError> {
        self.locked(|counts| Ok(counts.get(key).copied()))
    }

    fn entries(&self) -> Result<Vec<(String, u64)>, TallyError> {
        self.locked(|counts| Ok(std::mem::take(counts).into_iter().collect()))
    }
}
