//! Persistence of the last canonical snapshot.
//!
//! The store holds a single string. A missing entry reads as `""`, which the
//! detector treats as "nothing seen yet".

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write state to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Single-entry key-value store for the baseline snapshot.
pub trait StateStore: Send + Sync {
    /// Last persisted snapshot, or `""` when nothing was stored yet.
    fn load(&self) -> Result<String, StateError>;

    /// Replace the stored snapshot.
    fn save(&self, snapshot: &str) -> Result<(), StateError>;
}

/// Plain UTF-8 file containing exactly the snapshot, no metadata.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<String, StateError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(StateError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn save(&self, snapshot: &str) -> Result<(), StateError> {
        let write_err = |source| StateError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        // Write beside the target and rename so a crash never leaves half a snapshot.
        let tmp = self.tmp_path();
        std::fs::write(&tmp, snapshot.as_bytes()).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: Mutex<Option<String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing baseline.
    pub fn with_snapshot(snapshot: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(Some(snapshot.into())),
        }
    }

    /// Raw contents, distinguishing "never written" from an empty snapshot.
    pub fn snapshot(&self) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<String, StateError> {
        Ok(self.snapshot().unwrap_or_default())
    }

    fn save(&self, snapshot: &str) -> Result<(), StateError> {
        *self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(snapshot.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(tmp.path().join("known_ads.txt"));
        assert_eq!(store.load().unwrap(), "");
    }

    #[test]
    fn save_then_load_is_exact() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(tmp.path().join("nested/dir/known_ads.txt"));
        store.save("Apt A\nWohnung in München").unwrap();
        assert_eq!(store.load().unwrap(), "Apt A\nWohnung in München");
        assert!(!store.tmp_path().exists());

        store.save("Apt B").unwrap();
        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            "Apt B",
            "file holds exactly the snapshot"
        );
    }

    #[test]
    fn unreadable_path_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file.
        let store = FileStateStore::new(tmp.path());
        assert!(matches!(store.load(), Err(StateError::Read { .. })));
    }

    #[test]
    fn memory_store_tracks_writes() {
        let store = MemoryStateStore::new();
        assert_eq!(store.snapshot(), None);
        assert_eq!(store.load().unwrap(), "");
        store.save("x").unwrap();
        assert_eq!(store.snapshot().as_deref(), Some("x"));
    }
}
