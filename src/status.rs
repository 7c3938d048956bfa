//! Listener status reporting.
//!
//! Mirrors report whether they are currently listening through a
//! [`StatusPort`]. The record is purely diagnostic: nothing reads it back
//! to make decisions.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Sink for per-listener activity flags.
pub trait StatusPort: Send + Sync {
    fn set_active(&self, listener: &str, active: bool);

    /// All recorded flags, keyed by listener name.
    fn snapshot(&self) -> BTreeMap<String, bool>;
}

fn lock(flags: &Mutex<BTreeMap<String, bool>>) -> MutexGuard<'_, BTreeMap<String, bool>> {
    flags.lock().unwrap_or_else(|e| e.into_inner())
}

/// In-memory status record.
#[derive(Debug, Default)]
pub struct MemoryStatus {
    flags: Mutex<BTreeMap<String, bool>>,
}

impl MemoryStatus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusPort for MemoryStatus {
    fn set_active(&self, listener: &str, active: bool) {
        lock(&self.flags).insert(listener.to_string(), active);
    }

    fn snapshot(&self) -> BTreeMap<String, bool> {
        lock(&self.flags).clone()
    }
}

/// Status record persisted as a single JSON object on disk.
///
/// Every update rewrites the file. Write failures are logged and otherwise
/// ignored.
#[derive(Debug)]
pub struct FileStatus {
    path: PathBuf,
    flags: Mutex<BTreeMap<String, bool>>,
}

impl FileStatus {
    /// Opens the record at `path`, starting from its current contents if the
    /// file exists and parses.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let flags = match Self::read(&path) {
            Ok(flags) => flags,
            Err(e) => {
                warn!("Ignoring unreadable status file {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };
        Self {
            path,
            flags: Mutex::new(flags),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a status file without opening it for updates.
    pub fn read(path: &Path) -> io::Result<BTreeMap<String, bool>> {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }

    fn write(&self, flags: &BTreeMap<String, bool>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(flags)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)
    }
}

impl StatusPort for FileStatus {
    fn set_active(&self, listener: &str, active: bool) {
        let mut flags = lock(&self.flags);
        flags.insert(listener.to_string(), active);
        if let Err(e) = self.write(&flags) {
            warn!(
                "Failed to write status file {}: {}",
                self.path.display(),
                e
            );
        }
    }

    fn snapshot(&self) -> BTreeMap<String, bool> {
        lock(&self.flags).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_status_records_latest_flag() {
        let status = MemoryStatus::new();
        status.set_active("people", true);
        status.set_active("people", false);
        status.set_active("profile", true);
        let snapshot = status.snapshot();
        assert_eq!(snapshot.get("people"), Some(&false));
        assert_eq!(snapshot.get("profile"), Some(&true));
    }

    #[test]
    fn test_file_status_persists_across_opens() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state").join("status.json");

        let status = FileStatus::open(&path);
        status.set_active("people", true);
        assert!(path.exists());

        let reopened = FileStatus::open(&path);
        assert_eq!(reopened.snapshot().get("people"), Some(&true));
        assert_eq!(FileStatus::read(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_file_status_ignores_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("status.json");
        fs::write(&path, b"not json").unwrap();

        let status = FileStatus::open(&path);
        assert!(status.snapshot().is_empty());
        status.set_active("people", true);
        assert_eq!(FileStatus::read(&path).unwrap().get("people"), Some(&true));
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let temp = TempDir::new().unwrap();
        assert!(FileStatus::read(&temp.path().join("none.json"))
            .unwrap()
            .is_empty());
    }
}
