//! Disk-persisted asset locators.
//!
//! One small JSON file per asset key, named by the SHA-256 of the key:
//!
//! ```text
//! {dir}/
//! ├── 3f79bb7b...0e.json   # {"key": "...", "url": "...", "saved_at": "..."}
//! └── ...
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use super::error::RecordError;

const RECORD_EXTENSION: &str = "json";

/// A resolved locator for one asset key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorRecord {
    pub key: String,
    pub url: String,
    pub saved_at: DateTime<Utc>,
}

/// Directory of locator records.
#[derive(Debug, Clone)]
pub struct LocatorStore {
    dir: PathBuf,
}

impl LocatorStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `{data_dir}/docmirror/assets`, e.g. `~/.local/share/docmirror/assets`.
    pub fn default_dir() -> Result<PathBuf, RecordError> {
        dirs::data_dir()
            .map(|d| d.join("docmirror").join("assets"))
            .ok_or(RecordError::NoDataDir)
    }

    pub fn open_default() -> Result<Self, RecordError> {
        Ok(Self::new(Self::default_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir
            .join(format!("{:x}", digest))
            .with_extension(RECORD_EXTENSION)
    }

    fn read(path: &Path) -> Result<Option<LocatorRecord>, RecordError> {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| RecordError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RecordError::io(path, e)),
        }
    }

    /// Loads the record for `key`. Returns `Ok(None)` if there is none.
    pub fn load(&self, key: &str) -> Result<Option<LocatorRecord>, RecordError> {
        Ok(Self::read(&self.path(key))?.filter(|record| record.key == key))
    }

    /// Writes the record for `key`, replacing any previous one.
    pub fn save(&self, key: &str, url: &str) -> Result<LocatorRecord, RecordError> {
        fs::create_dir_all(&self.dir).map_err(|e| RecordError::io(&self.dir, e))?;

        let record = LocatorRecord {
            key: key.to_string(),
            url: url.to_string(),
            saved_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&record).map_err(|source| RecordError::Corrupt {
            path: self.path(key),
            source,
        })?;

        // Write to a temp file, then rename over the record.
        let path = self.path(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|e| RecordError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| RecordError::io(&path, e))?;

        Ok(record)
    }

    /// Deletes the record for `key`. Returns whether one existed.
    pub fn remove(&self, key: &str) -> Result<bool, RecordError> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RecordError::io(path, e)),
        }
    }

    fn record_files(&self) -> Result<Vec<PathBuf>, RecordError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RecordError::io(&self.dir, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| RecordError::io(&self.dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Deletes every record. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, RecordError> {
        let files = self.record_files()?;
        for path in &files {
            fs::remove_file(path).map_err(|e| RecordError::io(path, e))?;
        }
        Ok(files.len())
    }

    /// All readable records, sorted by key. Corrupt files are skipped.
    pub fn list(&self) -> Result<Vec<LocatorRecord>, RecordError> {
        let mut records = Vec::new();
        for path in self.record_files()? {
            match Self::read(&path) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!("Skipping locator record: {}", e),
            }
        }
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}
