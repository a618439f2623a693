//! Timestamped backups taken before any file is overwritten.
//!
//! Backups are best-effort: a file that cannot be copied is logged and
//! skipped, never blocking the write that follows.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Default backup directory, relative to the project root.
pub const DEFAULT_BACKUP_DIR: &str = ".planpatch-backups";

/// Relative path -> location of its backup copy.
pub type BackupRecord = BTreeMap<String, PathBuf>;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("failed to create backup directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    root: PathBuf,
    backup_dir: PathBuf,
}

impl BackupManager {
    /// `backup_dir` is resolved against `root`.
    pub fn new(root: impl Into<PathBuf>, backup_dir: impl AsRef<Path>) -> Self {
        let root = root.into();
        let backup_dir = root.join(backup_dir);
        Self { root, backup_dir }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Back up every existing file in `paths`.
    ///
    /// Files that do not exist yet are skipped without a record. Copy
    /// failures are logged as warnings and also leave no record.
    pub fn backup_files<'a>(&self, paths: impl IntoIterator<Item = &'a str>) -> BackupRecord {
        let timestamp = timestamp();
        let mut record = BackupRecord::new();

        for rel in paths {
            match self.backup_file(rel, &timestamp) {
                Ok(Some(dest)) => {
                    debug!(path = rel, backup = %dest.display(), "backed up");
                    record.insert(rel.to_string(), dest);
                }
                Ok(None) => debug!(path = rel, "new file, nothing to back up"),
                Err(e) => warn!(path = rel, error = %e, "backup skipped"),
            }
        }

        record
    }

    /// Copy one file into the backup directory.
    ///
    /// Returns `Ok(None)` when the source does not exist.
    pub fn backup_file(&self, rel: &str, timestamp: &str) -> Result<Option<PathBuf>, BackupError> {
        let source = self.root.join(rel);
        if !source.is_file() {
            return Ok(None);
        }

        let dest = self.backup_path(rel, timestamp);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| BackupError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::copy(&source, &dest).map_err(|err| BackupError::Copy {
            from: source.clone(),
            to: dest.clone(),
            source: err,
        })?;

        Ok(Some(dest))
    }

    /// `<backup_dir>/<path with separators as '_'>.<timestamp>.backup`
    pub fn backup_path(&self, rel: &str, timestamp: &str) -> PathBuf {
        let sanitized = rel.replace(['/', '\\'], "_");
        self.backup_dir
            .join(format!("{sanitized}.{timestamp}.backup"))
    }

    /// Existing backup files, sorted by name.
    pub fn list(&self) -> io::Result<Vec<PathBuf>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Second-granularity UTC timestamp safe for file names.
pub fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string()
}
