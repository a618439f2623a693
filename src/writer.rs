use crate::snapshot::ContentSnapshot;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Commit `after` to disk under `root`, skipping unchanged files.
///
/// A path counts as changed when its content differs from `before` or it
/// has no entry there. `on_write` fires just before each write. Returns the
/// written paths.
///
/// Files are written one by one; a failure stops the loop and earlier writes
/// stay on disk.
pub fn write_changes(
    root: &Path,
    before: &ContentSnapshot,
    after: &ContentSnapshot,
    mut on_write: impl FnMut(&str),
) -> Result<Vec<String>, WriteError> {
    let mut written = Vec::new();

    for (rel, content) in after {
        if before.get(rel) == Some(content) {
            continue;
        }

        on_write(rel);
        let full = root.join(rel);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|source| WriteError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        atomic_write(&full, content.as_bytes()).map_err(|source| WriteError::Write {
            path: full.clone(),
            source,
        })?;
        info!(path = %rel, bytes = content.len(), "wrote file");
        written.push(rel.clone());
    }

    Ok(written)
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full new content lands or the old file is left as it was. An
/// existing file keeps its permissions; a new one gets `0644` on unix.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    // Same directory keeps the rename on one filesystem
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "Path has no parent directory")
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    match fs::metadata(path) {
        Ok(meta) => temp.as_file().set_permissions(meta.permissions())?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => set_new_file_mode(temp.as_file())?,
        Err(e) => return Err(e),
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(unix)]
fn set_new_file_mode(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_new_file_mode(_file: &fs::File) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, &str)]) -> ContentSnapshot {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_only_changed_files_are_written() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("same.txt"), "same").unwrap();
        fs::write(temp_dir.path().join("changed.txt"), "old").unwrap();

        let before = snapshot(&[("same.txt", "same"), ("changed.txt", "old")]);
        let after = snapshot(&[("same.txt", "same"), ("changed.txt", "new")]);
        let mut notified = Vec::new();

        let written = write_changes(temp_dir.path(), &before, &after, |p| {
            notified.push(p.to_string())
        })
        .unwrap();

        assert_eq!(written, vec!["changed.txt"]);
        assert_eq!(notified, vec!["changed.txt"]);
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("changed.txt")).unwrap(),
            "new"
        );
    }

    #[test]
    fn test_new_file_creates_parent_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let before = ContentSnapshot::new();
        let after = snapshot(&[("deep/nested/file.rs", "fn main() {}")]);

        let written = write_changes(temp_dir.path(), &before, &after, |_| {}).unwrap();

        assert_eq!(written.len(), 1);
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("deep/nested/file.rs")).unwrap(),
            "fn main() {}"
        );
    }

    #[test]
    fn test_no_changes_writes_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let before = snapshot(&[("a.txt", "x")]);

        let written = write_changes(temp_dir.path(), &before, &before, |_| {
            panic!("nothing should be written")
        })
        .unwrap();

        assert!(written.is_empty());
        assert!(!temp_dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("file.txt");
        fs::write(&path, b"original content").unwrap();

        atomic_write(&path, b"modified content").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "modified content");
    }

    #[test]
    #[cfg(unix)]
    fn test_write_keeps_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let script = temp_dir.path().join("run.sh");
        fs::write(&script, "echo one\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        atomic_write(&script, b"echo two\n").unwrap();

        let mode = fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(fs::read_to_string(&script).unwrap(), "echo two\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_new_file_is_not_private() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("new.txt");

        atomic_write(&path, b"fresh").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
