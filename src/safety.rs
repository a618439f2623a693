use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Keeps plan-supplied paths inside the project root.
///
/// Plans come from an untrusted producer, so every patch target is checked
/// before it is read, backed up or written.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    /// Canonical project root
    workspace_root: PathBuf,
    /// Directories under the root that patches may never touch
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("path must be relative to the project root: {0}")]
    NotRelative(String),

    #[error("path escapes the project root: {0}")]
    Escapes(String),

    #[error("path is outside workspace: {path} (workspace: {workspace})")]
    OutsideWorkspace { path: PathBuf, workspace: PathBuf },

    #[error("path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl WorkspaceGuard {
    /// Create a guard for `workspace_root`.
    ///
    /// `.git` and the given backup directory are always forbidden.
    pub fn new(
        workspace_root: impl AsRef<Path>,
        backup_dir: impl AsRef<Path>,
    ) -> Result<Self, SafetyError> {
        let workspace_root = workspace_root.as_ref().canonicalize()?;
        let forbidden_paths = [Path::new(".git"), backup_dir.as_ref()]
            .iter()
            .map(|rel| {
                let joined = workspace_root.join(rel);
                joined.canonicalize().unwrap_or(joined)
            })
            .collect();

        Ok(Self {
            workspace_root,
            forbidden_paths,
        })
    }

    /// Check a relative patch target and return its absolute location.
    ///
    /// The target itself may not exist yet; symlinks are resolved on the
    /// deepest ancestor that does.
    pub fn validate_target(&self, relative: &str) -> Result<PathBuf, SafetyError> {
        let rel = Path::new(relative);
        if relative.trim().is_empty() || rel.is_absolute() {
            return Err(SafetyError::NotRelative(relative.to_string()));
        }
        let mut named = false;
        for component in rel.components() {
            match component {
                Component::Normal(_) => named = true,
                Component::CurDir => {}
                Component::ParentDir => return Err(SafetyError::Escapes(relative.to_string())),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(SafetyError::NotRelative(relative.to_string()))
                }
            }
        }
        if !named {
            return Err(SafetyError::NotRelative(relative.to_string()));
        }

        let absolute = self.workspace_root.join(rel);
        self.check_path(&absolute)?;

        if let Some(existing) = absolute.ancestors().find(|p| p.exists()) {
            let canonical = existing.canonicalize()?;
            self.check_path(&canonical)?;
        }

        Ok(absolute)
    }

    fn check_path(&self, path: &Path) -> Result<(), SafetyError> {
        if !path.starts_with(&self.workspace_root) {
            return Err(SafetyError::OutsideWorkspace {
                path: path.to_path_buf(),
                workspace: self.workspace_root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if path.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: path.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }
}

/// Canonical snapshot key for a plan path: `.` segments and repeated
/// separators dropped, parts joined with `/`.
///
/// Paths with `..`, a root or a prefix come back unchanged for
/// [`WorkspaceGuard::validate_target`] to reject.
pub fn normalize_target(relative: &str) -> String {
    let mut parts = Vec::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return relative.to_string()
            }
        }
    }
    if parts.is_empty() {
        return relative.to_string();
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_validate_existing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join("src")).unwrap();
        fs::write(temp_dir.path().join("src/main.rs"), b"").unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path(), ".backups").unwrap();

        let path = guard.validate_target("src/main.rs").unwrap();
        assert!(path.ends_with("src/main.rs"));
    }

    #[test]
    fn test_validate_new_file_in_new_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path(), ".backups").unwrap();
        assert!(guard.validate_target("docs/new/guide.md").is_ok());
    }

    #[test]
    fn test_rejects_parent_and_absolute() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path(), ".backups").unwrap();

        assert!(matches!(
            guard.validate_target("../outside.txt"),
            Err(SafetyError::Escapes(_))
        ));
        assert!(matches!(
            guard.validate_target("/etc/passwd"),
            Err(SafetyError::NotRelative(_))
        ));
        assert!(matches!(
            guard.validate_target(""),
            Err(SafetyError::NotRelative(_))
        ));
    }

    #[test]
    fn test_normalize_target() {
        assert_eq!(normalize_target("./a.txt"), "a.txt");
        assert_eq!(normalize_target("src/./lib.rs"), "src/lib.rs");
        assert_eq!(normalize_target("src//lib.rs"), "src/lib.rs");
        assert_eq!(normalize_target("a.txt"), "a.txt");
        assert_eq!(normalize_target("../x"), "../x");
        assert_eq!(normalize_target("/etc/passwd"), "/etc/passwd");
        assert_eq!(normalize_target("./"), "./");
    }

    #[test]
    fn test_rejects_target_naming_the_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path(), ".backups").unwrap();

        assert!(matches!(
            guard.validate_target("."),
            Err(SafetyError::NotRelative(_))
        ));
        assert!(matches!(
            guard.validate_target("./"),
            Err(SafetyError::NotRelative(_))
        ));
    }

    #[test]
    fn test_rejects_forbidden_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join(".git")).unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path(), ".backups").unwrap();

        assert!(matches!(
            guard.validate_target(".git/config"),
            Err(SafetyError::ForbiddenPath { .. })
        ));
        assert!(matches!(
            guard.validate_target(".backups/a.txt.backup"),
            Err(SafetyError::ForbiddenPath { .. })
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_rejects_symlink_escape() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path().join("workspace");
        let outside = temp_dir.path().join("outside");
        fs::create_dir_all(&workspace).unwrap();
        fs::create_dir_all(&outside).unwrap();
        symlink(&outside, workspace.join("linked")).unwrap();

        let guard = WorkspaceGuard::new(&workspace, ".backups").unwrap();
        assert!(matches!(
            guard.validate_target("linked/file.txt"),
            Err(SafetyError::OutsideWorkspace { .. })
        ));
    }
}
