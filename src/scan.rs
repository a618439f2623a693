//! Project scanning: which files exist and which ones are worth reading.
//!
//! Ignore handling follows git: `.gitignore` files anywhere in the tree,
//! plus built-in defaults and configured patterns in gitignore glob syntax.

use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_MAX_FILES: usize = 500;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 200_000;

const DEFAULT_IGNORE: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    ".next",
    ".nuxt",
    "coverage",
    "target",
    "*.log",
    ".env",
    ".env.*",
    "*.min.js",
    "*.min.css",
    ".DS_Store",
];

const TEXT_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "json", "md", "txt", "html", "css", "scss", "less",
    "py", "rb", "go", "rs", "java", "kt", "swift", "sql", "sh", "bash", "yaml", "yml", "toml",
    "ini", "xml", "svg", "graphql", "gql", "vue", "svelte",
];

/// A file read during the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Absolute path
    pub path: PathBuf,
    /// Path relative to the project root, `/`-separated
    pub relative_path: String,
    pub content: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub max_files: usize,
    pub max_file_size: u64,
    /// Extra gitignore-style globs on top of the defaults and `.gitignore`
    pub ignore: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            ignore: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Readable files within the size cap
    pub files: Vec<ScannedFile>,
    /// Every listed path, sorted
    pub file_list: Vec<String>,
}

/// Default patterns plus `extra`, as ignore overrides.
///
/// Overrides win over `.gitignore`. Invalid patterns are logged and
/// skipped.
fn ignore_overrides(root: &Path, extra: &[String]) -> Override {
    let mut builder = OverrideBuilder::new(root);
    for pattern in DEFAULT_IGNORE
        .iter()
        .copied()
        .chain(extra.iter().map(String::as_str))
    {
        if let Err(e) = builder.add(&format!("!{pattern}")) {
            warn!(pattern, error = %e, "ignoring invalid ignore pattern");
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!(error = %e, "ignore patterns unusable, using none");
        Override::empty()
    })
}

fn is_text_file(name: &str) -> bool {
    if name.ends_with("Dockerfile") {
        return true;
    }
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// List text files under `root`, sorted.
///
/// Skips the default ignore patterns, `extra` and anything excluded by
/// `.gitignore` files (negations and anchored patterns included), whether or
/// not the root is a git repository.
pub fn list_project_files(root: &Path, extra: &[String], max_files: usize) -> Vec<String> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .parents(false)
        .ignore(false)
        .git_global(false)
        .git_exclude(false)
        .git_ignore(true)
        .require_git(false)
        .overrides(ignore_overrides(root, extra))
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if files.len() >= max_files {
            break;
        }
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if !is_text_file(&entry.file_name().to_string_lossy()) {
            continue;
        }
        if let Some(rel) = relative_path(root, entry.path()) {
            files.push(rel);
        }
    }

    files.sort();
    files
}

/// List and read project files.
///
/// Unreadable files and files over `max_file_size` stay in `file_list` but
/// get no content record.
pub fn scan_project(root: &Path, options: &ScanOptions) -> ScanResult {
    let file_list = list_project_files(root, &options.ignore, options.max_files);
    let mut files = Vec::new();

    for rel in &file_list {
        let path = root.join(rel);
        let size = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => continue,
        };
        if size > options.max_file_size {
            debug!(path = %rel, size, "skipping large file");
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(content) => files.push(ScannedFile {
                path,
                relative_path: rel.clone(),
                content,
                size,
            }),
            Err(e) => debug!(path = %rel, error = %e, "skipping unreadable file"),
        }
    }

    debug!(listed = file_list.len(), read = files.len(), "scan complete");
    ScanResult { files, file_list }
}
