use crate::backup::DEFAULT_BACKUP_DIR;
use crate::plan::DEFAULT_LIST_LIMIT;
use crate::scan::{ScanOptions, DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE};
use crate::select::{ContextBudget, DEFAULT_CONTEXT_CHARS, DEFAULT_CONTEXT_FILES};
use serde::Deserialize;
use std::fmt;
use std::path::{Component, Path};

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default)]
    pub scan: ScanSection,
    #[serde(default)]
    pub context: ContextSection,
    #[serde(default)]
    pub backup: BackupSection,
    #[serde(default)]
    pub plan: PlanSection,
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.scan.max_files == 0 {
            issues.push(ValidationIssue::ZeroLimit("scan.max_files"));
        }
        if self.scan.max_file_size == 0 {
            issues.push(ValidationIssue::ZeroLimit("scan.max_file_size"));
        }
        if self.context.max_files == 0 {
            issues.push(ValidationIssue::ZeroLimit("context.max_files"));
        }
        if self.context.max_chars == 0 {
            issues.push(ValidationIssue::ZeroLimit("context.max_chars"));
        }
        if self.context.list_limit == 0 {
            issues.push(ValidationIssue::ZeroLimit("context.list_limit"));
        }

        let dir = self.backup.dir.trim();
        if dir.is_empty() {
            issues.push(ValidationIssue::InvalidBackupDir {
                dir: self.backup.dir.clone(),
                message: "must not be empty",
            });
        } else {
            let path = Path::new(dir);
            if path.is_absolute() || path.has_root() {
                issues.push(ValidationIssue::InvalidBackupDir {
                    dir: self.backup.dir.clone(),
                    message: "must be relative to the project root",
                });
            } else if path.components().any(|c| !matches!(c, Component::Normal(_))) {
                issues.push(ValidationIssue::InvalidBackupDir {
                    dir: self.backup.dir.clone(),
                    message: "must stay inside the project root",
                });
            }
        }

        if let Some(command) = &self.plan.command {
            if command.trim().is_empty() {
                issues.push(ValidationIssue::BlankPlanCommand);
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        let mut ignore = self.scan.ignore.clone();
        ignore.push(self.backup.dir.trim_end_matches('/').to_string());
        ScanOptions {
            max_files: self.scan.max_files,
            max_file_size: self.scan.max_file_size,
            ignore,
        }
    }

    pub fn context_budget(&self) -> ContextBudget {
        ContextBudget {
            max_files: self.context.max_files,
            max_chars: self.context.max_chars,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScanSection {
    #[serde(default = "default_scan_max_files")]
    pub max_files: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Extra ignore globs
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            ignore: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ContextSection {
    #[serde(default = "default_context_files")]
    pub max_files: usize,
    #[serde(default = "default_context_chars")]
    pub max_chars: usize,
    /// Project paths listed in the prompt
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_CONTEXT_FILES,
            max_chars: DEFAULT_CONTEXT_CHARS,
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BackupSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Relative to the project root
    #[serde(default = "default_backup_dir")]
    pub dir: String,
}

impl Default for BackupSection {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: DEFAULT_BACKUP_DIR.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PlanSection {
    /// Shell command that turns a plan request into a plan response
    #[serde(default)]
    pub command: Option<String>,
}

fn default_scan_max_files() -> usize {
    DEFAULT_MAX_FILES
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_context_files() -> usize {
    DEFAULT_CONTEXT_FILES
}

fn default_context_chars() -> usize {
    DEFAULT_CONTEXT_CHARS
}

fn default_list_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

fn default_true() -> bool {
    true
}

fn default_backup_dir() -> String {
    DEFAULT_BACKUP_DIR.to_string()
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    ZeroLimit(&'static str),
    InvalidBackupDir { dir: String, message: &'static str },
    BlankPlanCommand,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::ZeroLimit(field) => write!(f, "'{field}' must be greater than zero"),
            ValidationIssue::InvalidBackupDir { dir, message } => {
                write!(f, "backup dir '{dir}' {message}")
            }
            ValidationIssue::BlankPlanCommand => write!(f, "plan command must not be blank"),
        }
    }
}
