use crate::config::schema::{AgentConfig, ValidationError};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Project-level config file name, looked up in the project root.
pub const PROJECT_CONFIG_FILE: &str = ".planpatch.toml";

/// Environment variable that overrides `[plan] command`.
pub const PLAN_COMMAND_ENV: &str = "PLANPATCH_PLAN_COMMAND";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Io { .. } => self,
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid config ({}): {}", path.display(), source),
                None => write!(f, "invalid config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<AgentConfig, ConfigError> {
    let config: AgentConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<AgentConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// `~/.config/planpatch/config.toml`, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    home::home_dir().map(|home| home.join(".config").join("planpatch").join("config.toml"))
}

/// First existing config file for `root`: the project file, then `user`.
pub fn find_config(root: &Path, user: Option<&Path>) -> Option<PathBuf> {
    let project = root.join(PROJECT_CONFIG_FILE);
    if project.is_file() {
        return Some(project);
    }
    user.filter(|p| p.is_file()).map(Path::to_path_buf)
}

/// Load the effective config for a project.
///
/// The project file wins over the user file; with neither, defaults apply.
/// `PLANPATCH_PLAN_COMMAND` overrides the plan command either way.
pub fn load_for_root(root: &Path) -> Result<AgentConfig, ConfigError> {
    let user = user_config_path();
    let config = match find_config(root, user.as_deref()) {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_from_path(&path)?
        }
        None => {
            debug!("no config file found, using defaults");
            AgentConfig::default()
        }
    };
    Ok(apply_plan_command_override(
        config,
        env::var(PLAN_COMMAND_ENV).ok(),
    ))
}

/// Replace the plan command with a non-blank override.
pub fn apply_plan_command_override(mut config: AgentConfig, value: Option<String>) -> AgentConfig {
    if let Some(command) = value.filter(|c| !c.trim().is_empty()) {
        config.plan.command = Some(command);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ValidationIssue;

    #[test]
    fn test_empty_input_gives_defaults() {
        let config = load_from_str("").unwrap();
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.scan.max_files, 500);
        assert_eq!(config.context.max_chars, 18_000);
        assert_eq!(config.backup.dir, ".planpatch-backups");
        assert!(config.backup.enabled);
    }

    #[test]
    fn test_partial_sections() {
        let config = load_from_str(
            r#"
[context]
max_files = 4

[plan]
command = "my-llm --json"
"#,
        )
        .unwrap();

        assert_eq!(config.context.max_files, 4);
        assert_eq!(config.context.list_limit, 60);
        assert_eq!(config.plan.command.as_deref(), Some("my-llm --json"));
    }

    #[test]
    fn test_validation_collects_issues() {
        let err = load_from_str(
            r#"
[scan]
max_files = 0

[backup]
dir = "../outside"

[plan]
command = "  "
"#,
        )
        .unwrap_err();

        let ConfigError::Validation { source, .. } = err else {
            panic!("expected validation error");
        };
        assert_eq!(source.issues.len(), 3);
        assert_eq!(source.issues[0], ValidationIssue::ZeroLimit("scan.max_files"));
        assert_eq!(source.issues[2], ValidationIssue::BlankPlanCommand);
    }

    #[test]
    fn test_absolute_backup_dir_rejected() {
        let err = load_from_str("[backup]\ndir = \"/tmp/backups\"\n").unwrap_err();
        assert!(err.to_string().contains("must be relative"));
    }

    #[test]
    fn test_unknown_key_is_a_parse_error() {
        let err = load_from_str("[scan]\nmax_filez = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn test_path_is_attached_to_errors() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(PROJECT_CONFIG_FILE);
        fs::write(&path, "[context]\nmax_chars = 0\n").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains(PROJECT_CONFIG_FILE));
    }

    #[test]
    fn test_project_config_preferred_over_user() {
        let temp_dir = tempfile::tempdir().unwrap();
        let user = temp_dir.path().join("user.toml");
        fs::write(&user, "").unwrap();

        assert_eq!(find_config(temp_dir.path(), Some(&user)), Some(user.clone()));

        let project = temp_dir.path().join(PROJECT_CONFIG_FILE);
        fs::write(&project, "").unwrap();
        assert_eq!(find_config(temp_dir.path(), Some(&user)), Some(project));
    }

    #[test]
    fn test_plan_command_override() {
        let config = apply_plan_command_override(AgentConfig::default(), Some("llm".into()));
        assert_eq!(config.plan.command.as_deref(), Some("llm"));

        let config = apply_plan_command_override(config, Some("   ".into()));
        assert_eq!(config.plan.command.as_deref(), Some("llm"));
    }

    #[test]
    fn test_scan_options_ignore_backup_dir() {
        let options = AgentConfig::default().scan_options();
        assert!(options.ignore.contains(&".planpatch-backups".to_string()));
    }
}
