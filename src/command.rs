use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn { command: String, source: io::Error },

    #[error("`{command}` failed: Exit {code}")]
    Exit { command: String, code: i32 },

    #[error("`{command}` was terminated by a signal")]
    Terminated { command: String },
}

/// Runs plan commands. The pipeline only cares about success or failure.
pub trait CommandRunner {
    fn run(&self, command: &str, cwd: &Path) -> Result<(), CommandError>;
}

/// Runs commands through the platform shell with inherited stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl ShellRunner {
    fn shell(command: &str) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str, cwd: &Path) -> Result<(), CommandError> {
        info!(command, cwd = %cwd.display(), "running command");
        let status = Self::shell(command)
            .current_dir(cwd)
            .status()
            .map_err(|source| CommandError::Spawn {
                command: command.to_string(),
                source,
            })?;
        check_status(command, status)
    }
}

fn check_status(command: &str, status: ExitStatus) -> Result<(), CommandError> {
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(CommandError::Exit {
            command: command.to_string(),
            code,
        }),
        None => Err(CommandError::Terminated {
            command: command.to_string(),
        }),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_successful_command() {
        let temp_dir = tempfile::tempdir().unwrap();
        ShellRunner.run("touch marker", temp_dir.path()).unwrap();
        assert!(temp_dir.path().join("marker").exists());
    }

    #[test]
    fn test_non_zero_exit_reports_code() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = ShellRunner.run("exit 3", temp_dir.path()).unwrap_err();
        assert!(matches!(err, CommandError::Exit { code: 3, .. }));
        assert!(err.to_string().contains("Exit 3"));
    }

    #[test]
    fn test_missing_cwd_is_spawn_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = ShellRunner
            .run("true", &temp_dir.path().join("missing"))
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }
}
