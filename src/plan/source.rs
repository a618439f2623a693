//! Where plan text comes from.
//!
//! The language model itself sits outside this crate. A [`PlanSource`] turns
//! a [`PlanRequest`] into raw response text, which the pipeline then parses.

use crate::plan::prompt::PlanRequest;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PlanSourceError {
    #[error("failed to read plan from {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to run plan command `{command}`: {source}")]
    Spawn { command: String, source: io::Error },

    #[error("plan command `{command}` exited with {status}")]
    Exit { command: String, status: String },

    #[error("plan source {0} returned an empty response")]
    Empty(String),
}

pub trait PlanSource {
    /// Short label for logs and summaries.
    fn name(&self) -> &str;

    fn produce(&self, request: &PlanRequest) -> Result<String, PlanSourceError>;
}

/// Always returns the same response text.
#[derive(Debug, Clone)]
pub struct StaticPlanSource {
    response: String,
}

impl StaticPlanSource {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

impl PlanSource for StaticPlanSource {
    fn name(&self) -> &str {
        "static"
    }

    fn produce(&self, _request: &PlanRequest) -> Result<String, PlanSourceError> {
        Ok(self.response.clone())
    }
}

/// Reads a pre-computed response from a file, or stdin when the path is `-`.
#[derive(Debug, Clone)]
pub struct FilePlanSource {
    path: PathBuf,
}

impl FilePlanSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn is_stdin(&self) -> bool {
        self.path.as_os_str() == "-"
    }
}

impl PlanSource for FilePlanSource {
    fn name(&self) -> &str {
        "file"
    }

    fn produce(&self, _request: &PlanRequest) -> Result<String, PlanSourceError> {
        let read_error = |source| PlanSourceError::Read {
            path: self.path.clone(),
            source,
        };

        let text = if self.is_stdin() {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).map_err(read_error)?;
            buf
        } else {
            fs::read_to_string(&self.path).map_err(read_error)?
        };

        if text.trim().is_empty() {
            return Err(PlanSourceError::Empty(self.path.display().to_string()));
        }
        Ok(text)
    }
}

/// Pipes the request to a shell command and uses its stdout as the response.
///
/// The command receives `{"system": ..., "user": ...}` as JSON on stdin.
/// Its stderr is inherited so provider errors stay visible.
#[derive(Debug, Clone)]
pub struct CommandPlanSource {
    command: String,
}

impl CommandPlanSource {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn spawn_error(&self, source: io::Error) -> PlanSourceError {
        PlanSourceError::Spawn {
            command: self.command.clone(),
            source,
        }
    }
}

impl PlanSource for CommandPlanSource {
    fn name(&self) -> &str {
        &self.command
    }

    fn produce(&self, request: &PlanRequest) -> Result<String, PlanSourceError> {
        let payload = serde_json::json!({
            "system": request.system,
            "user": request.user,
        })
        .to_string();

        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", self.command.as_str()]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", self.command.as_str()]);
            cmd
        };

        debug!(command = %self.command, bytes = payload.len(), "requesting plan");
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Feed stdin from a thread so a chatty child cannot deadlock us
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || {
                // A child that ignores stdin closes the pipe early; that is fine
                let _ = stdin.write_all(payload.as_bytes());
            })
        });

        let output = child.wait_with_output().map_err(|e| self.spawn_error(e))?;
        if let Some(handle) = writer {
            let _ = handle.join();
        }

        if !output.status.success() {
            return Err(PlanSourceError::Exit {
                command: self.command.clone(),
                status: output.status.to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            return Err(PlanSourceError::Empty(self.command.clone()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PlanRequest {
        PlanRequest {
            system: "sys".to_string(),
            user: "usr".to_string(),
        }
    }

    #[test]
    fn test_static_source() {
        let source = StaticPlanSource::new("{}");
        assert_eq!(source.produce(&request()).unwrap(), "{}");
    }

    #[test]
    fn test_file_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("plan.json");
        fs::write(&path, "{\"analysis\": \"x\"}").unwrap();

        let text = FilePlanSource::new(&path).produce(&request()).unwrap();
        assert!(text.contains("analysis"));
    }

    #[test]
    fn test_file_source_missing_file() {
        let err = FilePlanSource::new("/definitely/not/here.json")
            .produce(&request())
            .unwrap_err();
        assert!(matches!(err, PlanSourceError::Read { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_command_source_receives_request() {
        let source = CommandPlanSource::new("cat");
        let text = source.produce(&request()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["system"], "sys");
        assert_eq!(value["user"], "usr");
    }

    #[test]
    #[cfg(unix)]
    fn test_command_source_failure() {
        let err = CommandPlanSource::new("exit 2")
            .produce(&request())
            .unwrap_err();
        assert!(matches!(err, PlanSourceError::Exit { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_command_source_empty_output() {
        let err = CommandPlanSource::new("true")
            .produce(&request())
            .unwrap_err();
        assert!(matches!(err, PlanSourceError::Empty(_)));
    }
}
