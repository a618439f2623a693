use crate::patch::PatchOperation;
use serde::Serialize;

/// A file the plan intends to change, with the producer's reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileToEdit {
    pub path: String,
    pub reason: String,
}

/// Structured plan after field coercion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentPlan {
    pub analysis: String,
    pub files_to_edit: Vec<FileToEdit>,
    pub patches: Vec<PatchOperation>,
    pub commands: Vec<String>,
    /// Free-form notes the producer wants remembered; may be empty
    pub agent_notes: Vec<String>,
}

impl AgentPlan {
    /// Distinct patch targets in first-seen order.
    pub fn patch_targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = Vec::new();
        for patch in &self.patches {
            if !targets.contains(&patch.file.as_str()) {
                targets.push(&patch.file);
            }
        }
        targets
    }
}

/// Shape the plan producer is told to emit.
pub const PLAN_JSON_SCHEMA: &str = r#"
The response must be a single JSON object with this exact shape (no markdown, no code fence):
{
  "analysis": "string: brief analysis of the task and approach",
  "files_to_edit": [
    { "path": "relative/file/path", "reason": "why this file" }
  ],
  "patches": [
    {
      "file": "relative/path/to/file",
      "operation": "replace",
      "find": "exact string to find in file (preserve whitespace)",
      "replace": "exact string to put in its place"
    }
  ],
  "commands": ["shell command 1", "shell command 2"],
  "agent_notes": ["optional string notes"]
}
Rules: "file" in patches must be one of the paths in files_to_edit or from the context. agent_notes is optional. Use exact string match for find/replace. commands are optional shell commands to run after edits.
"#;
