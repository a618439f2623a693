use crate::patch::PatchOperation;
use crate::plan::schema::{AgentPlan, FileToEdit};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("plan is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("plan response is not a JSON object")]
    NotAnObject,
}

/// Cut the outermost `{ ... }` out of a response.
///
/// Producers often wrap the object in prose or code fences. When no braces
/// are found the trimmed text is returned unchanged.
pub fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Parse a producer response into a plan.
///
/// Invalid JSON and non-object values are errors. Inside the object every
/// field is coerced: missing or mistyped arrays become empty, missing
/// strings become empty, non-string scalars are stringified.
pub fn parse_plan(raw: &str) -> Result<AgentPlan, PlanError> {
    let value: Value = serde_json::from_str(extract_json(raw))?;
    let Value::Object(object) = value else {
        return Err(PlanError::NotAnObject);
    };

    let analysis = match object.get("analysis") {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };

    let files_to_edit = array(&object, "files_to_edit")
        .map(|entry| FileToEdit {
            path: field(entry, "path"),
            reason: field(entry, "reason"),
        })
        .collect();

    let patches = array(&object, "patches")
        .map(|entry| PatchOperation {
            file: field(entry, "file"),
            find: field(entry, "find"),
            replace: field(entry, "replace"),
        })
        .collect();

    let commands = array(&object, "commands").map(stringify).collect();

    let agent_notes = array(&object, "agent_notes")
        .map(stringify)
        .filter(|note| !note.is_empty())
        .collect();

    Ok(AgentPlan {
        analysis,
        files_to_edit,
        patches,
        commands,
        agent_notes,
    })
}

fn array<'a>(object: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Value> {
    object
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// String field of an array entry; absent, null or non-object gives "".
fn field(entry: &Value, key: &str) -> String {
    match entry.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(value) => stringify(value),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
