use crate::plan::schema::PLAN_JSON_SCHEMA;
use crate::scan::ScannedFile;

/// Number of project paths listed in the user prompt.
pub const DEFAULT_LIST_LIMIT: usize = 60;

/// The two prompts handed to a plan source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    pub system: String,
    pub user: String,
}

pub fn build_system_prompt() -> String {
    format!(
        "You are a precise coding agent. You receive a task and minimal project context \
(file paths and contents of relevant files only).

Your job is to produce a single JSON object (no markdown, no code fence) with:
1. analysis: Short explanation of the task and your approach.
2. files_to_edit: List of {{ path, reason }} for files you will change (paths relative to project root).
3. patches: List of edits. Each has: file (relative path), operation: \"replace\", find (exact string in file), replace (exact replacement). Use exact string match; preserve indentation and newlines.
4. commands: Optional list of shell commands to run after edits (e.g. cargo test). Use if tests or build need to run.

Rules:
- Only reference files that were provided in the context (or a new file path to create).
- For patches, \"find\" must appear exactly in the given file content. For new or empty files, use \"find\": \"\" and \"replace\": \"<full new content>\".
- Prefer minimal, surgical edits. One patch per logical change when possible.
- Output only the JSON object, no other text.
{PLAN_JSON_SCHEMA}"
    )
}

/// Task, the first `list_limit` project paths, then the selected contents.
pub fn build_user_prompt(
    task: &str,
    file_list: &[String],
    selected: &[&ScannedFile],
    list_limit: usize,
) -> String {
    let listing = file_list
        .iter()
        .take(list_limit)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");
    let contents = selected
        .iter()
        .map(|f| format!("--- {} ---\n{}\n", f.relative_path, f.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Task:\n{task}\n\nProject files (relative paths):\n{listing}\n\n\
Relevant file contents (use only these for patches):\n{contents}\n\nProduce the JSON plan."
    )
}
