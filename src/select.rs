use crate::scan::ScannedFile;
use std::collections::BTreeSet;

pub const DEFAULT_CONTEXT_FILES: usize = 12;
pub const DEFAULT_CONTEXT_CHARS: usize = 18_000;

/// Files sent to the plan producer when nothing scores.
const FALLBACK_FILES: usize = 6;

/// Limits on how much project content goes into one request.
#[derive(Debug, Clone, Copy)]
pub struct ContextBudget {
    pub max_files: usize,
    pub max_chars: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_CONTEXT_FILES,
            max_chars: DEFAULT_CONTEXT_CHARS,
        }
    }
}

fn keywords(task: &str) -> BTreeSet<String> {
    let normalized: String = task
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() || "./-".contains(c) {
                c
            } else {
                ' '
            }
        })
        .collect();
    normalized
        .split_whitespace()
        .filter(|w| w.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

/// Path hits weigh 10, content hits 2, minus up to 5 for size.
fn score(file: &ScannedFile, keywords: &BTreeSet<String>) -> f64 {
    let path = file.relative_path.to_lowercase();
    let content = file.content.to_lowercase();
    let mut score = 0.0;
    for kw in keywords {
        if path.contains(kw.as_str()) {
            score += 10.0;
        }
        if content.contains(kw.as_str()) {
            score += 2.0;
        }
    }
    if score == 0.0 {
        return 0.0;
    }
    let size_penalty = (file.content.len() as f64 / 1000.0).min(5.0);
    score - size_penalty
}

/// Pick the files most related to `task` within `budget`.
///
/// Files are ranked by keyword score; a file that would overflow the
/// character budget is skipped rather than ending the selection. When no file
/// is picked, the first few files that fit are used instead.
pub fn select_relevant_files<'a>(
    task: &str,
    files: &'a [ScannedFile],
    budget: ContextBudget,
) -> Vec<&'a ScannedFile> {
    let keywords = keywords(task);
    let mut scored: Vec<(f64, &ScannedFile)> =
        files.iter().map(|f| (score(f, &keywords), f)).collect();
    // Stable sort keeps scan order among ties
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut selected = Vec::new();
    let mut total_chars = 0;
    for (_, file) in scored {
        if selected.len() >= budget.max_files {
            break;
        }
        if total_chars + file.content.len() > budget.max_chars {
            continue;
        }
        total_chars += file.content.len();
        selected.push(file);
    }

    if selected.is_empty() {
        for file in files.iter().take(FALLBACK_FILES) {
            if total_chars + file.content.len() <= budget.max_chars {
                total_chars += file.content.len();
                selected.push(file);
            }
        }
    }

    selected
}
