use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A find/replace edit requested by a plan.
///
/// `find` is matched as an exact substring of the target file. An empty
/// `find` means "set the whole content" and is only accepted when the target
/// is empty (a new file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOperation {
    /// Path relative to the project root
    pub file: String,
    /// Exact text to locate
    pub find: String,
    /// Text put in place of the first occurrence of `find`
    pub replace: String,
}

impl PatchOperation {
    pub fn new(
        file: impl Into<String>,
        find: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            find: find.into(),
            replace: replace.into(),
        }
    }
}

/// Why a single patch could not be applied.
///
/// These never abort a batch; they are recorded per operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("Empty find string (only allowed for empty files)")]
    EmptyFind,

    #[error("Find string not found in content")]
    NotFound,

    #[error("File not in context")]
    NotInContext,

    #[error("Path outside project root: {0}")]
    UnsafePath(String),
}

/// A located byte-span replacement.
///
/// Every successful patch compiles down to one splice: the bytes in
/// `[byte_start, byte_end)` are swapped for `new_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Splice does nothing until apply() is called"]
pub struct Splice {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// Replacement text
    pub new_text: String,
}

impl Splice {
    /// Find where `find` should be replaced inside `content`.
    ///
    /// Only the first occurrence is used. Offsets always fall on char
    /// boundaries because they come from a substring match.
    pub fn locate(content: &str, find: &str, replace: &str) -> Result<Self, PatchError> {
        if find.is_empty() {
            if content.is_empty() {
                return Ok(Self {
                    byte_start: 0,
                    byte_end: 0,
                    new_text: replace.to_string(),
                });
            }
            return Err(PatchError::EmptyFind);
        }

        let byte_start = content.find(find).ok_or(PatchError::NotFound)?;
        Ok(Self {
            byte_start,
            byte_end: byte_start + find.len(),
            new_text: replace.to_string(),
        })
    }

    /// Build the content with this span replaced.
    pub fn apply(&self, content: &str) -> String {
        let mut out = String::with_capacity(
            content.len() + self.new_text.len() - (self.byte_end - self.byte_start),
        );
        out.push_str(&content[..self.byte_start]);
        out.push_str(&self.new_text);
        out.push_str(&content[self.byte_end..]);
        out
    }
}

/// Outcome of running the patch engine once.
///
/// `Applied` always carries the new content, `Failed` never does.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchOutcome should be checked for success/failure"]
pub enum PatchOutcome {
    Applied { new_content: String },
    Failed(PatchError),
}

impl PatchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, PatchOutcome::Applied { .. })
    }

    pub fn new_content(&self) -> Option<&str> {
        match self {
            PatchOutcome::Applied { new_content } => Some(new_content),
            PatchOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&PatchError> {
        match self {
            PatchOutcome::Applied { .. } => None,
            PatchOutcome::Failed(e) => Some(e),
        }
    }
}

/// Apply one find/replace to `content`.
///
/// Pure: on failure `content` is untouched and no new content is produced.
pub fn apply_patch(content: &str, find: &str, replace: &str) -> PatchOutcome {
    match Splice::locate(content, find, replace) {
        Ok(splice) => PatchOutcome::Applied {
            new_content: splice.apply(content),
        },
        Err(e) => PatchOutcome::Failed(e),
    }
}

/// Result for one operation of a batch, keyed by its position in the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchResult {
    /// Index of the operation in the plan's patch list
    pub index: usize,
    pub file: String,
    pub outcome: PatchOutcome,
}

impl PatchResult {
    pub fn applied(&self) -> bool {
        self.outcome.is_applied()
    }

    pub fn error(&self) -> Option<&PatchError> {
        self.outcome.error()
    }

    pub fn new_content(&self) -> Option<&str> {
        self.outcome.new_content()
    }
}

impl fmt::Display for PatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            PatchOutcome::Applied { .. } => {
                write!(f, "patch #{} applied to {}", self.index + 1, self.file)
            }
            PatchOutcome::Failed(e) => {
                write!(f, "patch #{} failed on {}: {}", self.index + 1, self.file, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replaces_first_occurrence_only() {
        let outcome = apply_patch("a-b-a", "a", "X");
        assert_eq!(outcome.new_content(), Some("X-b-a"));
    }

    #[test]
    fn test_not_found() {
        let outcome = apply_patch("foo", "bar", "baz");
        assert_eq!(outcome, PatchOutcome::Failed(PatchError::NotFound));
        assert_eq!(
            outcome.error().unwrap().to_string(),
            "Find string not found in content"
        );
        assert!(outcome.new_content().is_none());
    }

    #[test]
    fn test_empty_find_on_empty_content_sets_content() {
        let outcome = apply_patch("", "", "new file body");
        assert_eq!(outcome.new_content(), Some("new file body"));
    }

    #[test]
    fn test_empty_find_on_non_empty_content_fails() {
        let outcome = apply_patch("existing", "", "x");
        assert_eq!(outcome, PatchOutcome::Failed(PatchError::EmptyFind));
        assert_eq!(
            outcome.error().unwrap().to_string(),
            "Empty find string (only allowed for empty files)"
        );
    }

    #[test]
    fn test_whitespace_and_line_endings_are_significant() {
        let content = "fn main() {\r\n    run();\r\n}\r\n";
        assert!(!apply_patch(content, "run();\n", "go();\n").is_applied());
        let outcome = apply_patch(content, "run();\r\n", "go();\r\n");
        assert_eq!(outcome.new_content(), Some("fn main() {\r\n    go();\r\n}\r\n"));
    }

    #[test]
    fn test_multibyte_content() {
        let outcome = apply_patch("héllo wörld", "wörld", "welt");
        assert_eq!(outcome.new_content(), Some("héllo welt"));
    }

    #[test]
    fn test_splice_offsets() {
        let splice = Splice::locate("hello world", "world", "there").unwrap();
        assert_eq!(splice.byte_start, 6);
        assert_eq!(splice.byte_end, 11);
        assert_eq!(splice.apply("hello world"), "hello there");
    }

    #[test]
    fn test_patch_result_display() {
        let ok = PatchResult {
            index: 0,
            file: "a.txt".to_string(),
            outcome: apply_patch("x", "x", "y"),
        };
        assert!(ok.to_string().contains("applied to a.txt"));

        let failed = PatchResult {
            index: 1,
            file: "b.txt".to_string(),
            outcome: PatchOutcome::Failed(PatchError::NotInContext),
        };
        assert!(failed.to_string().contains("File not in context"));
    }
}
