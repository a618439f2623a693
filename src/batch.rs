use crate::patch::{apply_patch, PatchError, PatchOperation, PatchOutcome, PatchResult};
use crate::snapshot::ContentSnapshot;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Everything produced by applying a plan's patches to a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// One result per operation, in plan order
    pub results: Vec<PatchResult>,
    /// Snapshot after every successful patch
    pub after: ContentSnapshot,
}

impl BatchOutcome {
    pub fn applied(&self) -> impl Iterator<Item = &PatchResult> {
        self.results.iter().filter(|r| r.applied())
    }

    pub fn failed(&self) -> impl Iterator<Item = &PatchResult> {
        self.results.iter().filter(|r| !r.applied())
    }

    /// Collapse results to the last one recorded for each file.
    ///
    /// Earlier results for the same file are hidden in this view; use
    /// `results` when every operation matters.
    pub fn last_by_file(&self) -> BTreeMap<&str, &PatchResult> {
        self.results
            .iter()
            .map(|r| (r.file.as_str(), r))
            .collect()
    }
}

/// Apply `patches` in order against a copy of `before`.
///
/// Patches targeting the same file compose: each sees the output of the
/// previous successful one. A failed patch leaves its file unchanged and the
/// batch continues.
pub fn apply_all(before: &ContentSnapshot, patches: &[PatchOperation]) -> BatchOutcome {
    let mut after = before.clone();
    let mut results = Vec::with_capacity(patches.len());

    for (index, op) in patches.iter().enumerate() {
        let outcome = match after.get(&op.file) {
            None => PatchOutcome::Failed(PatchError::NotInContext),
            Some(content) => apply_patch(content, &op.find, &op.replace),
        };

        match &outcome {
            PatchOutcome::Applied { new_content } => {
                debug!(index, file = %op.file, "patch applied");
                after.insert(op.file.clone(), new_content.clone());
            }
            PatchOutcome::Failed(e) => {
                warn!(index, file = %op.file, error = %e, "patch failed");
            }
        }

        results.push(PatchResult {
            index,
            file: op.file.clone(),
            outcome,
        });
    }

    BatchOutcome { results, after }
}
