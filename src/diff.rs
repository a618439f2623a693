//! Human-readable diffs for confirmation prompts.
//!
//! Two renderings are provided: the requested find/replace of a single patch,
//! and a line diff of a whole file. Both are display artifacts only.

/// Render the find/replace of one applied patch.
///
/// The block is not reconciled against other patches to the same file.
pub fn replace_diff(path: &str, find: &str, replace: &str) -> String {
    let mut lines = vec![format!("--- {path}"), format!("+++ {path}")];
    lines.extend(find.split('\n').map(|line| format!("-{line}")));
    lines.extend(replace.split('\n').map(|line| format!("+{line}")));
    lines.join("\n")
}

/// Render a line diff of `old` vs `new` with `@@ -a,b +c,d @@` hunks.
///
/// Greedy two-pointer scan: equal lines advance both cursors. On a mismatch
/// the run is extended over both sides, shortest combined extension first,
/// until the cursors land on equal lines again (or both inputs end), and one
/// hunk is emitted for the run. Not minimal on pathological input, which is
/// fine for single-region edits.
pub fn unified_diff(path: &str, old: &str, new: &str) -> String {
    let old_lines: Vec<&str> = old.split('\n').collect();
    let new_lines: Vec<&str> = new.split('\n').collect();
    let mut out = vec![format!("--- a/{path}"), format!("+++ b/{path}")];

    let (mut i, mut j) = (0, 0);
    while i < old_lines.len() || j < new_lines.len() {
        if i < old_lines.len() && j < new_lines.len() && old_lines[i] == new_lines[j] {
            out.push(format!(" {}", old_lines[i]));
            i += 1;
            j += 1;
            continue;
        }

        let (removed, added) = resync(&old_lines[i..], &new_lines[j..]);
        out.push(format!(
            "@@ -{},{} +{},{} @@",
            i + 1,
            removed,
            j + 1,
            added
        ));
        out.extend(old_lines[i..i + removed].iter().map(|line| format!("-{line}")));
        out.extend(new_lines[j..j + added].iter().map(|line| format!("+{line}")));
        i += removed;
        j += added;
    }

    out.join("\n")
}

/// Lengths of the mismatched run at the head of `old` and `new`.
///
/// Returns the smallest `(a, b)` by `a + b` where `old[a] == new[b]`, or
/// where both sides are exhausted.
fn resync(old: &[&str], new: &[&str]) -> (usize, usize) {
    let total = old.len() + new.len();
    for distance in 1..=total {
        for a in 0..=distance.min(old.len()) {
            let b = distance - a;
            if b > new.len() {
                continue;
            }
            let both_done = a == old.len() && b == new.len();
            let lines_match = a < old.len() && b < new.len() && old[a] == new[b];
            if both_done || lines_match {
                return (a, b);
            }
        }
    }
    (old.len(), new.len())
}
